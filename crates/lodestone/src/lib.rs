//! Bounded entity cache kept in sync with a chat platform's gateway.
//!
//! This crate mirrors remote guild state (channels, messages, members,
//! forum threads, calendar events and more) in memory, and keeps it current
//! by applying the gateway's event stream.
//!
//! ## Features
//!
//! - **Collections**: keyed stores with FIFO eviction and add-or-merge upserts
//! - **Resolver**: derived relationships answered from cache, by stub, or by fetch
//! - **Translator**: per-event decode, apply and notify, one notification per event
//! - **REST fetcher**: HTTP collaborator for cache misses and lazy registration

pub mod cache;
pub mod collection;
pub mod config;
pub mod entity;
mod error;
pub mod events;
pub mod fetch;
pub mod field;
pub mod models;
pub mod notify;
pub mod resolver;
pub mod rest;
pub mod translator;

pub use cache::GatewayCache;
pub use collection::{Collection, Upserted};
pub use config::{CacheConfig, CacheConfigBuilder, Capacities, Capacity};
pub use entity::{Cached, Entity, EntityKind, Scope};
pub use error::{CacheError, FetchError};
pub use events::{Emote, GatewayEvent, PermissionOverride, PermissionTarget};
pub use fetch::{FetchPolicy, Fetcher, OfflineFetcher};
pub use field::Field;
pub use models::*;
pub use notify::{Diagnostic, Notification, Reaction, ReactionTarget};
pub use resolver::{ChannelStub, GuildStub, MemberRef, MessageStub, Resolved, ThreadStub};
pub use rest::{DEFAULT_API_URL, RestFetcher};
pub use translator::EventTranslator;
