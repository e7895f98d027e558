//! The cache root.
//!
//! One [`GatewayCache`] lives for the length of a gateway session. It owns
//! the guild store (each guild owning its channels, members and so on), the
//! process-wide user and webhook stores, and the broadcast channels the
//! translator publishes on. Construct it once and share it by `Arc`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace};

use crate::collection::Collection;
use crate::config::{CacheConfig, Capacities};
use crate::entity::{Cached, Entity, Scope};
use crate::fetch::{FetchPolicy, Fetcher, OfflineFetcher};
use crate::models::{Channel, ForumThread, Guild, Member, Message, User, Webhook};
use crate::notify::{Diagnostic, Notification};
use crate::{CacheError, EntityKind};

/// Live mirror of remote platform state.
pub struct GatewayCache {
    config: CacheConfig,
    capacities: Arc<Capacities>,
    guilds: Collection<Guild>,
    users: Collection<User>,
    webhooks: Collection<Webhook>,
    fetcher: Arc<dyn Fetcher>,
    /// Serializes mutation of one guild's subtree.
    scope_locks: DashMap<String, Arc<Mutex<()>>>,
    notifications_tx: broadcast::Sender<Notification>,
    diagnostics_tx: broadcast::Sender<Diagnostic>,
}

impl GatewayCache {
    /// Create a cache with no fetch transport.
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Self::with_fetcher(config, Arc::new(OfflineFetcher))
    }

    pub fn with_fetcher(config: CacheConfig, fetcher: Arc<dyn Fetcher>) -> Arc<Self> {
        let capacities = Arc::new(config.capacities.clone());
        let (notifications_tx, _) = broadcast::channel(config.notification_buffer);
        let (diagnostics_tx, _) = broadcast::channel(config.notification_buffer);
        Arc::new(Self {
            guilds: Collection::new(&capacities),
            users: Collection::new(&capacities),
            webhooks: Collection::new(&capacities),
            capacities,
            config,
            fetcher,
            scope_locks: DashMap::new(),
            notifications_tx,
            diagnostics_tx,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Subscribe to domain notifications, delivered in processing order.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications_tx.subscribe()
    }

    /// Subscribe to non-fatal diagnostics (failed registrations, dropped events).
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics_tx.subscribe()
    }

    pub(crate) fn notify(&self, notification: Notification) {
        trace!(notification = notification.name(), "cache: notify");
        if self.notifications_tx.send(notification).is_err() {
            trace!("no subscribers for notification");
        }
    }

    pub(crate) fn diagnose(&self, diagnostic: Diagnostic) {
        if self.diagnostics_tx.send(diagnostic).is_err() {
            trace!("no subscribers for diagnostic");
        }
    }

    pub(crate) fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Wrap a record that has no cached parent to live in.
    pub(crate) fn detached<E: Entity>(
        &self,
        raw: E::Raw,
        scope: &Scope,
    ) -> Result<Cached<E>, CacheError> {
        Ok(Cached::new(E::construct(raw, scope)?, &self.capacities))
    }

    pub fn guilds(&self) -> &Collection<Guild> {
        &self.guilds
    }

    pub fn users(&self) -> &Collection<User> {
        &self.users
    }

    pub fn webhooks(&self) -> &Collection<Webhook> {
        &self.webhooks
    }

    pub fn get_guild(&self, guild_id: &str) -> Option<Cached<Guild>> {
        self.guilds.get(&guild_id.to_string())
    }

    pub fn get_channel(&self, guild_id: &str, channel_id: &str) -> Option<Cached<Channel>> {
        self.get_guild(guild_id)?
            .channels()
            .get(&channel_id.to_string())
    }

    pub fn get_forum_thread(
        &self,
        guild_id: &str,
        channel_id: &str,
        thread_id: u64,
    ) -> Option<Cached<ForumThread>> {
        self.get_channel(guild_id, channel_id)?.threads().get(&thread_id)
    }

    pub fn get_member(&self, guild_id: &str, user_id: &str) -> Option<Cached<Member>> {
        self.get_guild(guild_id)?.members().get(&user_id.to_string())
    }

    /// Look up a message, optionally fetching it on a miss.
    ///
    /// A fetched message is stored in its channel when the channel is
    /// cached, and returned detached otherwise.
    pub async fn get_message(
        &self,
        guild_id: &str,
        channel_id: &str,
        message_id: &str,
        policy: FetchPolicy,
    ) -> Result<Option<Cached<Message>>, CacheError> {
        let channel = self.get_channel(guild_id, channel_id);
        if let Some(message) = channel
            .as_ref()
            .and_then(|c| c.messages().get(&message_id.to_string()))
        {
            return Ok(Some(message));
        }
        if policy == FetchPolicy::CacheOnly {
            return Ok(None);
        }

        debug!(guild_id, channel_id, message_id, "fetching message");
        let raw = self
            .fetcher
            .get_message(channel_id, message_id)
            .await
            .map_err(|source| CacheError::FetchFailed {
                kind: EntityKind::Message,
                id: message_id.to_string(),
                source,
            })?;
        let scope = Scope::guild(guild_id).with_channel(channel_id);
        let message = match channel {
            Some(channel) => channel.messages().get_or_insert(raw, &scope)?,
            None => self.detached(raw, &scope)?,
        };
        Ok(Some(message))
    }

    /// Webhooks belonging to one guild, in insertion order.
    pub fn webhooks_by_guild(&self, guild_id: &str) -> Vec<Cached<Webhook>> {
        self.webhooks.filter(|webhook| webhook.guild_id == guild_id)
    }

    /// The mutual-exclusion lock for one guild's subtree.
    ///
    /// The translator holds it while applying an event, and background
    /// registrations hold it until their insert completes, so mutations of
    /// one guild apply in arrival order.
    pub fn scope_lock(&self, guild_id: &str) -> Arc<Mutex<()>> {
        self.scope_locks
            .entry(guild_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop every cached record. Subscribers stay subscribed.
    ///
    /// Scope locks are kept, since a background registration may still hold
    /// one.
    pub fn clear(&self) {
        self.guilds.clear();
        self.users.clear();
        self.webhooks.clear();
        debug!("cache cleared");
    }
}

impl std::fmt::Debug for GatewayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCache")
            .field("guilds", &self.guilds)
            .field("users", &self.users)
            .field("webhooks", &self.webhooks)
            .finish_non_exhaustive()
    }
}
