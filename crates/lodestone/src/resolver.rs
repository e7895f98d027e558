//! Cross-entity lookups with a stub and fetch fallback.
//!
//! Gateway payloads name their parents by ID without embedding them. A
//! lookup first tries the cache, then falls back to a stub carrying only the
//! IDs the caller already knows. Network fetches happen only through the
//! explicit `fetch_*` methods or [`FetchPolicy::Fetch`].

use serde::Serialize;
use tracing::debug;

use crate::cache::GatewayCache;
use crate::entity::{Cached, Entity, EntityKind, Scope};
use crate::fetch::FetchPolicy;
use crate::models::{Channel, ForumThread, Guild, Member, Message, User};
use crate::{CacheError, FetchError};

/// A cached record, or a stub built from IDs in the triggering payload.
#[derive(Debug, Clone)]
pub enum Resolved<E: Entity, S> {
    Cached(Cached<E>),
    Stub(S),
}

impl<E: Entity, S> Resolved<E, S> {
    pub fn is_cached(&self) -> bool {
        matches!(self, Resolved::Cached(_))
    }

    pub fn cached(&self) -> Option<&Cached<E>> {
        match self {
            Resolved::Cached(entity) => Some(entity),
            Resolved::Stub(_) => None,
        }
    }

    pub fn stub(&self) -> Option<&S> {
        match self {
            Resolved::Cached(_) => None,
            Resolved::Stub(stub) => Some(stub),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildStub {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStub {
    pub id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStub {
    pub id: u64,
    pub guild_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStub {
    pub id: String,
    pub guild_id: String,
    pub channel_id: String,
}

/// A guild member if one is cached, otherwise the bare user.
#[derive(Debug, Clone)]
pub enum MemberRef {
    Member(Cached<Member>),
    User(Cached<User>),
}

impl MemberRef {
    pub fn user_id(&self) -> String {
        match self {
            MemberRef::Member(member) => member.key(),
            MemberRef::User(user) => user.key(),
        }
    }

    pub fn as_member(&self) -> Option<&Cached<Member>> {
        match self {
            MemberRef::Member(member) => Some(member),
            MemberRef::User(_) => None,
        }
    }
}

fn fetch_failed(kind: EntityKind, id: impl ToString) -> impl FnOnce(FetchError) -> CacheError {
    move |source| CacheError::FetchFailed {
        kind,
        id: id.to_string(),
        source,
    }
}

impl GatewayCache {
    pub fn resolve_guild(&self, guild_id: &str) -> Resolved<Guild, GuildStub> {
        match self.get_guild(guild_id) {
            Some(guild) => Resolved::Cached(guild),
            None => Resolved::Stub(GuildStub {
                id: guild_id.to_string(),
            }),
        }
    }

    pub fn resolve_channel(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Resolved<Channel, ChannelStub> {
        match self.get_channel(guild_id, channel_id) {
            Some(channel) => Resolved::Cached(channel),
            None => Resolved::Stub(ChannelStub {
                id: channel_id.to_string(),
                guild_id: guild_id.to_string(),
            }),
        }
    }

    /// The thread a forum reaction points at.
    pub fn resolve_forum_thread(
        &self,
        guild_id: &str,
        channel_id: &str,
        thread_id: u64,
    ) -> Resolved<ForumThread, ThreadStub> {
        match self.get_forum_thread(guild_id, channel_id, thread_id) {
            Some(thread) => Resolved::Cached(thread),
            None => Resolved::Stub(ThreadStub {
                id: thread_id,
                guild_id: guild_id.to_string(),
                channel_id: channel_id.to_string(),
            }),
        }
    }

    pub fn resolve_message(
        &self,
        guild_id: &str,
        channel_id: &str,
        message_id: &str,
    ) -> Resolved<Message, MessageStub> {
        let cached = self
            .get_channel(guild_id, channel_id)
            .and_then(|channel| channel.messages().get(&message_id.to_string()));
        match cached {
            Some(message) => Resolved::Cached(message),
            None => Resolved::Stub(MessageStub {
                id: message_id.to_string(),
                guild_id: guild_id.to_string(),
                channel_id: channel_id.to_string(),
            }),
        }
    }

    /// The owning guild of a record, which must be cached.
    pub fn require_guild(&self, guild_id: &str) -> Result<Cached<Guild>, CacheError> {
        self.get_guild(guild_id)
            .ok_or_else(|| CacheError::not_cached(EntityKind::Guild, guild_id))
    }

    /// Resolve a user in the context of a guild.
    ///
    /// Prefers the cached member, then the cached user. With
    /// [`FetchPolicy::Fetch`] a miss fetches the member; the result is
    /// stored when its guild is cached.
    pub async fn member(
        &self,
        guild_id: &str,
        user_id: &str,
        policy: FetchPolicy,
    ) -> Result<Option<MemberRef>, CacheError> {
        if let Some(member) = self.get_member(guild_id, user_id) {
            return Ok(Some(MemberRef::Member(member)));
        }
        if policy == FetchPolicy::CacheOnly {
            return Ok(self.users().get(&user_id.to_string()).map(MemberRef::User));
        }

        debug!(guild_id, user_id, "fetching member");
        let raw = self
            .fetcher()
            .get_member(guild_id, user_id)
            .await
            .map_err(fetch_failed(EntityKind::Member, user_id))?;
        let scope = Scope::guild(guild_id);
        let member = match self.get_guild(guild_id) {
            Some(guild) => guild.members().get_or_insert(raw, &scope)?,
            None => self.detached(raw, &scope)?,
        };
        Ok(Some(MemberRef::Member(member)))
    }

    /// Return the cached guild, or fetch and cache it.
    pub async fn fetch_guild(&self, guild_id: &str) -> Result<Cached<Guild>, CacheError> {
        if let Some(guild) = self.get_guild(guild_id) {
            return Ok(guild);
        }
        debug!(guild_id, "fetching guild");
        let raw = self
            .fetcher()
            .get_guild(guild_id)
            .await
            .map_err(fetch_failed(EntityKind::Guild, guild_id))?;
        self.guilds().get_or_insert(raw, &Scope::default())
    }

    /// Return the cached user, or fetch and cache it.
    pub async fn fetch_user(&self, user_id: &str) -> Result<Cached<User>, CacheError> {
        if let Some(user) = self.users().get(&user_id.to_string()) {
            return Ok(user);
        }
        debug!(user_id, "fetching user");
        let raw = self
            .fetcher()
            .get_user(user_id)
            .await
            .map_err(fetch_failed(EntityKind::User, user_id))?;
        self.users().get_or_insert(raw, &Scope::default())
    }

    /// Return the cached channel, or fetch it.
    ///
    /// The fetched channel is stored when its guild is cached.
    pub async fn fetch_channel(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Cached<Channel>, CacheError> {
        if let Some(channel) = self.get_channel(guild_id, channel_id) {
            return Ok(channel);
        }
        debug!(guild_id, channel_id, "fetching channel");
        let raw = self
            .fetcher()
            .get_channel(channel_id)
            .await
            .map_err(fetch_failed(EntityKind::Channel, channel_id))?;
        let scope = Scope::guild(guild_id);
        match self.get_guild(guild_id) {
            Some(guild) => guild.channels().get_or_insert(raw, &scope),
            None => self.detached(raw, &scope),
        }
    }

    pub async fn fetch_forum_thread(
        &self,
        guild_id: &str,
        channel_id: &str,
        thread_id: u64,
    ) -> Result<Cached<ForumThread>, CacheError> {
        if let Some(thread) = self.get_forum_thread(guild_id, channel_id, thread_id) {
            return Ok(thread);
        }
        debug!(guild_id, channel_id, thread_id, "fetching forum thread");
        let raw = self
            .fetcher()
            .get_forum_thread(channel_id, thread_id)
            .await
            .map_err(fetch_failed(EntityKind::ForumThread, thread_id))?;
        let scope = Scope::guild(guild_id).with_channel(channel_id);
        match self.get_channel(guild_id, channel_id) {
            Some(channel) => channel.threads().get_or_insert(raw, &scope),
            None => self.detached(raw, &scope),
        }
    }
}
