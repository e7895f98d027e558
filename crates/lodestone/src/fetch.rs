//! The fetch-by-ID collaborator.
//!
//! The cache never talks to the network on its own. Anything that needs an
//! authoritative copy of a missing record goes through a [`Fetcher`], which
//! returns the canonical payload or a transport error.

use async_trait::async_trait;

use crate::FetchError;
use crate::models::{RawChannel, RawForumThread, RawGuild, RawMember, RawMessage, RawUser};

/// Whether a lookup may fall back to the fetch collaborator on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Answer from the cache only.
    #[default]
    CacheOnly,
    /// Fetch, cache and return the record on a miss.
    Fetch,
}

/// Fetches canonical payloads by ID.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_guild(&self, guild_id: &str) -> Result<RawGuild, FetchError>;

    async fn get_channel(&self, channel_id: &str) -> Result<RawChannel, FetchError>;

    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<RawMember, FetchError>;

    async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<RawMessage, FetchError>;

    async fn get_forum_thread(
        &self,
        channel_id: &str,
        thread_id: u64,
    ) -> Result<RawForumThread, FetchError>;

    async fn get_user(&self, user_id: &str) -> Result<RawUser, FetchError>;
}

/// A fetcher with no transport. Every request fails with
/// [`FetchError::Unavailable`], so lookups degrade to cache and stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl OfflineFetcher {
    fn unavailable<T>(what: &str) -> Result<T, FetchError> {
        Err(FetchError::Unavailable(format!("no fetcher configured for {}", what)))
    }
}

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn get_guild(&self, _guild_id: &str) -> Result<RawGuild, FetchError> {
        Self::unavailable("guilds")
    }

    async fn get_channel(&self, _channel_id: &str) -> Result<RawChannel, FetchError> {
        Self::unavailable("channels")
    }

    async fn get_member(&self, _guild_id: &str, _user_id: &str) -> Result<RawMember, FetchError> {
        Self::unavailable("members")
    }

    async fn get_message(
        &self,
        _channel_id: &str,
        _message_id: &str,
    ) -> Result<RawMessage, FetchError> {
        Self::unavailable("messages")
    }

    async fn get_forum_thread(
        &self,
        _channel_id: &str,
        _thread_id: u64,
    ) -> Result<RawForumThread, FetchError> {
        Self::unavailable("forum threads")
    }

    async fn get_user(&self, _user_id: &str) -> Result<RawUser, FetchError> {
        Self::unavailable("users")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_fetcher_is_unavailable() {
        let err = OfflineFetcher.get_guild("g1").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
        assert_eq!(err.to_string(), "fetch unavailable: no fetcher configured for guilds");
    }

    #[test]
    fn test_default_policy_is_cache_only() {
        assert_eq!(FetchPolicy::default(), FetchPolicy::CacheOnly);
    }
}
