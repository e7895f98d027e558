//! Cache configuration.
//!
//! Capacities are set per entity kind. A kind missing from a config file keeps
//! its default, `"unbounded"` (or any negative number) disables eviction, and
//! `0` means records of that kind are built for the caller but never retained.
//!
//! ```toml
//! wait_for_caching = false
//!
//! [capacities]
//! messages = 50
//! forum_thread_comments = 0
//! users = "unbounded"
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CacheError;
use crate::entity::EntityKind;

/// Default capacity for nested per-record stores.
pub const DEFAULT_NESTED_CAPACITY: usize = 100;

/// Default capacity of the notification broadcast channels.
///
/// Large enough to absorb a reconnection burst without lagging subscribers.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 4096;

/// Retention limit of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    /// Never evict.
    #[default]
    Unbounded,
    /// Keep at most this many records; `0` keeps none.
    Limit(usize),
}

impl Capacity {
    /// Whether records are retained at all.
    pub fn retains(&self) -> bool {
        !matches!(self, Capacity::Limit(0))
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Limit(n) => Some(*n),
        }
    }
}

impl Serialize for Capacity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Capacity::Unbounded => serializer.serialize_str("unbounded"),
            Capacity::Limit(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Capacity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(i64),
            Word(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) if n < 0 => Ok(Capacity::Unbounded),
            Repr::Count(n) => Ok(Capacity::Limit(n as usize)),
            Repr::Word(w) if w.eq_ignore_ascii_case("unbounded") => Ok(Capacity::Unbounded),
            Repr::Word(w) => Err(serde::de::Error::custom(format!(
                "invalid capacity '{}', expected a number or \"unbounded\"",
                w
            ))),
        }
    }
}

/// Per-kind collection capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    pub guilds: Capacity,
    pub users: Capacity,
    pub webhooks: Capacity,
    pub channels: Capacity,
    pub members: Capacity,
    pub bans: Capacity,
    pub groups: Capacity,
    pub messages: Capacity,
    pub forum_threads: Capacity,
    pub forum_thread_comments: Capacity,
    pub announcements: Capacity,
    pub announcement_comments: Capacity,
    pub calendar_events: Capacity,
    pub calendar_comments: Capacity,
    pub calendar_rsvps: Capacity,
}

impl Default for Capacities {
    fn default() -> Self {
        let nested = Capacity::Limit(DEFAULT_NESTED_CAPACITY);
        Self {
            guilds: Capacity::Unbounded,
            users: Capacity::Unbounded,
            webhooks: Capacity::Unbounded,
            channels: Capacity::Unbounded,
            members: Capacity::Unbounded,
            bans: Capacity::Unbounded,
            groups: Capacity::Unbounded,
            messages: nested,
            forum_threads: nested,
            forum_thread_comments: nested,
            announcements: nested,
            announcement_comments: nested,
            calendar_events: nested,
            calendar_comments: nested,
            calendar_rsvps: nested,
        }
    }
}

impl Capacities {
    /// Capacity for collections holding `kind`.
    pub fn get(&self, kind: EntityKind) -> Capacity {
        *self.slot(kind)
    }

    pub fn set(&mut self, kind: EntityKind, capacity: Capacity) {
        *self.slot_mut(kind) = capacity;
    }

    fn slot(&self, kind: EntityKind) -> &Capacity {
        match kind {
            EntityKind::Guild => &self.guilds,
            EntityKind::User => &self.users,
            EntityKind::Webhook => &self.webhooks,
            EntityKind::Channel => &self.channels,
            EntityKind::Member => &self.members,
            EntityKind::BannedMember => &self.bans,
            EntityKind::Group => &self.groups,
            EntityKind::Message => &self.messages,
            EntityKind::ForumThread => &self.forum_threads,
            EntityKind::ForumThreadComment => &self.forum_thread_comments,
            EntityKind::Announcement => &self.announcements,
            EntityKind::AnnouncementComment => &self.announcement_comments,
            EntityKind::CalendarEvent => &self.calendar_events,
            EntityKind::CalendarComment => &self.calendar_comments,
            EntityKind::CalendarRsvp => &self.calendar_rsvps,
        }
    }

    fn slot_mut(&mut self, kind: EntityKind) -> &mut Capacity {
        match kind {
            EntityKind::Guild => &mut self.guilds,
            EntityKind::User => &mut self.users,
            EntityKind::Webhook => &mut self.webhooks,
            EntityKind::Channel => &mut self.channels,
            EntityKind::Member => &mut self.members,
            EntityKind::BannedMember => &mut self.bans,
            EntityKind::Group => &mut self.groups,
            EntityKind::Message => &mut self.messages,
            EntityKind::ForumThread => &mut self.forum_threads,
            EntityKind::ForumThreadComment => &mut self.forum_thread_comments,
            EntityKind::Announcement => &mut self.announcements,
            EntityKind::AnnouncementComment => &mut self.announcement_comments,
            EntityKind::CalendarEvent => &mut self.calendar_events,
            EntityKind::CalendarComment => &mut self.calendar_comments,
            EntityKind::CalendarRsvp => &mut self.calendar_rsvps,
        }
    }
}

/// Top-level cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Per-kind retention limits.
    pub capacities: Capacities,

    /// When true, lazily registering a newly seen record completes before
    /// its notification is emitted. When false the notification goes out
    /// first and registration finishes in the background.
    pub wait_for_caching: bool,

    /// Capacity of the notification and diagnostic broadcast channels.
    pub notification_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacities: Capacities::default(),
            wait_for_caching: true,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, CacheError> {
        let config: Self =
            toml::from_str(s).map_err(|e| CacheError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.notification_buffer == 0 {
            return Err(CacheError::Config(
                "notification_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the capacity for one entity kind.
    pub fn capacity(mut self, kind: EntityKind, capacity: Capacity) -> Self {
        self.config.capacities.set(kind, capacity);
        self
    }

    pub fn wait_for_caching(mut self, wait: bool) -> Self {
        self.config.wait_for_caching = wait;
        self
    }

    pub fn notification_buffer(mut self, size: usize) -> Self {
        self.config.notification_buffer = size;
        self
    }

    pub fn build(self) -> Result<CacheConfig, CacheError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.wait_for_caching);
        assert_eq!(config.capacities.get(EntityKind::Guild), Capacity::Unbounded);
        assert_eq!(config.capacities.get(EntityKind::User), Capacity::Unbounded);
        assert_eq!(
            config.capacities.get(EntityKind::ForumThreadComment),
            Capacity::Limit(DEFAULT_NESTED_CAPACITY)
        );
    }

    #[test]
    fn test_parse_toml() {
        let config = CacheConfig::from_toml_str(
            r#"
            wait_for_caching = false

            [capacities]
            messages = 50
            forum_thread_comments = 0
            users = "unbounded"
            guilds = -1
            "#,
        )
        .unwrap();

        assert!(!config.wait_for_caching);
        assert_eq!(config.capacities.messages, Capacity::Limit(50));
        assert_eq!(config.capacities.forum_thread_comments, Capacity::Limit(0));
        assert!(!config.capacities.forum_thread_comments.retains());
        assert_eq!(config.capacities.users, Capacity::Unbounded);
        assert_eq!(config.capacities.guilds, Capacity::Unbounded);
        // untouched kinds keep their default
        assert_eq!(
            config.capacities.calendar_rsvps,
            Capacity::Limit(DEFAULT_NESTED_CAPACITY)
        );
    }

    #[test]
    fn test_invalid_capacity_word() {
        let err = CacheConfig::from_toml_str("[capacities]\nmessages = \"lots\"").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = CacheConfig::builder().notification_buffer(0).build().unwrap_err();
        assert!(err.to_string().contains("notification_buffer"));
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::builder()
            .capacity(EntityKind::CalendarComment, Capacity::Limit(2))
            .wait_for_caching(false)
            .build()
            .unwrap();

        assert_eq!(config.capacities.calendar_comments, Capacity::Limit(2));
        assert!(!config.wait_for_caching);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "notification_buffer = 16").unwrap();

        let config = CacheConfig::from_file(file.path()).unwrap();
        assert_eq!(config.notification_buffer, 16);
    }

    #[test]
    fn test_capacity_serializes_back() {
        let mut capacities = Capacities::default();
        capacities.set(EntityKind::Message, Capacity::Limit(7));
        let text = toml::to_string(&capacities).unwrap();
        assert!(text.contains("messages = 7"));
        assert!(text.contains("guilds = \"unbounded\""));
    }
}
