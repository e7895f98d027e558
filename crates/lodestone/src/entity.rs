//! The entity abstraction shared by every cached record.
//!
//! An entity is plain data (`Clone`, `Serialize`) plus the stores it owns.
//! The cache hands out [`Cached`] handles: a merge mutates the record behind
//! the handle, so every holder observes it and identity is preserved. Child
//! records refer to their parents by ID only.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

use crate::CacheError;
use crate::config::Capacities;

/// Every kind of record the cache knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Guild,
    Channel,
    Message,
    ForumThread,
    ForumThreadComment,
    Announcement,
    AnnouncementComment,
    CalendarEvent,
    CalendarComment,
    CalendarRsvp,
    Member,
    User,
    BannedMember,
    Group,
    Webhook,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 15] = [
        EntityKind::Guild,
        EntityKind::Channel,
        EntityKind::Message,
        EntityKind::ForumThread,
        EntityKind::ForumThreadComment,
        EntityKind::Announcement,
        EntityKind::AnnouncementComment,
        EntityKind::CalendarEvent,
        EntityKind::CalendarComment,
        EntityKind::CalendarRsvp,
        EntityKind::Member,
        EntityKind::User,
        EntityKind::BannedMember,
        EntityKind::Group,
        EntityKind::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Guild => "guild",
            EntityKind::Channel => "channel",
            EntityKind::Message => "message",
            EntityKind::ForumThread => "forum_thread",
            EntityKind::ForumThreadComment => "forum_thread_comment",
            EntityKind::Announcement => "announcement",
            EntityKind::AnnouncementComment => "announcement_comment",
            EntityKind::CalendarEvent => "calendar_event",
            EntityKind::CalendarComment => "calendar_comment",
            EntityKind::CalendarRsvp => "calendar_rsvp",
            EntityKind::Member => "member",
            EntityKind::User => "user",
            EntityKind::BannedMember => "banned_member",
            EntityKind::Group => "group",
            EntityKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IDs known from the surrounding event or store but absent from a payload.
///
/// Comments, for instance, never carry their guild ID on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

impl Scope {
    pub fn guild(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id.into()),
            channel_id: None,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }
}

/// A record kind that can live in a [`Collection`](crate::Collection).
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    /// Collection key.
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Partial wire payload.
    type Raw: fmt::Debug + Send;
    /// Stores owned by each live record (`()` for leaves).
    type Children: Send + Sync + 'static;

    const KIND: EntityKind;

    /// Key of this record.
    fn key(&self) -> Self::Key;

    /// Key a payload would be stored under, if it carries one.
    fn raw_key(raw: &Self::Raw, scope: &Scope) -> Option<Self::Key>;

    /// Build a record from a payload, applying defaults for missing fields.
    fn construct(raw: Self::Raw, scope: &Scope) -> Result<Self, CacheError>;

    /// Apply the fields present in a partial payload.
    fn merge(&mut self, raw: Self::Raw);

    /// Fresh child stores for a newly cached record.
    fn children(capacities: &Arc<Capacities>) -> Self::Children;
}

/// Shared handle to a live cached record.
///
/// Cloning the handle does not clone the record; use [`Cached::snapshot`]
/// for an independent value.
pub struct Cached<E: Entity> {
    slot: Arc<Slot<E>>,
}

struct Slot<E: Entity> {
    data: RwLock<E>,
    children: E::Children,
}

impl<E: Entity> Cached<E> {
    pub(crate) fn new(entity: E, capacities: &Arc<Capacities>) -> Self {
        Self {
            slot: Arc::new(Slot {
                data: RwLock::new(entity),
                children: E::children(capacities),
            }),
        }
    }

    /// Independent copy of the record's current fields.
    pub fn snapshot(&self) -> E {
        self.slot.data.read().clone()
    }

    /// Read access to the live record.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn read(&self) -> RwLockReadGuard<'_, E> {
        self.slot.data.read()
    }

    /// Stores owned by this record.
    pub fn children(&self) -> &E::Children {
        &self.slot.children
    }

    pub fn key(&self) -> E::Key {
        self.slot.data.read().key()
    }

    /// True if both handles point at the same live record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub(crate) fn merge(&self, raw: E::Raw) {
        self.slot.data.write().merge(raw);
    }
}

impl<E: Entity> Clone for Cached<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E: Entity + fmt::Debug> fmt::Debug for Cached<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cached").field(&*self.slot.data.read()).finish()
    }
}

/// Require a payload member, or report the event as malformed.
pub(crate) fn require<T>(
    field: Option<T>,
    kind: EntityKind,
    name: &str,
) -> Result<T, CacheError> {
    field.ok_or_else(|| CacheError::malformed(kind.as_str(), format!("missing {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_matches_serde() {
        for kind in EntityKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_scope_builder() {
        let scope = Scope::guild("g1").with_channel("c1");
        assert_eq!(scope.guild_id.as_deref(), Some("g1"));
        assert_eq!(scope.channel_id.as_deref(), Some("c1"));
    }
}
