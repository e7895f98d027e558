//! Guild channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::config::Capacities;
use crate::entity::{Cached, Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::models::{Announcement, CalendarEvent, ForumThread, Message};
use crate::CacheError;

/// Content type of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Announcements,
    Chat,
    Calendar,
    Forums,
    Media,
    Docs,
    Voice,
    List,
    Scheduling,
    Stream,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Who can see a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelVisibility {
    #[default]
    Public,
    Private,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawChannel {
    pub id: Field<String>,
    #[serde(rename = "type")]
    pub kind: Field<ChannelType>,
    pub name: Field<String>,
    pub topic: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub updated_at: Field<DateTime<Utc>>,
    pub server_id: Field<String>,
    pub parent_id: Field<String>,
    pub category_id: Field<u64>,
    pub group_id: Field<String>,
    pub is_public: Field<bool>,
    pub visibility: Field<ChannelVisibility>,
    pub archived_by: Field<String>,
    pub archived_at: Field<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub kind: ChannelType,
    pub name: String,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub creator_id: String,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub guild_id: String,
    pub parent_id: Option<String>,
    pub category_id: Option<u64>,
    pub group_id: Option<String>,
    pub is_public: bool,
    pub visibility: ChannelVisibility,
    pub archived_by: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Stores owned by a cached channel. Which ones fill up depends on the
/// channel type.
#[derive(Debug)]
pub struct ChannelChildren {
    pub messages: Collection<Message>,
    pub threads: Collection<ForumThread>,
    pub announcements: Collection<Announcement>,
    pub calendar_events: Collection<CalendarEvent>,
}

impl Entity for Channel {
    type Key = String;
    type Raw = RawChannel;
    type Children = ChannelChildren;

    const KIND: EntityKind = EntityKind::Channel;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawChannel, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawChannel, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let guild_id = require(
            raw.server_id.cloned().or_else(|| scope.guild_id.clone()),
            Self::KIND,
            "serverId",
        )?;
        let mut channel = Channel {
            id,
            kind: ChannelType::Unknown,
            name: String::new(),
            topic: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            creator_id: String::new(),
            edited_timestamp: None,
            guild_id,
            parent_id: None,
            category_id: None,
            group_id: None,
            is_public: false,
            visibility: ChannelVisibility::Public,
            archived_by: None,
            archived_at: None,
        };
        channel.merge(raw);
        Ok(channel)
    }

    fn merge(&mut self, raw: RawChannel) {
        merge_fields!(raw => self {
            set id <- id,
            set kind <- kind,
            set name <- name,
            opt topic <- topic,
            set created_at <- created_at,
            set creator_id <- created_by,
            opt edited_timestamp <- updated_at,
            set guild_id <- server_id,
            opt parent_id <- parent_id,
            opt category_id <- category_id,
            opt group_id <- group_id,
            set is_public <- is_public,
            set visibility <- visibility,
            opt archived_by <- archived_by,
            opt archived_at <- archived_at,
        });
    }

    fn children(capacities: &Arc<Capacities>) -> ChannelChildren {
        ChannelChildren {
            messages: Collection::new(capacities),
            threads: Collection::new(capacities),
            announcements: Collection::new(capacities),
            calendar_events: Collection::new(capacities),
        }
    }
}

impl Cached<Channel> {
    pub fn messages(&self) -> &Collection<Message> {
        &self.children().messages
    }

    pub fn threads(&self) -> &Collection<ForumThread> {
        &self.children().threads
    }

    pub fn announcements(&self) -> &Collection<Announcement> {
        &self.children().announcements
    }

    pub fn calendar_events(&self) -> &Collection<CalendarEvent> {
        &self.children().calendar_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawChannel {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_construct_uses_scope_guild() {
        let channel = Channel::construct(
            raw(json!({"id": "c1", "type": "chat", "name": "general"})),
            &Scope::guild("g1"),
        )
        .unwrap();

        assert_eq!(channel.guild_id, "g1");
        assert_eq!(channel.kind, ChannelType::Chat);
        assert!(!channel.is_archived());
    }

    #[test]
    fn test_construct_requires_guild() {
        let err = Channel::construct(raw(json!({"id": "c1"})), &Scope::default()).unwrap_err();
        assert!(err.to_string().contains("serverId"));
    }

    #[test]
    fn test_unknown_channel_type() {
        let channel = Channel::construct(
            raw(json!({"id": "c1", "serverId": "g1", "type": "hologram"})),
            &Scope::default(),
        )
        .unwrap();
        assert_eq!(channel.kind, ChannelType::Unknown);
    }

    #[test]
    fn test_archive_then_restore() {
        let mut channel = Channel::construct(
            raw(json!({"id": "c1", "serverId": "g1", "name": "general"})),
            &Scope::default(),
        )
        .unwrap();

        channel.merge(raw(json!({
            "archivedAt": "2024-02-01T00:00:00Z",
            "archivedBy": "u1"
        })));
        assert!(channel.is_archived());

        channel.merge(raw(json!({"archivedAt": null, "archivedBy": null})));
        assert!(!channel.is_archived());
        assert_eq!(channel.name, "general");
    }
}
