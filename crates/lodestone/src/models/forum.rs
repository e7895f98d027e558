//! Forum threads and their comments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::Collection;
use crate::config::Capacities;
use crate::entity::{Cached, Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawForumThread {
    pub id: Field<u64>,
    pub server_id: Field<String>,
    pub group_id: Field<String>,
    pub channel_id: Field<String>,
    pub title: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub updated_at: Field<DateTime<Utc>>,
    pub bumped_at: Field<DateTime<Utc>>,
    pub is_pinned: Field<bool>,
    pub is_locked: Field<bool>,
    pub content: Field<String>,
    pub mentions: Field<Value>,
}

/// A topic posted in a forum channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumThread {
    pub id: u64,
    pub guild_id: String,
    pub group_id: Option<String>,
    pub channel_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub bumped_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub content: String,
    pub mentions: Option<Value>,
}

#[derive(Debug)]
pub struct ForumThreadChildren {
    pub comments: Collection<ForumThreadComment>,
}

impl Entity for ForumThread {
    type Key = u64;
    type Raw = RawForumThread;
    type Children = ForumThreadChildren;

    const KIND: EntityKind = EntityKind::ForumThread;

    fn key(&self) -> u64 {
        self.id
    }

    fn raw_key(raw: &RawForumThread, _scope: &Scope) -> Option<u64> {
        raw.id.cloned()
    }

    fn construct(raw: RawForumThread, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let channel_id = require(
            raw.channel_id.cloned().or_else(|| scope.channel_id.clone()),
            Self::KIND,
            "channelId",
        )?;
        let mut thread = ForumThread {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            group_id: None,
            channel_id,
            name: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            owner_id: String::new(),
            edited_timestamp: None,
            bumped_at: None,
            is_pinned: false,
            is_locked: false,
            content: String::new(),
            mentions: None,
        };
        thread.merge(raw);
        Ok(thread)
    }

    fn merge(&mut self, raw: RawForumThread) {
        merge_fields!(raw => self {
            set id <- id,
            set guild_id <- server_id,
            opt group_id <- group_id,
            set channel_id <- channel_id,
            set name <- title,
            set created_at <- created_at,
            set owner_id <- created_by,
            opt edited_timestamp <- updated_at,
            opt bumped_at <- bumped_at,
            set is_pinned <- is_pinned,
            set is_locked <- is_locked,
            set content <- content,
            opt mentions <- mentions,
        });
    }

    fn children(capacities: &Arc<Capacities>) -> ForumThreadChildren {
        ForumThreadChildren {
            comments: Collection::new(capacities),
        }
    }
}

impl Cached<ForumThread> {
    pub fn comments(&self) -> &Collection<ForumThreadComment> {
        &self.children().comments
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawForumThreadComment {
    pub id: Field<u64>,
    pub content: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub updated_at: Field<DateTime<Utc>>,
    pub channel_id: Field<String>,
    pub forum_topic_id: Field<u64>,
    pub created_by: Field<String>,
    pub mentions: Field<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumThreadComment {
    pub id: u64,
    /// Not sent by the platform; filled from the enclosing event.
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub thread_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub member_id: String,
    pub mentions: Option<Value>,
}

impl Entity for ForumThreadComment {
    type Key = u64;
    type Raw = RawForumThreadComment;
    type Children = ();

    const KIND: EntityKind = EntityKind::ForumThreadComment;

    fn key(&self) -> u64 {
        self.id
    }

    fn raw_key(raw: &RawForumThreadComment, _scope: &Scope) -> Option<u64> {
        raw.id.cloned()
    }

    fn construct(raw: RawForumThreadComment, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let thread_id = require(raw.forum_topic_id.cloned(), Self::KIND, "forumTopicId")?;
        let mut comment = ForumThreadComment {
            id,
            guild_id: scope.guild_id.clone(),
            channel_id: scope.channel_id.clone().unwrap_or_default(),
            thread_id,
            content: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            edited_timestamp: None,
            member_id: String::new(),
            mentions: None,
        };
        comment.merge(raw);
        Ok(comment)
    }

    fn merge(&mut self, raw: RawForumThreadComment) {
        merge_fields!(raw => self {
            set id <- id,
            set channel_id <- channel_id,
            set thread_id <- forum_topic_id,
            set content <- content,
            set created_at <- created_at,
            opt edited_timestamp <- updated_at,
            set member_id <- created_by,
            opt mentions <- mentions,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lock_and_pin_merge() {
        let raw: RawForumThread = serde_json::from_value(json!({
            "id": 7,
            "serverId": "g1",
            "channelId": "c1",
            "title": "Best toppings",
            "content": "Discuss",
            "createdBy": "u1",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let mut thread = ForumThread::construct(raw, &Scope::default()).unwrap();
        assert!(!thread.is_locked);
        assert!(!thread.is_pinned);

        thread.merge(serde_json::from_value(json!({"isLocked": true})).unwrap());
        thread.merge(serde_json::from_value(json!({"isPinned": true})).unwrap());

        assert!(thread.is_locked);
        assert!(thread.is_pinned);
        assert_eq!(thread.name, "Best toppings");
    }

    #[test]
    fn test_comment_takes_guild_from_scope() {
        let raw: RawForumThreadComment = serde_json::from_value(json!({
            "id": 3,
            "forumTopicId": 7,
            "channelId": "c1",
            "content": "pineapple",
            "createdBy": "u2",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let comment = ForumThreadComment::construct(raw, &Scope::guild("g1")).unwrap();
        assert_eq!(comment.guild_id.as_deref(), Some("g1"));
        assert_eq!(comment.thread_id, 7);
    }
}
