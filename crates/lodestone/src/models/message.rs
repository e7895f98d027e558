//! Chat messages.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Capacities;
use crate::entity::{Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Default,
    System,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessage {
    pub id: Field<String>,
    #[serde(rename = "type")]
    pub kind: Field<MessageType>,
    pub server_id: Field<String>,
    pub group_id: Field<String>,
    pub channel_id: Field<String>,
    pub content: Field<String>,
    pub embeds: Field<Vec<Value>>,
    pub reply_message_ids: Field<Vec<String>>,
    pub is_private: Field<bool>,
    pub is_silent: Field<bool>,
    pub is_pinned: Field<bool>,
    pub mentions: Field<Value>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub created_by_webhook_id: Field<String>,
    pub updated_at: Field<DateTime<Utc>>,
    pub deleted_at: Field<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub kind: MessageType,
    /// Absent for direct messages.
    pub guild_id: Option<String>,
    pub group_id: Option<String>,
    pub channel_id: String,
    pub content: String,
    pub embeds: Vec<Value>,
    pub reply_message_ids: Vec<String>,
    pub is_private: bool,
    pub is_silent: bool,
    pub is_pinned: bool,
    pub mentions: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub member_id: String,
    pub webhook_id: Option<String>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Message {
    type Key = String;
    type Raw = RawMessage;
    type Children = ();

    const KIND: EntityKind = EntityKind::Message;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawMessage, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawMessage, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let channel_id = require(
            raw.channel_id.cloned().or_else(|| scope.channel_id.clone()),
            Self::KIND,
            "channelId",
        )?;
        let mut message = Message {
            id,
            kind: MessageType::Default,
            guild_id: scope.guild_id.clone(),
            group_id: None,
            channel_id,
            content: String::new(),
            embeds: Vec::new(),
            reply_message_ids: Vec::new(),
            is_private: false,
            is_silent: false,
            is_pinned: false,
            mentions: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            member_id: String::new(),
            webhook_id: None,
            edited_timestamp: None,
            deleted_at: None,
        };
        message.merge(raw);
        Ok(message)
    }

    fn merge(&mut self, raw: RawMessage) {
        merge_fields!(raw => self {
            set id <- id,
            set kind <- kind,
            opt guild_id <- server_id,
            opt group_id <- group_id,
            set channel_id <- channel_id,
            set content <- content,
            set embeds <- embeds,
            set reply_message_ids <- reply_message_ids,
            set is_private <- is_private,
            set is_silent <- is_silent,
            set is_pinned <- is_pinned,
            opt mentions <- mentions,
            set created_at <- created_at,
            set member_id <- created_by,
            opt webhook_id <- created_by_webhook_id,
            opt edited_timestamp <- updated_at,
            opt deleted_at <- deleted_at,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edit_keeps_embeds_until_sent() {
        let raw: RawMessage = serde_json::from_value(json!({
            "id": "m1",
            "channelId": "c1",
            "content": "We love Pizza",
            "embeds": [{"title": "Special Ingredient"}],
            "createdBy": "u1",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        let mut message = Message::construct(raw, &Scope::guild("g1")).unwrap();
        assert_eq!(message.guild_id.as_deref(), Some("g1"));

        let edit: RawMessage = serde_json::from_value(json!({
            "content": "We love Pizza!",
            "updatedAt": "2024-03-01T10:05:00Z"
        }))
        .unwrap();
        message.merge(edit);
        assert_eq!(message.embeds.len(), 1);
        assert!(message.edited_timestamp.is_some());

        let strip: RawMessage = serde_json::from_value(json!({"embeds": []})).unwrap();
        message.merge(strip);
        assert!(message.embeds.is_empty());
        assert_eq!(message.content, "We love Pizza!");
    }
}
