//! Gateway event envelopes and typed payloads.
//!
//! Every event arrives as `{ "t": kind, "d": payload }`. The translator
//! decodes `d` into one of the payload structs below once it has matched
//! on `t`; unknown kinds never get that far.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::Field;
use crate::models::{
    RawAnnouncement, RawAnnouncementComment, RawBannedMember, RawCalendarComment,
    RawCalendarEvent, RawCalendarRsvp, RawChannel, RawForumThread, RawForumThreadComment,
    RawGroup, RawGuild, RawMember, RawMessage, RawUser, RawWebhook,
};

/// A raw event from the gateway stream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewayEvent {
    #[serde(rename = "t")]
    pub kind: String,
    #[serde(rename = "d", default)]
    pub data: Value,
}

impl GatewayEvent {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// The guild this event belongs to, if the payload names one.
    pub fn guild_id(&self) -> Option<&str> {
        self.data
            .get("serverId")
            .or_else(|| self.data.get("server").and_then(|s| s.get("id")))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuildMembershipPayload {
    pub server: RawGuild,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChannelPayload {
    pub server_id: String,
    pub channel: RawChannel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePayload {
    #[serde(default)]
    pub server_id: Option<String>,
    pub message: RawMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForumTopicPayload {
    pub server_id: String,
    pub forum_topic: RawForumThread,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForumTopicCommentPayload {
    pub server_id: String,
    pub forum_topic_comment: RawForumThreadComment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnouncementPayload {
    pub server_id: String,
    pub announcement: RawAnnouncement,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnouncementCommentPayload {
    pub server_id: String,
    pub announcement_comment: RawAnnouncementComment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarEventPayload {
    pub server_id: String,
    pub calendar_event: RawCalendarEvent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarCommentPayload {
    pub server_id: String,
    pub calendar_event_comment: RawCalendarComment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RsvpPayload {
    pub server_id: String,
    pub calendar_event_rsvp: RawCalendarRsvp,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RsvpManyPayload {
    pub server_id: String,
    pub calendar_event_rsvps: Vec<RawCalendarRsvp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberJoinedPayload {
    pub server_id: String,
    pub member: RawMember,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberInfo {
    pub id: String,
    #[serde(default)]
    pub nickname: Field<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberUpdatedPayload {
    pub server_id: String,
    pub user_info: MemberInfo,
}

impl MemberUpdatedPayload {
    /// Reshape the update as a partial member payload.
    pub fn into_raw(self) -> RawMember {
        RawMember {
            user: Field::Value(RawUser {
                id: Field::Value(self.user_info.id),
                ..RawUser::default()
            }),
            nickname: self.user_info.nickname,
            ..RawMember::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberRemovedPayload {
    pub server_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_kick: bool,
    #[serde(default)]
    pub is_ban: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberBanPayload {
    pub server_id: String,
    pub server_member_ban: RawBannedMember,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookPayload {
    pub server_id: String,
    pub webhook: RawWebhook,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupPayload {
    pub server_id: String,
    pub group: RawGroup,
}

/// What a permission override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionTarget {
    ChannelRole,
    ChannelUser,
    CategoryRole,
    CategoryUser,
}

impl PermissionTarget {
    /// Payload member holding the override.
    pub(crate) fn payload_key(&self) -> &'static str {
        match self {
            PermissionTarget::ChannelRole => "channelRolePermission",
            PermissionTarget::ChannelUser => "channelUserPermission",
            PermissionTarget::CategoryRole => "channelCategoryRolePermission",
            PermissionTarget::CategoryUser => "channelCategoryUserPermission",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPermissionOverride {
    #[serde(default)]
    pub permissions: HashMap<String, bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<u64>,
}

/// A role or user permission override on a channel or category.
///
/// Overrides are forwarded to subscribers, not cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverride {
    pub target: PermissionTarget,
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub category_id: Option<u64>,
    pub role_id: Option<u64>,
    pub user_id: Option<String>,
    pub permissions: HashMap<String, bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PermissionOverride {
    pub(crate) fn from_raw(
        target: PermissionTarget,
        guild_id: String,
        raw: RawPermissionOverride,
    ) -> Self {
        Self {
            target,
            guild_id,
            channel_id: raw.channel_id,
            category_id: raw.category_id,
            role_id: raw.role_id,
            user_id: raw.user_id,
            permissions: raw.permissions,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

/// An emote used in a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emote {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReaction {
    pub channel_id: String,
    pub created_by: String,
    pub emote: Emote,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub forum_topic_id: Option<u64>,
    #[serde(default)]
    pub forum_topic_comment_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReactionPayload {
    pub server_id: String,
    pub reaction: RawReaction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_decodes() {
        let event: GatewayEvent = serde_json::from_str(
            r#"{"t": "ServerChannelCreated", "d": {"serverId": "g1", "channel": {"id": "c1"}}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "ServerChannelCreated");
        assert_eq!(event.guild_id(), Some("g1"));
    }

    #[test]
    fn test_envelope_without_data() {
        let event: GatewayEvent = serde_json::from_str(r#"{"t": "Heartbeat"}"#).unwrap();
        assert_eq!(event.data, Value::Null);
        assert_eq!(event.guild_id(), None);
    }

    #[test]
    fn test_guild_id_from_membership_payload() {
        let event = GatewayEvent::new(
            "BotServerMembershipCreated",
            json!({"server": {"id": "g9"}, "createdBy": "u1"}),
        );
        assert_eq!(event.guild_id(), Some("g9"));
    }

    #[test]
    fn test_member_update_reshapes() {
        let payload: MemberUpdatedPayload = serde_json::from_value(json!({
            "serverId": "g1",
            "userInfo": {"id": "u1", "nickname": null}
        }))
        .unwrap();
        let raw = payload.into_raw();
        assert_eq!(raw.nickname, Field::Null);
        assert!(raw.role_ids.is_absent());
        let user = raw.user.value().unwrap();
        assert_eq!(user.id, Field::Value("u1".to_string()));
    }
}
