//! Calendar events, their comments and RSVPs.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::Collection;
use crate::config::Capacities;
use crate::entity::{Cached, Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCalendarEvent {
    pub id: Field<u64>,
    pub server_id: Field<String>,
    pub group_id: Field<String>,
    pub channel_id: Field<String>,
    pub name: Field<String>,
    pub description: Field<String>,
    pub location: Field<String>,
    pub url: Field<String>,
    pub color: Field<u32>,
    pub repeats: Field<bool>,
    pub series_id: Field<String>,
    pub role_ids: Field<Vec<u64>>,
    pub rsvp_disabled: Field<bool>,
    pub is_all_day: Field<bool>,
    pub rsvp_limit: Field<u32>,
    pub auto_fill_waitlist: Field<bool>,
    pub starts_at: Field<DateTime<Utc>>,
    pub duration: Field<u64>,
    pub is_private: Field<bool>,
    pub mentions: Field<Value>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub cancellation: Field<Cancellation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: u64,
    pub guild_id: String,
    pub group_id: Option<String>,
    pub channel_id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    pub repeats: bool,
    pub series_id: Option<String>,
    pub role_ids: Vec<u64>,
    pub rsvp_disabled: bool,
    pub is_all_day: bool,
    pub rsvp_limit: Option<u32>,
    pub auto_fill_waitlist: bool,
    pub starts_at: DateTime<Utc>,
    /// Minutes.
    pub duration: Option<u64>,
    pub is_private: bool,
    pub mentions: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub cancellation: Option<Cancellation>,
}

#[derive(Debug)]
pub struct CalendarEventChildren {
    pub comments: Collection<CalendarComment>,
    pub rsvps: Collection<CalendarRsvp>,
}

impl Entity for CalendarEvent {
    type Key = u64;
    type Raw = RawCalendarEvent;
    type Children = CalendarEventChildren;

    const KIND: EntityKind = EntityKind::CalendarEvent;

    fn key(&self) -> u64 {
        self.id
    }

    fn raw_key(raw: &RawCalendarEvent, _scope: &Scope) -> Option<u64> {
        raw.id.cloned()
    }

    fn construct(raw: RawCalendarEvent, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let channel_id = require(
            raw.channel_id.cloned().or_else(|| scope.channel_id.clone()),
            Self::KIND,
            "channelId",
        )?;
        let mut event = CalendarEvent {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            group_id: None,
            channel_id,
            name: String::new(),
            description: None,
            location: None,
            url: None,
            color: None,
            repeats: false,
            series_id: None,
            role_ids: Vec::new(),
            rsvp_disabled: false,
            is_all_day: false,
            rsvp_limit: None,
            auto_fill_waitlist: false,
            starts_at: DateTime::<Utc>::UNIX_EPOCH,
            duration: None,
            is_private: false,
            mentions: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            owner_id: String::new(),
            cancellation: None,
        };
        event.merge(raw);
        Ok(event)
    }

    fn merge(&mut self, raw: RawCalendarEvent) {
        merge_fields!(raw => self {
            set id <- id,
            set guild_id <- server_id,
            opt group_id <- group_id,
            set channel_id <- channel_id,
            set name <- name,
            opt description <- description,
            opt location <- location,
            opt url <- url,
            opt color <- color,
            set repeats <- repeats,
            opt series_id <- series_id,
            set role_ids <- role_ids,
            set rsvp_disabled <- rsvp_disabled,
            set is_all_day <- is_all_day,
            opt rsvp_limit <- rsvp_limit,
            set auto_fill_waitlist <- auto_fill_waitlist,
            set starts_at <- starts_at,
            opt duration <- duration,
            set is_private <- is_private,
            opt mentions <- mentions,
            set created_at <- created_at,
            set owner_id <- created_by,
            opt cancellation <- cancellation,
        });
    }

    fn children(capacities: &Arc<Capacities>) -> CalendarEventChildren {
        CalendarEventChildren {
            comments: Collection::new(capacities),
            rsvps: Collection::new(capacities),
        }
    }
}

impl Cached<CalendarEvent> {
    pub fn comments(&self) -> &Collection<CalendarComment> {
        &self.children().comments
    }

    pub fn rsvps(&self) -> &Collection<CalendarRsvp> {
        &self.children().rsvps
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCalendarComment {
    pub id: Field<u64>,
    pub content: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub updated_at: Field<DateTime<Utc>>,
    pub calendar_event_id: Field<u64>,
    pub channel_id: Field<String>,
    pub created_by: Field<String>,
    pub mentions: Field<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarComment {
    pub id: u64,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub event_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub member_id: String,
    pub mentions: Option<Value>,
}

impl Entity for CalendarComment {
    type Key = u64;
    type Raw = RawCalendarComment;
    type Children = ();

    const KIND: EntityKind = EntityKind::CalendarComment;

    fn key(&self) -> u64 {
        self.id
    }

    fn raw_key(raw: &RawCalendarComment, _scope: &Scope) -> Option<u64> {
        raw.id.cloned()
    }

    fn construct(raw: RawCalendarComment, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let event_id = require(raw.calendar_event_id.cloned(), Self::KIND, "calendarEventId")?;
        let mut comment = CalendarComment {
            id,
            guild_id: scope.guild_id.clone(),
            channel_id: scope.channel_id.clone().unwrap_or_default(),
            event_id,
            content: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: None,
            member_id: String::new(),
            mentions: None,
        };
        comment.merge(raw);
        Ok(comment)
    }

    fn merge(&mut self, raw: RawCalendarComment) {
        merge_fields!(raw => self {
            set id <- id,
            set channel_id <- channel_id,
            set event_id <- calendar_event_id,
            set content <- content,
            set created_at <- created_at,
            opt updated_at <- updated_at,
            set member_id <- created_by,
            opt mentions <- mentions,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

/// A user's answer to a calendar event invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RsvpStatus {
    #[serde(rename = "going")]
    Going,
    #[serde(rename = "maybe")]
    Maybe,
    #[serde(rename = "declined")]
    Declined,
    #[serde(rename = "invited")]
    #[default]
    Invited,
    #[serde(rename = "waitlisted")]
    Waitlisted,
    #[serde(rename = "not responded")]
    NotResponded,
}

/// RSVPs are unique per event and user; the event ID alone is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RsvpKey {
    pub event_id: u64,
    pub user_id: String,
}

impl fmt::Display for RsvpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event_id, self.user_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCalendarRsvp {
    pub calendar_event_id: Field<u64>,
    pub channel_id: Field<String>,
    pub server_id: Field<String>,
    pub user_id: Field<String>,
    pub status: Field<RsvpStatus>,
    pub created_by: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub updated_by: Field<String>,
    pub updated_at: Field<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRsvp {
    /// The calendar event this RSVP answers.
    pub id: u64,
    pub guild_id: String,
    pub channel_id: String,
    /// The responding user.
    pub entity_id: String,
    pub status: RsvpStatus,
    pub creator_id: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for CalendarRsvp {
    type Key = RsvpKey;
    type Raw = RawCalendarRsvp;
    type Children = ();

    const KIND: EntityKind = EntityKind::CalendarRsvp;

    fn key(&self) -> RsvpKey {
        RsvpKey {
            event_id: self.id,
            user_id: self.entity_id.clone(),
        }
    }

    fn raw_key(raw: &RawCalendarRsvp, _scope: &Scope) -> Option<RsvpKey> {
        Some(RsvpKey {
            event_id: raw.calendar_event_id.cloned()?,
            user_id: raw.user_id.cloned()?,
        })
    }

    fn construct(raw: RawCalendarRsvp, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.calendar_event_id.cloned(), Self::KIND, "calendarEventId")?;
        let entity_id = require(raw.user_id.cloned(), Self::KIND, "userId")?;
        let mut rsvp = CalendarRsvp {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            channel_id: scope.channel_id.clone().unwrap_or_default(),
            entity_id,
            status: RsvpStatus::default(),
            creator_id: None,
            updated_by: None,
            created_at: None,
            updated_at: None,
        };
        rsvp.merge(raw);
        Ok(rsvp)
    }

    fn merge(&mut self, raw: RawCalendarRsvp) {
        merge_fields!(raw => self {
            set id <- calendar_event_id,
            set channel_id <- channel_id,
            set guild_id <- server_id,
            set entity_id <- user_id,
            set status <- status,
            opt creator_id <- created_by,
            opt created_at <- created_at,
            opt updated_by <- updated_by,
            opt updated_at <- updated_at,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rsvp(status: &str) -> RawCalendarRsvp {
        serde_json::from_value(json!({
            "calendarEventId": 42,
            "channelId": "c1",
            "serverId": "g1",
            "userId": "u1",
            "status": status,
            "createdBy": "u1",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_rsvp_id_is_event_id() {
        let rsvp = CalendarRsvp::construct(rsvp("going"), &Scope::default()).unwrap();
        assert_eq!(rsvp.id, 42);
        assert_eq!(rsvp.entity_id, "u1");
        assert_eq!(rsvp.status, RsvpStatus::Going);
        assert_eq!(
            rsvp.key(),
            RsvpKey {
                event_id: 42,
                user_id: "u1".to_string()
            }
        );
    }

    #[test]
    fn test_rsvp_status_update() {
        let mut entry = CalendarRsvp::construct(rsvp("going"), &Scope::default()).unwrap();
        entry.merge(rsvp("not responded"));
        assert_eq!(entry.status, RsvpStatus::NotResponded);
        assert_eq!(entry.id, 42);
    }

    #[test]
    fn test_rsvp_requires_user() {
        let raw: RawCalendarRsvp =
            serde_json::from_value(json!({"calendarEventId": 42})).unwrap();
        assert!(CalendarRsvp::raw_key(&raw, &Scope::default()).is_none());
        assert!(CalendarRsvp::construct(raw, &Scope::default()).is_err());
    }

    #[test]
    fn test_event_cancellation_and_defaults() {
        let raw: RawCalendarEvent = serde_json::from_value(json!({
            "id": 9,
            "serverId": "g1",
            "channelId": "c1",
            "name": "Pizza night",
            "startsAt": "2024-06-01T18:00:00Z",
            "createdBy": "u1"
        }))
        .unwrap();
        let mut event = CalendarEvent::construct(raw, &Scope::default()).unwrap();
        assert!(event.role_ids.is_empty());
        assert_eq!(event.cancellation, None);

        event.merge(
            serde_json::from_value(json!({
                "cancellation": {"description": "oven broke", "createdBy": "u1"}
            }))
            .unwrap(),
        );
        assert_eq!(
            event.cancellation.as_ref().and_then(|c| c.description.as_deref()),
            Some("oven broke")
        );
        assert_eq!(event.name, "Pizza night");
    }
}
