//! Channel announcements and their comments.

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
pub struct RawAnnouncement {
    pub id: Field<String>,
    pub server_id: Field<String>,
    pub group_id: Field<String>,
    pub channel_id: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub content: Field<String>,
    pub mentions: Field<Value>,
    pub title: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub guild_id: String,
    pub group_id: Option<String>,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
    pub member_id: String,
    pub content: String,
    pub mentions: Option<Value>,
    pub title: String,
}

#[derive(Debug)]
pub struct AnnouncementChildren {
    pub comments: Collection<AnnouncementComment>,
}

impl Entity for Announcement {
    type Key = String;
    type Raw = RawAnnouncement;
    type Children = AnnouncementChildren;

    const KIND: EntityKind = EntityKind::Announcement;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawAnnouncement, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawAnnouncement, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let channel_id = require(
            raw.channel_id.cloned().or_else(|| scope.channel_id.clone()),
            Self::KIND,
            "channelId",
        )?;
        let mut announcement = Announcement {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            group_id: None,
            channel_id,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            member_id: String::new(),
            content: String::new(),
            mentions: None,
            title: String::new(),
        };
        announcement.merge(raw);
        Ok(announcement)
    }

    fn merge(&mut self, raw: RawAnnouncement) {
        merge_fields!(raw => self {
            set id <- id,
            set guild_id <- server_id,
            opt group_id <- group_id,
            set channel_id <- channel_id,
            set created_at <- created_at,
            set member_id <- created_by,
            set content <- content,
            opt mentions <- mentions,
            set title <- title,
        });
    }

    fn children(capacities: &Arc<Capacities>) -> AnnouncementChildren {
        AnnouncementChildren {
            comments: Collection::new(capacities),
        }
    }
}

impl Cached<Announcement> {
    pub fn comments(&self) -> &Collection<AnnouncementComment> {
        &self.children().comments
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAnnouncementComment {
    pub id: Field<u64>,
    pub content: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub updated_at: Field<DateTime<Utc>>,
    pub channel_id: Field<String>,
    pub announcement_id: Field<String>,
    pub created_by: Field<String>,
    pub mentions: Field<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementComment {
    pub id: u64,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub announcement_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub member_id: String,
    pub mentions: Option<Value>,
}

impl Entity for AnnouncementComment {
    type Key = u64;
    type Raw = RawAnnouncementComment;
    type Children = ();

    const KIND: EntityKind = EntityKind::AnnouncementComment;

    fn key(&self) -> u64 {
        self.id
    }

    fn raw_key(raw: &RawAnnouncementComment, _scope: &Scope) -> Option<u64> {
        raw.id.cloned()
    }

    fn construct(raw: RawAnnouncementComment, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let announcement_id =
            require(raw.announcement_id.cloned(), Self::KIND, "announcementId")?;
        let mut comment = AnnouncementComment {
            id,
            guild_id: scope.guild_id.clone(),
            channel_id: scope.channel_id.clone().unwrap_or_default(),
            announcement_id,
            content: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            edited_timestamp: None,
            member_id: String::new(),
            mentions: None,
        };
        comment.merge(raw);
        Ok(comment)
    }

    fn merge(&mut self, raw: RawAnnouncementComment) {
        merge_fields!(raw => self {
            set id <- id,
            set channel_id <- channel_id,
            set announcement_id <- announcement_id,
            set content <- content,
            set created_at <- created_at,
            opt edited_timestamp <- updated_at,
            set member_id <- created_by,
            opt mentions <- mentions,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}
