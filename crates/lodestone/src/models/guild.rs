//! Guilds (servers) and the stores they own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::config::Capacities;
use crate::entity::{Cached, Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::models::{BannedMember, Channel, Group, Member};
use crate::CacheError;

/// Guild payload as sent by the gateway and REST API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGuild {
    pub id: Field<String>,
    pub owner_id: Field<String>,
    #[serde(rename = "type")]
    pub kind: Field<String>,
    pub name: Field<String>,
    pub url: Field<String>,
    pub about: Field<String>,
    pub avatar: Field<String>,
    pub banner: Field<String>,
    pub timezone: Field<String>,
    pub is_verified: Field<bool>,
    pub default_channel_id: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
}

/// A guild the bot is a member of.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub owner_id: String,
    /// Guild category (team, community, ...), if set.
    pub kind: Option<String>,
    pub name: String,
    pub vanity_url: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub timezone: Option<String>,
    pub verified: bool,
    pub default_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stores owned by a cached guild.
#[derive(Debug)]
pub struct GuildChildren {
    pub channels: Collection<Channel>,
    pub members: Collection<Member>,
    pub bans: Collection<BannedMember>,
    pub groups: Collection<Group>,
}

impl Entity for Guild {
    type Key = String;
    type Raw = RawGuild;
    type Children = GuildChildren;

    const KIND: EntityKind = EntityKind::Guild;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawGuild, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawGuild, _scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let mut guild = Guild {
            id,
            owner_id: String::new(),
            kind: None,
            name: String::new(),
            vanity_url: None,
            description: None,
            icon_url: None,
            banner_url: None,
            timezone: None,
            verified: false,
            default_channel_id: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        guild.merge(raw);
        Ok(guild)
    }

    fn merge(&mut self, raw: RawGuild) {
        merge_fields!(raw => self {
            set id <- id,
            set owner_id <- owner_id,
            opt kind <- kind,
            set name <- name,
            opt vanity_url <- url,
            opt description <- about,
            opt icon_url <- avatar,
            opt banner_url <- banner,
            opt timezone <- timezone,
            set verified <- is_verified,
            opt default_channel_id <- default_channel_id,
            set created_at <- created_at,
        });
    }

    fn children(capacities: &Arc<Capacities>) -> GuildChildren {
        GuildChildren {
            channels: Collection::new(capacities),
            members: Collection::new(capacities),
            bans: Collection::new(capacities),
            groups: Collection::new(capacities),
        }
    }
}

impl Cached<Guild> {
    pub fn channels(&self) -> &Collection<Channel> {
        &self.children().channels
    }

    pub fn members(&self) -> &Collection<Member> {
        &self.children().members
    }

    pub fn bans(&self) -> &Collection<BannedMember> {
        &self.children().bans
    }

    pub fn groups(&self) -> &Collection<Group> {
        &self.children().groups
    }
}
