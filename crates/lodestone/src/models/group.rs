use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Capacities;
use crate::entity::{Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGroup {
    pub id: Field<String>,
    pub server_id: Field<String>,
    pub name: Field<String>,
    pub description: Field<String>,
    pub avatar: Field<String>,
    pub is_home: Field<bool>,
    pub emote_id: Field<u64>,
    pub is_public: Field<bool>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub updated_at: Field<DateTime<Utc>>,
    pub updated_by: Field<String>,
    pub archived_at: Field<DateTime<Utc>>,
    pub archived_by: Field<String>,
}

/// A group of channels inside a guild.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub is_home: bool,
    pub emote_id: Option<u64>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<String>,
}

impl Entity for Group {
    type Key = String;
    type Raw = RawGroup;
    type Children = ();

    const KIND: EntityKind = EntityKind::Group;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawGroup, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawGroup, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let mut group = Group {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            name: String::new(),
            description: None,
            avatar_url: None,
            is_home: false,
            emote_id: None,
            is_public: false,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            created_by: String::new(),
            edited_timestamp: None,
            updated_by: None,
            archived_at: None,
            archived_by: None,
        };
        group.merge(raw);
        Ok(group)
    }

    fn merge(&mut self, raw: RawGroup) {
        merge_fields!(raw => self {
            set id <- id,
            set guild_id <- server_id,
            set name <- name,
            opt description <- description,
            opt avatar_url <- avatar,
            set is_home <- is_home,
            opt emote_id <- emote_id,
            set is_public <- is_public,
            set created_at <- created_at,
            set created_by <- created_by,
            opt edited_timestamp <- updated_at,
            opt updated_by <- updated_by,
            opt archived_at <- archived_at,
            opt archived_by <- archived_by,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}
