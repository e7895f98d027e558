use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Capacities;
use crate::entity::{Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawWebhook {
    pub id: Field<String>,
    pub server_id: Field<String>,
    pub channel_id: Field<String>,
    pub name: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub created_by: Field<String>,
    pub deleted_at: Field<DateTime<Utc>>,
    pub token: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Only sent when the webhook is created or its token is requested.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Webhook {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for Webhook {
    type Key = String;
    type Raw = RawWebhook;
    type Children = ();

    const KIND: EntityKind = EntityKind::Webhook;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawWebhook, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawWebhook, scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let mut webhook = Webhook {
            id,
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            channel_id: scope.channel_id.clone().unwrap_or_default(),
            username: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            owner_id: String::new(),
            deleted_at: None,
            token: None,
        };
        webhook.merge(raw);
        Ok(webhook)
    }

    fn merge(&mut self, raw: RawWebhook) {
        merge_fields!(raw => self {
            set id <- id,
            set guild_id <- server_id,
            set channel_id <- channel_id,
            set username <- name,
            set created_at <- created_at,
            set owner_id <- created_by,
            opt deleted_at <- deleted_at,
            opt token <- token,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_kept_when_update_omits_it() {
        let raw: RawWebhook = serde_json::from_value(json!({
            "id": "w1",
            "serverId": "g1",
            "channelId": "c1",
            "name": "Oven alerts",
            "token": "secret"
        }))
        .unwrap();
        let mut webhook = Webhook::construct(raw, &Scope::default()).unwrap();

        webhook.merge(serde_json::from_value(json!({"name": "Oven"})).unwrap());
        assert_eq!(webhook.username, "Oven");
        assert_eq!(webhook.token.as_deref(), Some("secret"));
        assert!(serde_json::to_value(&webhook).unwrap().get("token").is_none());
    }
}
