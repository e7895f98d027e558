//! Users, guild members and bans.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Capacities;
use crate::entity::{Entity, EntityKind, Scope, require};
use crate::field::{Field, merge_fields};
use crate::CacheError;

/// Account type. The platform calls bot accounts `bot`; they are exposed as
/// `app`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserKind {
    #[default]
    #[serde(rename = "user")]
    User,
    #[serde(rename = "app", alias = "bot")]
    App,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUser {
    pub id: Field<String>,
    #[serde(rename = "type")]
    pub kind: Field<UserKind>,
    pub name: Field<String>,
    pub avatar: Field<String>,
    pub banner: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
    pub status: Field<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub kind: UserKind,
    pub username: String,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: Option<Value>,
}

impl User {
    pub fn is_app(&self) -> bool {
        self.kind == UserKind::App
    }
}

impl Entity for User {
    type Key = String;
    type Raw = RawUser;
    type Children = ();

    const KIND: EntityKind = EntityKind::User;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn raw_key(raw: &RawUser, _scope: &Scope) -> Option<String> {
        raw.id.cloned()
    }

    fn construct(raw: RawUser, _scope: &Scope) -> Result<Self, CacheError> {
        let id = require(raw.id.cloned(), Self::KIND, "id")?;
        let mut user = User {
            id,
            kind: UserKind::User,
            username: String::new(),
            avatar_url: None,
            banner_url: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            status: None,
        };
        user.merge(raw);
        Ok(user)
    }

    fn merge(&mut self, raw: RawUser) {
        merge_fields!(raw => self {
            set id <- id,
            set kind <- kind,
            set username <- name,
            opt avatar_url <- avatar,
            opt banner_url <- banner,
            set created_at <- created_at,
            opt status <- status,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

fn nested_user_id(user: &Field<RawUser>) -> Option<String> {
    user.value().and_then(|u| u.id.cloned())
}

/// Pull the nested user out of a payload so the rest can be merged normally.
fn take_user(
    user: &mut Field<RawUser>,
    kind: EntityKind,
    scope: &Scope,
) -> Result<User, CacheError> {
    match std::mem::take(user) {
        Field::Value(raw) => User::construct(raw, scope),
        _ => Err(CacheError::malformed(kind.as_str(), "missing user")),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMember {
    pub server_id: Field<String>,
    pub user: Field<RawUser>,
    pub role_ids: Field<Vec<u64>>,
    pub nickname: Field<String>,
    pub joined_at: Field<DateTime<Utc>>,
    pub is_owner: Field<bool>,
}

/// A user's membership in one guild.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub guild_id: String,
    pub user: User,
    pub role_ids: Vec<u64>,
    pub nickname: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub is_owner: bool,
}

impl Member {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Nickname if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.username)
    }
}

impl Entity for Member {
    type Key = String;
    type Raw = RawMember;
    type Children = ();

    const KIND: EntityKind = EntityKind::Member;

    fn key(&self) -> String {
        self.user.id.clone()
    }

    fn raw_key(raw: &RawMember, _scope: &Scope) -> Option<String> {
        nested_user_id(&raw.user)
    }

    fn construct(mut raw: RawMember, scope: &Scope) -> Result<Self, CacheError> {
        let user = take_user(&mut raw.user, Self::KIND, scope)?;
        let mut member = Member {
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            user,
            role_ids: Vec::new(),
            nickname: None,
            joined_at: DateTime::<Utc>::UNIX_EPOCH,
            is_owner: false,
        };
        member.merge(raw);
        Ok(member)
    }

    fn merge(&mut self, raw: RawMember) {
        if let Field::Value(user) = raw.user {
            self.user.merge(user);
        }
        merge_fields!(raw => self {
            set guild_id <- server_id,
            set role_ids <- role_ids,
            opt nickname <- nickname,
            set joined_at <- joined_at,
            set is_owner <- is_owner,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawBannedMember {
    pub server_id: Field<String>,
    pub user: Field<RawUser>,
    pub reason: Field<String>,
    pub created_by: Field<String>,
    pub created_at: Field<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedMember {
    pub guild_id: String,
    pub user: User,
    pub reason: Option<String>,
    pub banned_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for BannedMember {
    type Key = String;
    type Raw = RawBannedMember;
    type Children = ();

    const KIND: EntityKind = EntityKind::BannedMember;

    fn key(&self) -> String {
        self.user.id.clone()
    }

    fn raw_key(raw: &RawBannedMember, _scope: &Scope) -> Option<String> {
        nested_user_id(&raw.user)
    }

    fn construct(mut raw: RawBannedMember, scope: &Scope) -> Result<Self, CacheError> {
        let user = take_user(&mut raw.user, Self::KIND, scope)?;
        let mut ban = BannedMember {
            guild_id: scope.guild_id.clone().unwrap_or_default(),
            user,
            reason: None,
            banned_by: String::new(),
            created_at: None,
        };
        ban.merge(raw);
        Ok(ban)
    }

    fn merge(&mut self, raw: RawBannedMember) {
        if let Field::Value(user) = raw.user {
            self.user.merge(user);
        }
        merge_fields!(raw => self {
            set guild_id <- server_id,
            opt reason <- reason,
            set banned_by <- created_by,
            opt created_at <- created_at,
        });
    }

    fn children(_capacities: &Arc<Capacities>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_user_is_app() {
        let raw: RawUser =
            serde_json::from_value(json!({"id": "u1", "type": "bot", "name": "Oven"})).unwrap();
        let user = User::construct(raw, &Scope::default()).unwrap();
        assert!(user.is_app());
        assert_eq!(serde_json::to_value(user.kind).unwrap(), json!("app"));
    }

    #[test]
    fn test_member_keyed_by_user_id() {
        let raw: RawMember = serde_json::from_value(json!({
            "user": {"id": "u1", "name": "pepper"},
            "roleIds": [1, 2],
            "joinedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(Member::raw_key(&raw, &Scope::default()).as_deref(), Some("u1"));

        let mut member = Member::construct(raw, &Scope::guild("g1")).unwrap();
        assert_eq!(member.guild_id, "g1");
        assert_eq!(member.display_name(), "pepper");

        member.merge(serde_json::from_value(json!({"nickname": "Pep"})).unwrap());
        assert_eq!(member.display_name(), "Pep");
        assert_eq!(member.role_ids, vec![1, 2]);

        member.merge(serde_json::from_value(json!({"nickname": null})).unwrap());
        assert_eq!(member.display_name(), "pepper");
    }

    #[test]
    fn test_member_without_user_is_malformed() {
        let raw: RawMember = serde_json::from_value(json!({"nickname": "x"})).unwrap();
        assert!(Member::raw_key(&raw, &Scope::default()).is_none());
        let err = Member::construct(raw, &Scope::default()).unwrap_err();
        assert!(matches!(err, CacheError::MalformedEvent { .. }));
    }

    #[test]
    fn test_ban_fields() {
        let raw: RawBannedMember = serde_json::from_value(json!({
            "user": {"id": "u2", "name": "anchovy"},
            "reason": "spam",
            "createdBy": "u1",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let ban = BannedMember::construct(raw, &Scope::guild("g1")).unwrap();
        assert_eq!(ban.key(), "u2");
        assert_eq!(ban.reason.as_deref(), Some("spam"));
        assert_eq!(ban.banned_by, "u1");
    }
}
