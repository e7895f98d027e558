//! HTTP implementation of [`Fetcher`] against the platform's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::FetchError;
use crate::entity::EntityKind;
use crate::fetch::Fetcher;
use crate::models::{RawChannel, RawForumThread, RawGuild, RawMember, RawMessage, RawUser};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://www.guilded.gg/api/v1";

/// Fetches records over HTTP with a bearer token.
///
/// Requests are made once; retry and rate limiting are left to the caller.
pub struct RestFetcher {
    http: Client,
    base_url: String,
    token: String,
}

impl RestFetcher {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and unwrap the record stored under `envelope`.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        envelope: &str,
        kind: EntityKind,
        id: &str,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "rest: GET");

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, url = %url, "rest: request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut body: Value = response.json().await?;
        let record = body
            .get_mut(envelope)
            .map(Value::take)
            .ok_or_else(|| {
                FetchError::Unavailable(format!("response has no `{}` field", envelope))
            })?;
        Ok(serde_json::from_value(record)?)
    }
}

#[async_trait]
impl Fetcher for RestFetcher {
    async fn get_guild(&self, guild_id: &str) -> Result<RawGuild, FetchError> {
        self.get(&format!("/servers/{}", guild_id), "server", EntityKind::Guild, guild_id)
            .await
    }

    async fn get_channel(&self, channel_id: &str) -> Result<RawChannel, FetchError> {
        self.get(
            &format!("/channels/{}", channel_id),
            "channel",
            EntityKind::Channel,
            channel_id,
        )
        .await
    }

    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<RawMember, FetchError> {
        self.get(
            &format!("/servers/{}/members/{}", guild_id, user_id),
            "member",
            EntityKind::Member,
            user_id,
        )
        .await
    }

    async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<RawMessage, FetchError> {
        self.get(
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            "message",
            EntityKind::Message,
            message_id,
        )
        .await
    }

    async fn get_forum_thread(
        &self,
        channel_id: &str,
        thread_id: u64,
    ) -> Result<RawForumThread, FetchError> {
        self.get(
            &format!("/channels/{}/topics/{}", channel_id, thread_id),
            "forumTopic",
            EntityKind::ForumThread,
            &thread_id.to_string(),
        )
        .await
    }

    async fn get_user(&self, user_id: &str) -> Result<RawUser, FetchError> {
        self.get(&format!("/users/{}", user_id), "user", EntityKind::User, user_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_base_url_trailing_slash() {
        let fetcher = RestFetcher::new("https://example.com/api/", "t").unwrap();
        assert_eq!(fetcher.base_url(), "https://example.com/api");
    }

    #[tokio::test]
    async fn test_get_guild_unwraps_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/servers/g1"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "server": {"id": "g1", "name": "Pizza Club", "ownerId": "u1"}
            })))
            .mount(&mock_server)
            .await;

        let fetcher = RestFetcher::new(mock_server.uri(), "secret").unwrap();
        let guild = fetcher.get_guild("g1").await.unwrap();

        assert_eq!(guild.id, Field::Value("g1".to_string()));
        assert_eq!(guild.name, Field::Value("Pizza Club".to_string()));
    }

    #[tokio::test]
    async fn test_get_forum_thread_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/channels/c1/topics/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "forumTopic": {"id": 7, "channelId": "c1", "serverId": "g1", "title": "Crust"}
            })))
            .mount(&mock_server)
            .await;

        let fetcher = RestFetcher::new(mock_server.uri(), "secret").unwrap();
        let thread = fetcher.get_forum_thread("c1", 7).await.unwrap();
        assert_eq!(thread.id, Field::Value(7));
    }

    #[tokio::test]
    async fn test_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/channels/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = RestFetcher::new(mock_server.uri(), "secret").unwrap();
        let err = fetcher.get_channel("missing").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::NotFound { kind: EntityKind::Channel, ref id } if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_server_error_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/u1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oven on fire"))
            .mount(&mock_server)
            .await;

        let fetcher = RestFetcher::new(mock_server.uri(), "secret").unwrap();
        match fetcher.get_user("u1").await.unwrap_err() {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oven on fire");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/servers/g1/members/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let fetcher = RestFetcher::new(mock_server.uri(), "secret").unwrap();
        let err = fetcher.get_member("g1", "u1").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }
}
