use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{
    ApiError, ApiGateway, Comment, ErrorBody, ExploreUser, ItemEnvelope, ListEnvelope,
    LoginResponse, PageOf, Profile, RegisterRequest, Tweet, UserIdentity,
};
use crate::session::SessionStore;

/// The reqwest-backed gateway. Attaches the bearer token when one is held,
/// maps every failed response through `classify`, and forces a logout on
/// 401 before re-raising the error. No retries, no queueing.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionStore>) -> HttpGateway {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("growtwitter-tui/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        HttpGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.json::<ErrorBody>().await.ok().map(|b| b.message);
        let error = classify(status, message);
        if error == ApiError::AuthenticationExpired {
            debug!("response came back 401, clearing the stored session");
            self.session.logout();
        }
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })
    }

    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send(builder).await.map(|_| ())
    }
}

/// Map a non-success HTTP status to the client error taxonomy.
fn classify(status: StatusCode, message: Option<String>) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthenticationExpired,
        StatusCode::CONFLICT => ApiError::Conflict {
            message: message.unwrap_or_else(|| "already in that state".to_string()),
        },
        StatusCode::NOT_FOUND => ApiError::NotFound {
            message: message.unwrap_or_else(|| "not found".to_string()),
        },
        s if s.is_client_error() => ApiError::Validation {
            message: message.unwrap_or_else(|| format!("request rejected ({})", s.as_u16())),
        },
        s => ApiError::Server {
            status: s.as_u16(),
        },
    }
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = json!({ "username": username, "password": password });
        self.send_json(self.request(Method::POST, "/auth/login").json(&body))
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::POST, "/auth/register").json(request))
            .await
    }

    async fn feed(&self) -> Result<Vec<Tweet>, ApiError> {
        let envelope: ListEnvelope<Tweet> =
            self.send_json(self.request(Method::GET, "/tweets")).await?;
        Ok(envelope.data)
    }

    async fn global_tweets(&self, page: u32) -> Result<PageOf<Tweet>, ApiError> {
        let path = format!("/tweets?type=global&page={}", page);
        let envelope: ListEnvelope<Tweet> =
            self.send_json(self.request(Method::GET, &path)).await?;
        Ok(PageOf::from_envelope(envelope))
    }

    async fn create_tweet(&self, content: &str) -> Result<Tweet, ApiError> {
        let body = json!({ "content": content });
        let envelope: ItemEnvelope<Tweet> = self
            .send_json(self.request(Method::POST, "/tweets").json(&body))
            .await?;
        Ok(envelope.data)
    }

    async fn delete_tweet(&self, tweet_id: &str) -> Result<(), ApiError> {
        let path = format!("/tweets/{}", tweet_id);
        self.send_unit(self.request(Method::DELETE, &path)).await
    }

    async fn like(&self, tweet_id: &str) -> Result<(), ApiError> {
        let path = format!("/tweets/{}/like", tweet_id);
        self.send_unit(self.request(Method::POST, &path)).await
    }

    async fn unlike(&self, tweet_id: &str) -> Result<(), ApiError> {
        let path = format!("/tweets/{}/like", tweet_id);
        self.send_unit(self.request(Method::DELETE, &path)).await
    }

    async fn comments(&self, tweet_id: &str) -> Result<Vec<Comment>, ApiError> {
        let path = format!("/tweets/{}/comments", tweet_id);
        let envelope: ListEnvelope<Comment> =
            self.send_json(self.request(Method::GET, &path)).await?;
        Ok(envelope.data)
    }

    async fn create_comment(&self, tweet_id: &str, content: &str) -> Result<Comment, ApiError> {
        let path = format!("/tweets/{}/comments", tweet_id);
        let body = json!({ "content": content });
        let envelope: ItemEnvelope<Comment> = self
            .send_json(self.request(Method::POST, &path).json(&body))
            .await?;
        Ok(envelope.data)
    }

    async fn users(&self, page: u32) -> Result<PageOf<ExploreUser>, ApiError> {
        let path = format!("/users?page={}", page);
        let envelope: ListEnvelope<ExploreUser> =
            self.send_json(self.request(Method::GET, &path)).await?;
        Ok(PageOf::from_envelope(envelope))
    }

    async fn profile(&self, username: &str) -> Result<Profile, ApiError> {
        let path = format!("/users/{}", urlencoding::encode(username));
        let envelope: ItemEnvelope<Profile> =
            self.send_json(self.request(Method::GET, &path)).await?;
        Ok(envelope.data)
    }

    async fn update_profile(
        &self,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<UserIdentity, ApiError> {
        let body = json!({ "name": name, "imageUrl": image_url });
        let envelope: ItemEnvelope<UserIdentity> = self
            .send_json(self.request(Method::PUT, "/users").json(&body))
            .await?;
        Ok(envelope.data)
    }

    async fn follow(&self, user_id: &str) -> Result<(), ApiError> {
        let path = format!("/users/{}/follow", user_id);
        self.send_unit(self.request(Method::POST, &path)).await
    }

    async fn unfollow(&self, user_id: &str) -> Result<(), ApiError> {
        let path = format!("/users/{}/follow", user_id);
        self.send_unit(self.request(Method::DELETE, &path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unauthorized() {
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, Some("expired".to_string())),
            ApiError::AuthenticationExpired
        );
    }

    #[test]
    fn test_classify_conflict_keeps_message() {
        assert_eq!(
            classify(StatusCode::CONFLICT, Some("already liked".to_string())),
            ApiError::Conflict {
                message: "already liked".to_string()
            }
        );
    }

    #[test]
    fn test_classify_not_found_fallback_message() {
        assert_eq!(
            classify(StatusCode::NOT_FOUND, None),
            ApiError::NotFound {
                message: "not found".to_string()
            }
        );
    }

    #[test]
    fn test_classify_validation_surfaces_server_message() {
        assert_eq!(
            classify(
                StatusCode::UNPROCESSABLE_ENTITY,
                Some("content too long".to_string())
            ),
            ApiError::Validation {
                message: "content too long".to_string()
            }
        );
    }

    #[test]
    fn test_classify_validation_fallback_includes_status() {
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, None),
            ApiError::Validation {
                message: "request rejected (400)".to_string()
            }
        );
    }

    #[test]
    fn test_classify_server_error() {
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, Some("boom".to_string())),
            ApiError::Server { status: 500 }
        );
        assert!(ApiError::Server { status: 500 }.is_retryable());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(SessionStore::open(dir.path().join("session.json")));
        let gateway = HttpGateway::new("http://localhost:3000/", Duration::from_secs(5), session);
        assert_eq!(gateway.base_url, "http://localhost:3000");
    }
}
