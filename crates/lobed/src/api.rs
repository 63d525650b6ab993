//! HTTP collaborators: auth, streak/stats, completion and report generation.
//!
//! Each concern is a trait so the daemon can be driven by fakes in tests.

use crate::config::Config;
use crate::error::ApiError;
use async_trait::async_trait;
use lobe_games::Region;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
}

impl UserStats {
    /// Completed regions, ignoring task names the daemon doesn't know.
    pub fn completed_regions(&self) -> Vec<Region> {
        self.completed_tasks
            .iter()
            .filter_map(|t| Region::from_name(t))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginGrant {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub birthdate: String,
    pub name: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError>;
    /// Create an account; the service emails a verification code.
    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;
    async fn verify(&self, email: &str, code: &str) -> Result<(), ApiError>;
}

#[async_trait]
pub trait StatsService: Send + Sync {
    async fn user_stats(&self, user_id: &str) -> Result<UserStats, ApiError>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn record_completion(&self, user_id: &str, region: Region) -> Result<(), ApiError>;
}

#[async_trait]
pub trait ReportService: Send + Sync {
    async fn generate_report(&self, accuracy: u32) -> Result<String, ApiError>;
}

/// The set of collaborators the daemon talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthService>,
    pub stats: Arc<dyn StatsService>,
    pub completion: Arc<dyn CompletionService>,
    pub report: Arc<dyn ReportService>,
}

impl Collaborators {
    pub fn http(cfg: &Config) -> Result<Self, ApiError> {
        let api = Arc::new(HttpApi::new(cfg)?);
        Ok(Self {
            auth: api.clone(),
            stats: api.clone(),
            completion: api.clone(),
            report: api,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    api_url: String,
    auth_url: String,
    report_url: String,
}

#[derive(Deserialize)]
struct ReportBody {
    #[serde(default)]
    report: String,
}

impl HttpApi {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            auth_url: cfg.auth_url.trim_end_matches('/').to_string(),
            report_url: cfg.report_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a JSON body and decode a JSON reply.
    ///
    /// Non-2xx replies become [`ApiError::Rejected`] carrying the service's
    /// `error` field, or `rejected` when it has none.
    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
        rejected: &str,
    ) -> Result<T, ApiError> {
        let resp = self.client.post(url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let value: serde_json::Value = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{url}: {e}")))?
        };

        if !status.is_success() {
            let message = value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or(rejected);
            return Err(ApiError::Rejected(message.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl AuthService for HttpApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let url = format!("{}/login", self.auth_url);
        self.post_json(
            &url,
            json!({ "email": email, "password": password }),
            "Authentication failed",
        )
        .await
    }

    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let url = format!("{}/register", self.auth_url);
        let body = serde_json::to_value(registration)
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.post_json::<serde_json::Value>(&url, body, "Authentication failed")
            .await
            .map(|_| ())
    }

    async fn verify(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let url = format!("{}/verify", self.auth_url);
        self.post_json::<serde_json::Value>(
            &url,
            json!({ "email": email, "code": code }),
            "Verification failed",
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl StatsService for HttpApi {
    async fn user_stats(&self, user_id: &str) -> Result<UserStats, ApiError> {
        let url = format!("{}/get-user-stats", self.api_url);
        self.post_json(&url, json!({ "user-id": user_id }), "Stats unavailable")
            .await
    }
}

#[async_trait]
impl CompletionService for HttpApi {
    async fn record_completion(&self, user_id: &str, region: Region) -> Result<(), ApiError> {
        let url = format!("{}/increase-streak", self.api_url);
        self.post_json::<serde_json::Value>(
            &url,
            json!({ "user-id": user_id, "task": region.name() }),
            "Streak update failed",
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl ReportService for HttpApi {
    async fn generate_report(&self, accuracy: u32) -> Result<String, ApiError> {
        let url = format!("{}/api/cerebellum", self.report_url);
        let body: ReportBody = self
            .post_json(&url, json!({ "accuracy": accuracy }), "Report generation failed")
            .await?;
        Ok(body.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn api_at(url: &str) -> HttpApi {
        let cfg = Config {
            api_url: url.to_string(),
            auth_url: url.to_string(),
            report_url: url.to_string(),
            ..Config::default()
        };
        HttpApi::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn stats_request_and_decode() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/get-user-stats")
            .match_body(Matcher::PartialJson(json!({ "user-id": "u-9" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"streak":4,"email":"a@b.c","completed_tasks":["temporal","bogus"]}"#)
            .create_async()
            .await;

        let stats = api_at(&server.url()).user_stats("u-9").await.unwrap();
        assert_eq!(stats.streak, 4);
        assert_eq!(stats.completed_regions(), vec![Region::Temporal]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn completion_sends_region_task() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/increase-streak")
            .match_body(Matcher::PartialJson(
                json!({ "user-id": "u-1", "task": "occipital" }),
            ))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        api_at(&server.url())
            .record_completion("u-1", Region::Occipital)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_login_carries_service_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJson(
                json!({ "email": "a@b.c", "password": "nope" }),
            ))
            .with_status(401)
            .with_body(r#"{"error":"Bad credentials"}"#)
            .create_async()
            .await;

        let err = api_at(&server.url()).login("a@b.c", "nope").await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Bad credentials"), "{err}");
    }

    #[tokio::test]
    async fn rejected_verify_without_message_uses_default() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/verify")
            .match_body(Matcher::PartialJson(json!({ "email": "a@b.c", "code": "000" })))
            .with_status(400)
            .with_body("{}")
            .create_async()
            .await;

        let err = api_at(&server.url()).verify("a@b.c", "000").await.unwrap_err();
        assert_eq!(err.to_string(), "Verification failed");
    }

    #[tokio::test]
    async fn report_text_is_returned() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cerebellum")
            .match_body(Matcher::PartialJson(json!({ "accuracy": 100 })))
            .with_status(200)
            .with_body(r#"{"report":"Steady hands, detective."}"#)
            .create_async()
            .await;

        let text = api_at(&server.url()).generate_report(100).await.unwrap();
        assert_eq!(text, "Steady hands, detective.");
        mock.assert_async().await;
    }
}
