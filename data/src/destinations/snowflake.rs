//! Snowflake over its REST session protocol: log in, run a query with the
//! session token, then delete the session.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::adapters::{AdapterResult, WarehouseHandle};
use super::error::DestinationError;
use super::types::SnowflakeConfig;

const CLIENT_APP_ID: &str = "Syncline";

#[derive(Debug, Deserialize)]
struct SnowflakeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl SnowflakeResponse {
    fn into_data(self) -> AdapterResult<Value> {
        if self.success {
            return Ok(self.data);
        }
        let message = self.message.unwrap_or_else(|| "request was not successful".to_string());
        Err(DestinationError::connection("snowflake", message))
    }
}

/// `https://<account>.snowflakecomputing.com[:port]`
pub fn account_url(config: &SnowflakeConfig) -> String {
    let host = format!("{}.snowflakecomputing.com", config.account.trim());
    match config.port {
        Some(port) => format!("https://{}:{}", host, port),
        None => format!("https://{}", host),
    }
}

pub struct SnowflakeSession {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl SnowflakeSession {
    pub async fn login(
        http: Client,
        base_url: &str,
        config: &SnowflakeConfig,
    ) -> AdapterResult<Self> {
        let mut query = vec![
            ("databaseName", config.db.as_str()),
            ("warehouse", config.warehouse.as_str()),
        ];
        if let Some(schema) = config.schema.as_deref().filter(|s| !s.is_empty()) {
            query.push(("schemaName", schema));
        }
        if let Some(role) = config.parameters.get("role") {
            query.push(("roleName", role.as_str()));
        }

        let body = json!({
            "data": {
                "ACCOUNT_NAME": config.account,
                "LOGIN_NAME": config.username,
                "PASSWORD": config.password,
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
            }
        });

        let data = post(
            http.post(format!("{}/session/v1/login-request", base_url))
                .query(&query)
                .json(&body),
        )
        .await?;

        let token = data["token"].as_str().map(str::to_string).ok_or_else(|| {
            DestinationError::connection("snowflake", "login response has no token")
        })?;
        debug!(account = %config.account, "Snowflake session opened");

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token: Some(token),
        })
    }

    fn authorization(&self) -> AdapterResult<String> {
        self.token
            .as_deref()
            .map(|token| format!("Snowflake Token=\"{}\"", token))
            .ok_or_else(|| DestinationError::connection("snowflake", "session already closed"))
    }
}

async fn post(request: reqwest::RequestBuilder) -> AdapterResult<Value> {
    let response = request
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| DestinationError::connection("snowflake", e))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(DestinationError::UnexpectedStatus {
            backend: "snowflake",
            status: status.as_u16(),
            message: message.trim().to_string(),
        });
    }

    let body: SnowflakeResponse = response
        .json()
        .await
        .map_err(|e| DestinationError::connection("snowflake", e))?;
    body.into_data()
}

#[async_trait]
impl WarehouseHandle for SnowflakeSession {
    async fn test(&self) -> AdapterResult<()> {
        let request_id = Uuid::new_v4().to_string();
        let request = self
            .http
            .post(format!("{}/queries/v1/query-request", self.base_url))
            .query(&[("requestId", request_id.as_str())])
            .header(AUTHORIZATION, self.authorization()?)
            .json(&json!({
                "sqlText": "SELECT 1",
                "asyncExec": false,
                "sequenceId": 1,
                "querySubmissionTime": Utc::now().timestamp_millis(),
            }));

        post(request).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let Ok(authorization) = self.authorization() else {
            return;
        };
        self.token = None;

        let request = self
            .http
            .post(format!("{}/session", self.base_url))
            .query(&[("delete", "true")])
            .header(AUTHORIZATION, authorization);
        if let Err(e) = post(request).await {
            warn!("Failed to close snowflake session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> SnowflakeConfig {
        SnowflakeConfig {
            account: "xy12345".to_string(),
            db: "analytics".to_string(),
            username: "loader".to_string(),
            password: "secret".to_string(),
            warehouse: "compute_wh".to_string(),
            ..Default::default()
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session/v1/login-request"))
            .and(query_param("databaseName", "analytics"))
            .and(query_param("warehouse", "compute_wh"))
            .and(body_partial_json(json!({"data": {"LOGIN_NAME": "loader", "PASSWORD": "secret"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"token": "session-token", "masterToken": "master"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_account_url() {
        assert_eq!(account_url(&config()), "https://xy12345.snowflakecomputing.com");
        let with_port = SnowflakeConfig {
            port: Some(8443),
            ..config()
        };
        assert_eq!(account_url(&with_port), "https://xy12345.snowflakecomputing.com:8443");
    }

    #[tokio::test]
    async fn test_session_runs_select_and_deletes_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .and(header("authorization", "Snowflake Token=\"session-token\""))
            .and(body_partial_json(json!({"sqlText": "SELECT 1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(query_param("delete", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = SnowflakeSession::login(Client::new(), &server.uri(), &config())
            .await
            .unwrap();
        session.test().await.unwrap();
        session.close().await;
        session.close().await;
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/v1/login-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "390100",
                "message": "Incorrect username or password was specified."
            })))
            .mount(&server)
            .await;

        let err = SnowflakeSession::login(Client::new(), &server.uri(), &config())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "snowflake connection failed: Incorrect username or password was specified."
        );
    }
}
