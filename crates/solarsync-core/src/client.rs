//! HTTP client for the Solar Manager cloud API.
//!
//! # Example
//!
//! ```no_run
//! use solarsync_core::{ApiConfig, HttpClient, MeteringApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig {
//!     email: "user@example.com".to_string(),
//!     password: "secret".to_string(),
//!     site_ids: vec!["0123456789ABCDEF".to_string()],
//!     ..Default::default()
//! };
//! let client = HttpClient::new(&config)?;
//!
//! let token = client.login().await?;
//! for sensor in client.list_sensors(&token, "0123456789ABCDEF").await? {
//!     println!("{} {}", sensor.device_id, sensor.kind);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use async_trait::async_trait;
use solarsync_types::timestamp::api_timestamp;
use solarsync_types::{Device, DeviceKind};

use crate::api::{AccessToken, MeteringApi, RawSample};
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Longest error body we echo back in [`Error::Status`].
const MAX_ERROR_BODY: usize = 200;

/// reqwest-backed implementation of [`MeteringApi`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct SensorEntry {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    device_type: String,
    #[serde(default)]
    tag: Option<SensorTag>,
}

#[derive(Deserialize)]
struct SensorTag {
    #[serde(default)]
    name: Option<String>,
}

impl SensorEntry {
    fn into_device(self, site_id: &str) -> Device {
        Device {
            device_id: self.id,
            site_id: site_id.to_string(),
            display_name: self.tag.and_then(|t| t.name).unwrap_or_default(),
            kind: DeviceKind::from_api(&self.device_type),
        }
    }
}

impl HttpClient {
    /// Build a client from the API configuration.
    ///
    /// The configured request timeout applies to every call.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("solarsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Self::with_client(config, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(config: &ApiConfig, client: Client) -> Result<Self> {
        let base_url = config.base_url().to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            email: config.email.clone(),
            password: config.password.clone(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, url: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| Error::Request {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::Request {
            url: url.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(status_error(url, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::malformed(url, e.to_string()))
    }
}

fn status_error(url: &str, status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|e| e.as_str()).map(String::from))
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_ERROR_BODY).collect())
        })
        .unwrap_or_else(|| status.to_string());

    Error::Status {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl MeteringApi for HttpClient {
    async fn login(&self) -> Result<AccessToken> {
        let url = self.url("/v1/oauth/login");
        debug!("Logging in as {}", self.email);

        let request = self.client.post(&url).json(&LoginRequest {
            email: &self.email,
            password: &self.password,
        });

        let response: LoginResponse = match self.send_json(&url, request).await {
            Ok(response) => response,
            Err(Error::Status {
                status: 401 | 403,
                message,
                ..
            }) => return Err(Error::Auth(message)),
            Err(e) => return Err(e),
        };

        response
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| Error::Auth("login response did not contain an access token".into()))
    }

    async fn list_sensors(&self, token: &AccessToken, site_id: &str) -> Result<Vec<Device>> {
        let url = self.url(&format!("/v1/info/sensors/{}", site_id));
        debug!("Listing sensors for site {}", site_id);

        let request = self.client.get(&url).bearer_auth(token.as_str());
        let entries: Vec<SensorEntry> = self.send_json(&url, request).await?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.into_device(site_id))
            .collect())
    }

    async fn sensor_range(
        &self,
        token: &AccessToken,
        device_id: &str,
        from: i64,
        to: i64,
        interval: u32,
    ) -> Result<Vec<RawSample>> {
        let url = self.url(&format!("/v1/data/sensor/{}/range", device_id));
        let from = api_timestamp(from)?;
        let to = api_timestamp(to)?;
        debug!("Fetching {} from {} to {} every {}s", device_id, from, to, interval);

        let request = self
            .client
            .get(&url)
            .bearer_auth(token.as_str())
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("interval", interval.to_string().as_str()),
            ]);

        self.send_json(&url, request).await
    }
}
