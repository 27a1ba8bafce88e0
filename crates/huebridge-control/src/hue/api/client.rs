use super::error::HueError;
use crate::hue::models::HueConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for the bridge's v1 REST API.
///
/// The bridge serves HTTPS with a self-signed certificate, so certificate
/// validation is disabled for these requests.
#[derive(Clone)]
pub struct HueClient {
    http: reqwest::Client,
    bridge_ip: String,
    username: String,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    devicetype: &'a str,
    generateclientkey: bool,
}

#[derive(Deserialize)]
struct RegisterSuccess {
    username: String,
    clientkey: String,
}

#[derive(Deserialize)]
pub(crate) struct HueErrorResponse {
    #[serde(rename = "type")]
    pub(crate) error_type: i32,
    pub(crate) description: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegisterResponseItem {
    Success { success: RegisterSuccess },
    Error { error: HueErrorResponse },
}

#[derive(Deserialize)]
pub(crate) struct ErrorItem {
    pub(crate) error: HueErrorResponse,
}

/// Basic information about an authenticated bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeInfo {
    pub name: String,
    #[serde(rename = "apiversion")]
    pub api_version: String,
}

// Helper to build a client for communicating with the Hue Bridge
fn build_client() -> Result<reqwest::Client, HueError> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(HueError::Network)
}

/// Fail with the first error of a v1 error array, if the body is one.
pub(crate) fn check_api_errors(body: &Value) -> Result<(), HueError> {
    if let Some(items) = body.as_array() {
        for item in items {
            if item.get("error").is_some() {
                let item: ErrorItem = serde_json::from_value(item.clone())?;
                return Err(HueError::from_api(
                    item.error.error_type,
                    &item.error.description,
                ));
            }
        }
    }
    Ok(())
}

impl HueClient {
    /// Creates a client for an already paired bridge.
    pub fn new(config: &HueConfig) -> Result<Self, HueError> {
        Ok(Self {
            http: build_client()?,
            bridge_ip: config.bridge_ip.clone(),
            username: config.username.clone(),
        })
    }

    pub fn bridge_ip(&self) -> &str {
        &self.bridge_ip
    }

    /// URL of a resource below `/api/<username>`.
    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "https://{}/api/{}/{}",
            self.bridge_ip,
            self.username,
            path.trim_start_matches('/')
        )
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HueError> {
        let resp = self.http.get(self.url(path)).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        check_api_errors(&body)?;
        if !status.is_success() {
            return Err(HueError::ApiError(format!("GET {}: HTTP {}", path, status)));
        }
        Ok(serde_json::from_value(body)?)
    }

    pub(crate) async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, HueError> {
        let resp = self.http.put(self.url(path)).json(body).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        check_api_errors(&body)?;
        if !status.is_success() {
            return Err(HueError::ApiError(format!("PUT {}: HTTP {}", path, status)));
        }
        Ok(body)
    }

    /// Registers a new application with the Hue Bridge.
    /// Returns a HueConfig with username and client_key.
    pub async fn register_user(ip: &str, devicetype: &str) -> Result<HueConfig, HueError> {
        let client = build_client()?;

        let body = RegisterBody {
            devicetype,
            generateclientkey: true,
        };

        let url = format!("https://{}/api", ip);
        let resp = client.post(&url).json(&body).send().await?;

        let items: Vec<RegisterResponseItem> = resp.json().await?;

        match items.into_iter().next() {
            Some(RegisterResponseItem::Success { success }) => Ok(HueConfig {
                bridge_ip: ip.to_string(),
                username: success.username,
                client_key: success.clientkey,
            }),
            Some(RegisterResponseItem::Error { error }) => {
                Err(HueError::from_api(error.error_type, &error.description))
            }
            None => Err(HueError::ApiError(
                "Empty response from Hue Bridge".to_string(),
            )),
        }
    }

    /// Verifies that the username is whitelisted on the bridge.
    ///
    /// An unknown user still gets the public part of `/config`, so the
    /// presence of the whitelist is what proves authentication.
    pub async fn authenticate(&self) -> Result<BridgeInfo, HueError> {
        let config: Value = self.get("config").await?;
        if config.get("whitelist").is_none() {
            return Err(HueError::Unauthorized);
        }
        let info: BridgeInfo = serde_json::from_value(config)?;
        debug!(
            "Authenticated with bridge '{}' (API {})",
            info.name, info.api_version
        );
        Ok(info)
    }
}
