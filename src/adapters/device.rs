use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::domain::session_log::{RawSessionRecord, decode_session_rows};

pub const SESSION_DATA_PATH: &str = "/getsessiondata";
pub const STATUS_PATH: &str = "/getstatus";
pub const CONFIG_PATH: &str = "/getconfig";
pub const CHART_DATA_PATH: &str = "/getchartdata";
pub const SET_CONFIG_PATH: &str = "/setconfig";
pub const SET_SETTINGS_PATH: &str = "/setsettings";

/// REST surface of the charger controller. Everything except the session log is an
/// opaque JSON document.
pub trait DeviceClient: Send + Sync + 'static {
    fn get_session_data(&self) -> Result<Vec<RawSessionRecord>, DeviceClientError>;
    fn get_status(&self) -> Result<Value, DeviceClientError>;
    fn get_config(&self) -> Result<Value, DeviceClientError>;
    fn get_chart_data(&self) -> Result<Value, DeviceClientError>;
    fn set_config(&self, config: &Value) -> Result<Value, DeviceClientError>;
    fn set_settings(&self, settings: &Value) -> Result<Value, DeviceClientError>;
}

#[derive(Debug, Error)]
pub enum DeviceClientError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Request {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered with http status {status}")]
    Status { path: &'static str, status: u16 },
    #[error("failed to decode {path} response as JSON: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    base_url: String,
    client: Client,
}

impl HttpDeviceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeviceClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeviceClientError::Build)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json(&self, path: &'static str) -> Result<Value, DeviceClientError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|source| DeviceClientError::Request { path, source })?;
        decode_response(path, response)
    }

    fn post_json(&self, path: &'static str, body: &Value) -> Result<Value, DeviceClientError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|source| DeviceClientError::Request { path, source })?;
        decode_response(path, response)
    }
}

fn decode_response(
    path: &'static str,
    response: reqwest::blocking::Response,
) -> Result<Value, DeviceClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DeviceClientError::Status {
            path,
            status: status.as_u16(),
        });
    }

    response
        .json::<Value>()
        .map_err(|source| DeviceClientError::Decode { path, source })
}

impl DeviceClient for HttpDeviceClient {
    fn get_session_data(&self) -> Result<Vec<RawSessionRecord>, DeviceClientError> {
        let payload = self.get_json(SESSION_DATA_PATH)?;
        let rows = decode_session_rows(&payload);
        tracing::debug!(rows = rows.len(), "fetched session log from device");
        Ok(rows)
    }

    fn get_status(&self) -> Result<Value, DeviceClientError> {
        self.get_json(STATUS_PATH)
    }

    fn get_config(&self) -> Result<Value, DeviceClientError> {
        self.get_json(CONFIG_PATH)
    }

    fn get_chart_data(&self) -> Result<Value, DeviceClientError> {
        self.get_json(CHART_DATA_PATH)
    }

    fn set_config(&self, config: &Value) -> Result<Value, DeviceClientError> {
        self.post_json(SET_CONFIG_PATH, config)
    }

    fn set_settings(&self, settings: &Value) -> Result<Value, DeviceClientError> {
        self.post_json(SET_SETTINGS_PATH, settings)
    }
}
