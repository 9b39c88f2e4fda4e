//! Client for the watchtower HTTP API (`/list`, `/check`, `/update`).

use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One running container as reported by `GET /list`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContainerListEntry {
    // The server emits `ContainerId`; older builds used `ContainerID`.
    #[serde(rename = "ContainerID", alias = "ContainerId")]
    pub container_id: String,
    #[serde(rename = "ContainerName")]
    pub container_name: String,
    #[serde(rename = "ImageName", default)]
    pub image_name: String,
    #[serde(rename = "ImageNameShort", default)]
    pub image_name_short: String,
    #[serde(rename = "ImageVersion", default)]
    pub image_version: String,
    #[serde(rename = "ImageCreatedDate", default)]
    pub image_created_date: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListResponse {
    #[serde(rename = "Containers", default)]
    pub containers: Vec<ContainerListEntry>,
}

#[derive(Debug, Serialize)]
pub struct CheckRequest<'a> {
    #[serde(rename = "ContainerID")]
    pub container_id: &'a str,
}

/// Result of `POST /check` for a single container
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CheckResponse {
    #[serde(rename = "ContainerID", alias = "ContainerId", default)]
    pub container_id: String,
    #[serde(rename = "HasUpdate", default)]
    pub has_update: bool,
    #[serde(rename = "NewVersion", default)]
    pub new_version: String,
    #[serde(rename = "NewVersionCreated", default)]
    pub new_version_created: String,
}

/// Error body the API sends with non-OK statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

/// Failure of a single API call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The server answered with a non-OK status
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The request never produced a response
    Transport(String),
    /// The response body did not match the expected shape
    Decode(String),
}

impl ApiError {
    pub fn is_status(&self) -> bool {
        matches!(self, ApiError::Status { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }

    fn from_status(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => ApiError::Status {
                status,
                code: parsed.code,
                message: parsed.error,
            },
            Err(_) => ApiError::Status {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status {
                status,
                code: Some(code),
                message,
            } => write!(f, "API error {} ({}): {}", status, code, message),
            ApiError::Status {
                status, message, ..
            } if message.is_empty() => write!(f, "API error {}", status),
            ApiError::Status {
                status, message, ..
            } => write!(f, "API error {}: {}", status, message),
            ApiError::Transport(msg) => write!(f, "Request failed: {}", msg),
            ApiError::Decode(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// The three calls the dashboard makes against the backend.
/// Implemented by [`Client`] and by fakes in tests.
pub trait WatchtowerApi: Send + Sync {
    fn list(&self) -> Result<ListResponse, ApiError>;
    fn check(&self, container_id: &str) -> Result<CheckResponse, ApiError>;
    /// Trigger an update. An empty slice leaves the choice to the server.
    fn update(&self, containers: &[String]) -> Result<(), ApiError>;
}

pub struct Client {
    base_url: String,
    session: Arc<Session>,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(base_url: &str, session: Arc<Session>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            agent: builder.build(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.session.token())
    }
}

fn map_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            ApiError::from_status(code, &body)
        }
        ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
    }
}

impl WatchtowerApi for Client {
    fn list(&self) -> Result<ListResponse, ApiError> {
        let resp = self
            .agent
            .get(&self.endpoint("list"))
            .set("Authorization", &self.authorization())
            .call()
            .map_err(map_error)?;
        resp.into_json::<ListResponse>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn check(&self, container_id: &str) -> Result<CheckResponse, ApiError> {
        let body = serde_json::to_value(CheckRequest { container_id })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self
            .agent
            .post(&self.endpoint("check"))
            .set("Authorization", &self.authorization())
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(map_error)?;
        resp.into_json::<CheckResponse>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn update(&self, containers: &[String]) -> Result<(), ApiError> {
        let mut request = self
            .agent
            .get(&self.endpoint("update"))
            .set("Authorization", &self.authorization());
        for name in containers {
            request = request.query("container", name);
        }
        request.call().map_err(map_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_accepts_both_id_spellings() {
        let body = r#"{"Containers":[
            {"ContainerId":"abc","ContainerName":"web","ImageName":"nginx:1.25",
             "ImageNameShort":"nginx","ImageVersion":"sha256:1","ImageCreatedDate":"2024-01-02T03:04:05Z"},
            {"ContainerID":"def","ContainerName":"db"}
        ]}"#;
        let list: ListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(list.containers.len(), 2);
        assert_eq!(list.containers[0].container_id, "abc");
        assert_eq!(list.containers[0].image_name_short, "nginx");
        assert_eq!(list.containers[1].container_id, "def");
        assert_eq!(list.containers[1].image_name, "");
    }

    #[test]
    fn test_check_request_body() {
        let value = serde_json::to_value(CheckRequest { container_id: "abc" }).unwrap();
        assert_eq!(value, serde_json::json!({ "ContainerID": "abc" }));
    }

    #[test]
    fn test_check_response_decode() {
        let body = r#"{"ContainerID":"abc","HasUpdate":true,"NewVersion":"sha256:2","NewVersionCreated":"2024-02-01"}"#;
        let resp: CheckResponse = serde_json::from_str(body).unwrap();
        assert!(resp.has_update);
        assert_eq!(resp.new_version, "sha256:2");
    }

    #[test]
    fn test_status_error_with_json_body() {
        let err = ApiError::from_status(
            401,
            r#"{ "error": "The supplied token does not match the configured auth token", "code": "INVALID_TOKEN" }"#,
        );
        assert!(err.is_unauthorized());
        match &err {
            ApiError::Status { code, .. } => assert_eq!(code.as_deref(), Some("INVALID_TOKEN")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("INVALID_TOKEN"));
    }

    #[test]
    fn test_status_error_with_plain_body() {
        let err = ApiError::from_status(500, "boom\n");
        assert_eq!(err.to_string(), "API error 500: boom");
        assert!(!err.is_unauthorized());
        assert_eq!(ApiError::from_status(502, "").to_string(), "API error 502");
    }

    #[test]
    fn test_endpoint_join_trims_slash() {
        let session = Arc::new(Session::new());
        let client = Client::new("http://localhost:8080/v1/", session.clone(), None);
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.endpoint("list"), "http://localhost:8080/v1/list");

        session.set_token("secret");
        assert_eq!(client.authorization(), "Bearer secret");
    }
}
