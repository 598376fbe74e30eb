use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dispatch::{BoardSource, MoveApi};
use crate::model::config::ServerConfig;
use crate::model::container::{BoardData, ContainerRecord};
use crate::model::item::ItemRecord;
use crate::ops::optimistic::{MoveFailure, MoveTarget};

/// Error type for board fetches
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct MoveBody<'a> {
    column_id: &'a str,
    position: usize,
}

/// Split a non-success response body into (code, message). Bodies that do
/// not follow `{"error": {"code", "message"}}` keep the status as the code.
fn error_parts(status: StatusCode, body: &str) -> (String, String) {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => (parsed.error.code, parsed.error.message),
        Err(_) => (
            status.as_u16().to_string(),
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| body.trim().to_string()),
        ),
    }
}

/// REST client for the board backend
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    client: Client,
    base_url: String,
}

impl HttpBoardApi {
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpBoardApi {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let (code, message) = error_parts(status, &body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                code,
                message,
            });
        }
        Ok(response.json()?)
    }
}

impl MoveApi for HttpBoardApi {
    fn move_item(&self, item_id: &str, target: &MoveTarget) -> Result<ItemRecord, MoveFailure> {
        let url = format!("{}/tasks/{}/move", self.base_url, item_id);
        debug!(%url, column = %target.container_id, position = target.position, "PATCH");
        let network = |e: reqwest::Error| MoveFailure::Network { detail: e.to_string() };
        let response = self
            .client
            .patch(&url)
            .json(&MoveBody {
                column_id: &target.container_id,
                position: target.position,
            })
            .send()
            .map_err(network)?;
        let status = response.status();
        if status.is_success() {
            return response.json().map_err(network);
        }
        let body = response.text().unwrap_or_default();
        let (code, message) = error_parts(status, &body);
        Err(MoveFailure::Rejected { code, message })
    }
}

impl BoardSource for HttpBoardApi {
    fn fetch_board(&self, board_id: &str) -> Result<BoardData, ApiError> {
        let columns: Vec<ContainerRecord> = self.get_json(&format!("/boards/{board_id}/columns"))?;
        let tasks: Vec<ItemRecord> = self.get_json(&format!("/boards/{board_id}/tasks"))?;
        Ok(BoardData { columns, tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_parts_structured() {
        let (code, message) = error_parts(
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":"not_found","message":"Task not found"}}"#,
        );
        assert_eq!(code, "not_found");
        assert_eq!(message, "Task not found");
    }

    #[test]
    fn test_error_parts_unstructured() {
        let (code, message) = error_parts(StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert_eq!(code, "502");
        assert_eq!(message, "Bad Gateway");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ServerConfig {
            base_url: "http://localhost:8000/api/".into(),
            ..ServerConfig::default()
        };
        let api = HttpBoardApi::new(&config).unwrap();
        assert_eq!(api.base_url, "http://localhost:8000/api");
    }

    #[test]
    fn test_unreachable_backend_is_network_failure() {
        let config = ServerConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
            ..ServerConfig::default()
        };
        let api = HttpBoardApi::new(&config).unwrap();
        let err = api.move_item("t1", &MoveTarget::new("B", 0)).unwrap_err();
        assert!(matches!(err, MoveFailure::Network { .. }));
    }
}
