use crate::domain::model::{ApiBody, ApiResponse, FetchOptions};
use crate::utils::error::{Result, SessionError};
use reqwest::header::CONTENT_DISPOSITION;
use serde_json::Value;

const ATTACHMENT_PREFIX: &str = "attachment; filename=";

/// Turns a backend reply into a body or a classified error.
pub(crate) async fn parse_response(
    response: reqwest::Response,
    options: &FetchOptions,
) -> Result<ApiResponse> {
    let status = response.status();

    if status.is_success() {
        if options.as_blob {
            let filename = response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .map(blob_filename)
                .unwrap_or_default();
            let bytes = response.bytes().await.map_err(SessionError::NoNetwork)?;
            return Ok(ApiResponse {
                status: status.as_u16(),
                body: ApiBody::Blob {
                    bytes: bytes.to_vec(),
                    filename,
                },
            });
        }

        let bytes = response.bytes().await.map_err(SessionError::NoNetwork)?;
        return Ok(ApiResponse {
            status: status.as_u16(),
            body: ApiBody::Json(extract_data(&bytes)?),
        });
    }

    let reason = status.canonical_reason().unwrap_or_default().to_string();
    let bytes = response.bytes().await.unwrap_or_default();
    let error = classify_error(status.as_u16(), &reason, &bytes);
    tracing::debug!(status = status.as_u16(), error = %error, "API request failed");
    Err(error)
}

/// Successful replies wrap their payload in a `data` envelope.
pub(crate) fn extract_data(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let mut json: Value =
        serde_json::from_slice(bytes).map_err(|e| SessionError::InvalidBody {
            message: e.to_string(),
        })?;
    Ok(json
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

pub(crate) fn classify_error(status: u16, reason: &str, body: &[u8]) -> SessionError {
    match status {
        400 => {
            let message = serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|json| describe_errors(&json))
                .unwrap_or_else(|| "bad request".to_string());
            SessionError::BadRequest { message }
        }
        401 => SessionError::Unauthorized,
        403 => SessionError::Forbidden,
        404 => SessionError::NotFound,
        422 => {
            let titles: Vec<String> = serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|json| json.get("errors").and_then(Value::as_array).cloned())
                .unwrap_or_default()
                .iter()
                .map(error_title)
                .collect();
            SessionError::Unprocessable {
                message: titles.join("\n"),
            }
        }
        500 => match serde_json::from_slice::<Value>(body) {
            Ok(json) => match describe_errors(&json) {
                Some(message) => SessionError::Server {
                    message,
                    // only the first error carries a useful trace
                    stack: json["errors"][0].get("stack").cloned(),
                },
                None => SessionError::Server {
                    message: "no errors defined".to_string(),
                    stack: None,
                },
            },
            Err(_) => SessionError::Server {
                message: format!("{} (no json body)", reason),
                stack: None,
            },
        },
        _ => SessionError::Unknown {
            status,
            reason: reason.to_string(),
        },
    }
}

/// `"title (status)"` per entry of `errors`, or `None` when there are none.
fn describe_errors(json: &Value) -> Option<String> {
    let errors = json.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let parts: Vec<String> = errors
        .iter()
        .map(|e| {
            let status = match e.get("status") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            format!("{} ({})", error_title(e), status)
        })
        .collect();
    Some(parts.join(" \n"))
}

fn error_title(error: &Value) -> String {
    match error.get("title") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn blob_filename(disposition: &str) -> String {
    let name = disposition
        .strip_prefix(ATTACHMENT_PREFIX)
        .or_else(|| disposition.split_once("filename=").map(|(_, rest)| rest))
        .unwrap_or_default();
    name.trim().trim_matches('"').to_string()
}
