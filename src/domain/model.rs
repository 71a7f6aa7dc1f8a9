use serde::{Deserialize, Serialize};

/// Credentials submitted to `auth` and `auth/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLogin {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_key: Option<String>,
}

/// User attributes as returned by the backend. Absent fields leave the
/// current value untouched when applied to the user store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url_access: Option<Vec<String>>,
}

/// `data` payload of a successful login, create or refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(serde_json::Value),
    Blob { bytes: Vec<u8>, filename: String },
}

impl ApiBody {
    pub fn json(&self) -> Option<&serde_json::Value> {
        match self {
            ApiBody::Json(value) => Some(value),
            ApiBody::Blob { .. } => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            ApiBody::Json(value) => Some(value),
            ApiBody::Blob { .. } => None,
        }
    }
}

/// Successful backend reply; failures are `SessionError`s.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    /// Decodes the JSON body into `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(self) -> crate::utils::error::Result<T> {
        match self.body {
            ApiBody::Json(value) => serde_json::from_value(value).map_err(|e| {
                crate::utils::error::SessionError::InvalidBody {
                    message: format!("unexpected response shape: {}", e),
                }
            }),
            ApiBody::Blob { .. } => Err(crate::utils::error::SessionError::InvalidBody {
                message: "expected JSON, received a blob".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub as_blob: bool,
    pub content_type: Option<String>,
    /// Set on credential and refresh requests, whose 401 must not trigger a refresh.
    pub(crate) skip_refresh: bool,
}

impl FetchOptions {
    pub fn blob() -> Self {
        Self {
            as_blob: true,
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub(crate) fn without_refresh() -> Self {
        Self {
            skip_refresh: true,
            ..Self::default()
        }
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("application/json")
    }
}
