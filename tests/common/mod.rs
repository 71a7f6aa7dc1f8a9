#![allow(dead_code)]

use dropper_session::core::UserLogin;
use dropper_session::{ApiStore, MemoryCookieStore, SessionConfig, UserStore};
use httpmock::MockServer;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Harness {
    pub api: Arc<ApiStore>,
    pub users: UserStore,
    pub cookies: Arc<MemoryCookieStore>,
}

pub fn config_for(server: &MockServer) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.api.server = server.url("/api/");
    config.api.timeout_seconds = 5;
    config
}

pub fn harness(server: &MockServer) -> Harness {
    harness_with_cookies(server, Arc::new(MemoryCookieStore::new()))
}

pub fn harness_with_cookies(server: &MockServer, cookies: Arc<MemoryCookieStore>) -> Harness {
    let config = config_for(server);
    let api = Arc::new(ApiStore::new(&config, cookies.clone()).unwrap());
    let users = UserStore::new(api.clone(), &config).unwrap();
    Harness {
        api,
        users,
        cookies,
    }
}

pub fn jane() -> UserLogin {
    UserLogin {
        username: "jane".to_string(),
        password: "s3cret".to_string(),
        email: "jane@example.com".to_string(),
        mail_key: None,
    }
}

/// `data` envelope of a login/refresh reply.
pub fn login_body(token: &str, refresh_token: Option<&str>) -> Value {
    let mut data = json!({
        "token": token,
        "user": {
            "username": "jane",
            "email": "jane@example.com",
            "urlAccess": ["/reports*"]
        }
    });
    if let Some(refresh_token) = refresh_token {
        data["refreshToken"] = json!(refresh_token);
    }
    json!({ "data": data })
}
