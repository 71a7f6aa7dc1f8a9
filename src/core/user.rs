use crate::core::access::{compile_patterns, has_access, UrlPattern};
use crate::core::api::ApiStore;
use crate::domain::model::{FetchOptions, LoginResult, UserLogin, UserRecord};
use crate::domain::ports::{ConfigProvider, SessionObserver};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

pub const ANON_USERNAME: &str = "anon";
pub const ANON_EMAIL: &str = "anon@example.com";

/// Snapshot of the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    pub is_logged_in: bool,
    pub username: String,
    pub email: String,
    pub url_access: Vec<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            is_logged_in: false,
            username: ANON_USERNAME.to_string(),
            email: ANON_EMAIL.to_string(),
            url_access: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct UserState {
    config: UserConfig,
    url_match: Vec<UrlPattern>,
}

/// User state shared with the API store, which reports logins and logoffs
/// (including those caused by a background refresh).
#[derive(Debug, Default)]
pub struct UserSession {
    state: RwLock<UserState>,
}

impl UserSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, UserState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = UserState::default();
    }

    fn apply(&self, values: &UserRecord, logged_in: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(username) = values.username.as_deref().filter(|s| !s.is_empty()) {
            state.config.username = username.to_string();
        }
        if let Some(email) = values.email.as_deref().filter(|s| !s.is_empty()) {
            state.config.email = email.to_string();
        }
        if let Some(url_access) = &values.url_access {
            state.config.url_access = url_access.clone();
        }

        let mut url_match = Vec::with_capacity(state.config.url_access.len());
        for pattern in &state.config.url_access {
            match UrlPattern::compile(pattern) {
                Ok(compiled) => url_match.push(compiled),
                Err(e) => tracing::warn!(%pattern, error = %e, "Ignoring invalid access pattern"),
            }
        }
        state.url_match = url_match;
        state.config.is_logged_in = logged_in;
    }
}

impl SessionObserver for UserSession {
    fn logged_in(&self, result: &LoginResult) {
        self.apply(&result.user.clone().unwrap_or_default(), true);
    }

    fn logged_off(&self) {
        self.clear();
    }
}

#[derive(Debug, Deserialize)]
struct MailKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct UsernameExists {
    exists: bool,
}

/// Account operations and route access for the current user.
pub struct UserStore {
    api: Arc<ApiStore>,
    session: Arc<UserSession>,
    global_match: Vec<UrlPattern>,
    user_match: Vec<UrlPattern>,
}

impl UserStore {
    pub fn new<C: ConfigProvider + ?Sized>(api: Arc<ApiStore>, config: &C) -> Result<Self> {
        let session = Arc::new(UserSession::new());
        api.set_observer(session.clone());

        Ok(Self {
            api,
            session,
            global_match: compile_patterns(config.public_urls())?,
            user_match: compile_patterns(config.user_urls())?,
        })
    }

    pub fn api(&self) -> &Arc<ApiStore> {
        &self.api
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.read().config.is_logged_in
    }

    pub fn username(&self) -> String {
        self.session.read().config.username.clone()
    }

    pub fn email(&self) -> String {
        self.session.read().config.email.clone()
    }

    pub fn user_config(&self) -> UserConfig {
        self.session.read().config.clone()
    }

    /// Registers a new account and continues as that user.
    pub async fn create(&self, user: &UserLogin) -> Result<()> {
        tracing::info!(username = %user.username, email = %user.email, "Creating user");

        let outcome = self
            .api
            .post("auth/create", user, FetchOptions::default())
            .await
            .and_then(|response| response.parse::<LoginResult>());

        match outcome {
            Ok(result) => {
                tracing::debug!(username = %user.username, "User created");
                self.api.adopt_login(&result).await
            }
            Err(e) => {
                tracing::warn!(username = %user.username, error = %e, "User creation failed");
                if let Err(logoff_error) = self.api.logoff().await {
                    tracing::warn!(error = %logoff_error, "Logoff after failed creation failed");
                }
                Err(e)
            }
        }
    }

    pub async fn login(&self, user: &UserLogin) -> Result<()> {
        tracing::info!(email = %user.email, "Login user");
        // the API store logs off on failure
        self.api.login(user).await.map(|_| ())
    }

    pub async fn logoff(&self) -> Result<()> {
        self.session.clear();
        self.api.logoff().await
    }

    /// Logged in users see the user routes; per-user grants and the public
    /// routes apply to everybody.
    pub fn has_url_access(&self, url: &str) -> bool {
        let state = self.session.read();
        if state.config.is_logged_in && has_access(&self.user_match, url) {
            return true;
        }
        has_access(&state.url_match, url) || has_access(&self.global_match, url)
    }

    /// Asks the backend for a mail key for `email`.
    pub async fn gen_mail_key(&self, email: &str) -> Result<String> {
        let response = self
            .api
            .get(
                "auth/key",
                &json!({ "email": email, "unique": true }),
                FetchOptions::default(),
            )
            .await?;
        Ok(response.parse::<MailKey>()?.key)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let response = self
            .api
            .post(
                "auth/username",
                &json!({ "username": username }),
                FetchOptions::default(),
            )
            .await?;
        Ok(response.parse::<UsernameExists>()?.exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCookieStore;
    use crate::config::toml_config::SessionConfig;

    fn user_store() -> UserStore {
        let config = SessionConfig::default();
        let api = Arc::new(ApiStore::new(&config, Arc::new(MemoryCookieStore::new())).unwrap());
        UserStore::new(api, &config).unwrap()
    }

    fn login_result(user: UserRecord) -> LoginResult {
        LoginResult {
            token: "jwt".to_string(),
            refresh_token: Some("refresh".to_string()),
            user: Some(user),
        }
    }

    #[test]
    fn test_starts_anonymous() {
        let store = user_store();
        assert!(!store.is_logged_in());
        assert_eq!(store.username(), ANON_USERNAME);
        assert_eq!(store.email(), ANON_EMAIL);
        assert!(store.user_config().url_access.is_empty());
    }

    #[test]
    fn test_public_routes_for_anonymous() {
        let store = user_store();
        for url in ["/", "/index", "/user/login", "/user/create", "/about"] {
            assert!(store.has_url_access(url), "expected access to {}", url);
        }
        assert!(!store.has_url_access("/projects"));
        assert!(!store.has_url_access("/admin"));
    }

    #[test]
    fn test_logged_in_user_routes_and_grants() {
        let store = user_store();
        store.session.logged_in(&login_result(UserRecord {
            username: Some("jane".to_string()),
            email: Some("jane@example.com".to_string()),
            url_access: Some(vec!["/admin/**".to_string()]),
        }));

        assert!(store.is_logged_in());
        assert_eq!(store.username(), "jane");
        assert!(store.has_url_access("/projects"));
        assert!(store.has_url_access("/projects-2024"));
        assert!(store.has_url_access("/admin/users/1"));
        assert!(!store.has_url_access("/billing"));
    }

    #[test]
    fn test_partial_record_keeps_existing_values() {
        let store = user_store();
        store.session.logged_in(&login_result(UserRecord {
            username: Some("jane".to_string()),
            email: Some("jane@example.com".to_string()),
            url_access: Some(vec!["/reports".to_string()]),
        }));
        store.session.logged_in(&login_result(UserRecord {
            username: Some(String::new()),
            email: None,
            url_access: None,
        }));

        let config = store.user_config();
        assert_eq!(config.username, "jane");
        assert_eq!(config.email, "jane@example.com");
        assert_eq!(config.url_access, vec!["/reports".to_string()]);
        assert!(store.has_url_access("/reports"));
    }

    #[test]
    fn test_logged_off_resets_to_anonymous() {
        let store = user_store();
        store.session.logged_in(&login_result(UserRecord {
            username: Some("jane".to_string()),
            email: None,
            url_access: Some(vec!["/reports".to_string()]),
        }));
        store.session.logged_off();

        assert_eq!(store.user_config(), UserConfig::default());
        assert!(!store.has_url_access("/reports"));
        assert!(!store.has_url_access("/projects"));
    }
}
