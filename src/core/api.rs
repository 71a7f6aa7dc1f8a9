use crate::core::response::parse_response;
use crate::domain::model::{ApiResponse, FetchOptions, LoginResult, TokenInfo, UserLogin};
use crate::domain::ports::{ConfigProvider, CookieStore, SessionObserver};
use crate::utils::error::{Result, SessionError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Cookie holding the refresh token between runs.
pub const REFRESH_TOKEN: &str = "refreshToken";

#[derive(Debug, Default)]
struct Tokens {
    jwt: String,
    refresh_token: String,
}

enum Payload {
    Json(Value),
    Query(Vec<(String, String)>),
}

/// HTTP access to the backend plus the JWT / refresh token pair.
pub struct ApiStore {
    client: Client,
    server: Url,
    cookies: Arc<dyn CookieStore>,
    tokens: RwLock<Tokens>,
    observer: RwLock<Option<Arc<dyn SessionObserver>>>,
}

impl ApiStore {
    pub fn new<C: ConfigProvider + ?Sized>(
        config: &C,
        cookies: Arc<dyn CookieStore>,
    ) -> Result<Self> {
        let mut server =
            Url::parse(config.api_server()).map_err(|e| SessionError::InvalidConfigValueError {
                field: "api.server".to_string(),
                value: config.api_server().to_string(),
                reason: e.to_string(),
            })?;
        // endpoint paths are joined relative to the server
        if !server.path().ends_with('/') {
            let path = format!("{}/", server.path());
            server.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SessionError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            server,
            cookies,
            tokens: RwLock::new(Tokens::default()),
            observer: RwLock::new(None),
        })
    }

    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    pub fn server(&self) -> &Url {
        &self.server
    }

    pub fn is_logged_in(&self) -> bool {
        !self.tokens().jwt.is_empty()
    }

    pub fn info(&self) -> TokenInfo {
        let tokens = self.tokens();
        TokenInfo {
            token: tokens.jwt.clone(),
            refresh_token: tokens.refresh_token.clone(),
        }
    }

    /// Restores the session from the refresh token cookie.
    /// Returns `Ok(false)` when there was nothing to restore.
    pub async fn init(&self) -> Result<bool> {
        let stored = self.cookies.get(REFRESH_TOKEN).await?;
        match stored {
            Some(token) if !token.is_empty() => {
                tracing::debug!("Restoring session from stored refresh token");
                self.tokens_mut().refresh_token = token;
                self.refresh_token().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn login(&self, user: &UserLogin) -> Result<LoginResult> {
        let credentials = json!({ "email": user.email, "password": user.password });
        let outcome = self
            .request(
                Method::POST,
                "auth",
                Payload::Json(credentials),
                &FetchOptions::without_refresh(),
            )
            .await
            .and_then(ApiResponse::parse::<LoginResult>);

        match outcome {
            Ok(result) => {
                self.adopt_login(&result).await?;
                tracing::info!(email = %user.email, "Logged in");
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(email = %user.email, error = %e, "Login failed");
                *self.tokens_mut() = Tokens::default();
                self.notify_logged_off();
                self.forget_cookie().await;
                Err(e)
            }
        }
    }

    /// Takes over the tokens of a login-shaped reply obtained elsewhere,
    /// e.g. from account creation.
    pub async fn adopt_login(&self, result: &LoginResult) -> Result<()> {
        let refresh_token = result.refresh_token.clone().unwrap_or_default();
        // the cookie is written first so a storage failure leaves the session untouched
        let persisted = if refresh_token.is_empty() {
            self.cookies.remove(REFRESH_TOKEN).await
        } else {
            self.cookies.set(REFRESH_TOKEN, &refresh_token).await
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Could not persist refresh token");
            return Err(e);
        }
        {
            let mut tokens = self.tokens_mut();
            tokens.jwt = result.token.clone();
            tokens.refresh_token = refresh_token;
        }
        self.notify_logged_in(result);
        Ok(())
    }

    pub async fn logoff(&self) -> Result<()> {
        *self.tokens_mut() = Tokens::default();
        self.notify_logged_off();
        self.cookies.remove(REFRESH_TOKEN).await?;
        tracing::info!("Logged off");
        Ok(())
    }

    /// Exchanges the refresh token for a new JWT.
    pub async fn refresh_token(&self) -> Result<LoginResult> {
        let refresh_token = self.tokens().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(SessionError::NoRefreshToken);
        }

        let options = FetchOptions::without_refresh();
        let url = self.endpoint("auth/refresh")?;
        let payload = Payload::Json(json!({ "token": refresh_token }));
        // sent directly: a refresh is never itself retried
        let outcome = match self.send(&Method::POST, &url, &payload, &options).await {
            Ok(response) => parse_response(response, &options)
                .await
                .and_then(ApiResponse::parse::<LoginResult>),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                let rotated = result.refresh_token.as_deref().filter(|t| !t.is_empty());
                if let Some(rotated) = rotated {
                    self.cookies.set(REFRESH_TOKEN, rotated).await?;
                }
                {
                    let mut tokens = self.tokens_mut();
                    tokens.jwt = result.token.clone();
                    if let Some(rotated) = rotated {
                        tokens.refresh_token = rotated.to_string();
                    }
                }
                self.notify_logged_in(&result);
                tracing::debug!("JWT refreshed");
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                self.forget_cookie().await;
                self.tokens_mut().jwt.clear();
                self.notify_logged_off();
                Err(e)
            }
        }
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        options: FetchOptions,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, url, Payload::Json(body), &options)
            .await
    }

    /// `query` must serialize to a flat JSON object; each entry becomes a
    /// query parameter.
    pub async fn get<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
        options: FetchOptions,
    ) -> Result<ApiResponse> {
        let pairs = query_pairs(&serde_json::to_value(query)?);
        self.request(Method::GET, url, Payload::Query(pairs), &options)
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        options: &FetchOptions,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(path)?;
        let response = self.fetch(&method, &url, &payload, options).await?;
        parse_response(response, options).await
    }

    /// Sends once; on 401 refreshes the JWT and sends once more with the new token.
    async fn fetch(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        options: &FetchOptions,
    ) -> Result<reqwest::Response> {
        let response = self.send(method, url, payload, options).await?;

        let can_refresh = !options.skip_refresh && !self.tokens().refresh_token.is_empty();
        if response.status() == StatusCode::UNAUTHORIZED && can_refresh {
            tracing::debug!(%url, "JWT rejected, refreshing before retry");
            self.refresh_token().await?;
            return self.send(method, url, payload, options).await;
        }

        Ok(response)
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        options: &FetchOptions,
    ) -> Result<reqwest::Response> {
        tracing::debug!(%method, %url, "API request");
        self.build_request(method, url, payload, options)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "API server unreachable");
                SessionError::NoNetwork(e)
            })
    }

    fn build_request(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        options: &FetchOptions,
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, options.content_type());

        let jwt = self.tokens().jwt.clone();
        if !jwt.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", jwt));
        }

        match payload {
            Payload::Json(body) => request.body(body.to_string()),
            Payload::Query(pairs) if pairs.is_empty() => request,
            Payload::Query(pairs) => request.query(pairs),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.server
            .join(path.trim_start_matches('/'))
            .map_err(|e| SessionError::InvalidConfigValueError {
                field: "url".to_string(),
                value: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn forget_cookie(&self) {
        if let Err(e) = self.cookies.remove(REFRESH_TOKEN).await {
            tracing::warn!(error = %e, "Failed to remove refresh token cookie");
        }
    }

    fn notify_logged_in(&self, result: &LoginResult) {
        let observer = self.observer();
        if let Some(observer) = observer {
            observer.logged_in(result);
        }
    }

    fn notify_logged_off(&self) {
        let observer = self.observer();
        if let Some(observer) = observer {
            observer.logged_off();
        }
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn tokens(&self) -> RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tokens_mut(&self) -> RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn query_pairs(query: &Value) -> Vec<(String, String)> {
    match query {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCookieStore;
    use crate::config::toml_config::SessionConfig;

    fn store(server: &str) -> ApiStore {
        let mut config = SessionConfig::default();
        config.api.server = server.to_string();
        ApiStore::new(&config, Arc::new(MemoryCookieStore::new())).unwrap()
    }

    #[test]
    fn test_endpoint_resolution() {
        let api = store("http://localhost:3060/api/");
        assert_eq!(
            api.endpoint("auth/refresh").unwrap().as_str(),
            "http://localhost:3060/api/auth/refresh"
        );
        assert_eq!(
            api.endpoint("/auth").unwrap().as_str(),
            "http://localhost:3060/api/auth"
        );
    }

    #[test]
    fn test_server_without_trailing_slash() {
        let api = store("http://localhost:3060/api");
        assert_eq!(
            api.endpoint("auth").unwrap().as_str(),
            "http://localhost:3060/api/auth"
        );
    }

    #[test]
    fn test_invalid_server_rejected() {
        let mut config = SessionConfig::default();
        config.api.server = "not a url".to_string();
        let result = ApiStore::new(&config, Arc::new(MemoryCookieStore::new()));
        assert!(matches!(
            result,
            Err(SessionError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"email": "a@b.c", "unique": true, "page": 2}));
        assert!(pairs.contains(&("email".to_string(), "a@b.c".to_string())));
        assert!(pairs.contains(&("unique".to_string(), "true".to_string())));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(query_pairs(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let api = store("http://localhost:3060/api/");
        let err = api.refresh_token().await.unwrap_err();
        assert!(matches!(err, SessionError::NoRefreshToken));
        assert_eq!(err.status(), 601);
        assert!(!api.is_logged_in());
    }

    #[tokio::test]
    async fn test_init_without_cookie() {
        let api = store("http://localhost:3060/api/");
        assert!(!api.init().await.unwrap());
        assert_eq!(api.info(), TokenInfo::default());
    }
}
