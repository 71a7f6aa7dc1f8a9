use crate::domain::model::LoginResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value persistence for values that must outlive the process, such as
/// the refresh token.
#[async_trait]
pub trait CookieStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn app_version(&self) -> &str;
    fn api_server(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn public_urls(&self) -> &[String];
    fn user_urls(&self) -> &[String];
}

/// Receives session transitions from the API store, including the ones
/// triggered by a transparent token refresh.
pub trait SessionObserver: Send + Sync {
    fn logged_in(&self, result: &LoginResult);
    fn logged_off(&self);
}
