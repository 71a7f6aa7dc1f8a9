pub mod access;
pub mod api;
pub(crate) mod response;
pub mod user;

pub use crate::domain::model::{ApiBody, ApiResponse, FetchOptions, LoginResult, TokenInfo, UserLogin, UserRecord};
pub use crate::domain::ports::{ConfigProvider, CookieStore, SessionObserver};
pub use crate::utils::error::Result;
pub use api::ApiStore;
pub use user::{UserConfig, UserSession, UserStore};
