pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileCookieStore, MemoryCookieStore};
pub use config::toml_config::SessionConfig;
pub use crate::core::{api::ApiStore, user::UserStore};
pub use utils::error::{Result, SessionError};
