pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use toml_config::SessionConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "dropper-session")]
#[command(about = "Log in, refresh and query a Dropper API from the command line")]
#[command(version)]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the API server base URL
    #[arg(long)]
    pub api_server: Option<String>,

    /// File that keeps the refresh token between invocations
    #[arg(long)]
    pub cookie_file: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in; falls back to the configured test user
    Login {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Register a new account and log in with it
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        mail_key: Option<String>,
    },
    /// Exchange the stored refresh token for a new JWT
    Refresh,
    /// Forget the current session
    Logoff,
    /// Show who is logged in
    Status,
    /// Check which routes the current user may open
    CheckUrl {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// GET an endpoint; query parameters as key=value
    Get {
        path: String,
        #[arg(value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// Write the response body to this file instead of printing JSON
        #[arg(long)]
        output: Option<String>,
    },
    /// POST a JSON body to an endpoint
    Post { path: String, body: String },
    /// Request a mail key for an address
    MailKey { email: String },
    /// Ask whether a username is already taken
    UsernameExists { username: String },
    /// Print the client version
    Version,
}

#[cfg(feature = "cli")]
fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[cfg(feature = "cli")]
pub const DEFAULT_COOKIE_FILE: &str = ".dropper-session.json";

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the file configuration (or defaults) and applies command line overrides.
    pub fn resolve(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_file(path)?,
            None => SessionConfig::default(),
        };

        if let Some(server) = &self.api_server {
            config.api.server = server.clone();
        }
        if let Some(file) = &self.cookie_file {
            config.cookies.file = Some(file.clone());
        }
        if config.cookies.file.is_none() {
            config.cookies.file = Some(DEFAULT_COOKIE_FILE.to_string());
        }

        Ok(config)
    }
}
