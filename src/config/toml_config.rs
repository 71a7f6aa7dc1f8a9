use crate::domain::model::UserLogin;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, SessionError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_SERVER: &str = "http://localhost:3060/api/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub api: ApiConfig,
    pub access: AccessConfig,
    pub cookies: CookieConfig,
    pub test_user: TestUserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_API_SERVER.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Routes open to everybody.
    pub public_urls: Vec<String>,
    /// Routes open to any logged in user.
    pub user_urls: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            public_urls: ["/", "/index", "/user/login", "/user/create", "/about"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            user_urls: vec!["/projects*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestUserConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for TestUserConfig {
    fn default() -> Self {
        Self {
            username: "Test user".to_string(),
            email: "frontend@dropper.org".to_string(),
            password: "123456".to_string(),
        }
    }
}

impl TestUserConfig {
    pub fn to_login(&self) -> UserLogin {
        UserLogin {
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone(),
            mail_key: None,
        }
    }
}

impl SessionConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SessionError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SessionError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SessionError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn app_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

impl ConfigProvider for SessionConfig {
    fn app_version(&self) -> &str {
        SessionConfig::app_version(self)
    }

    fn api_server(&self) -> &str {
        &self.api.server
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    fn public_urls(&self) -> &[String] {
        &self.access.public_urls
    }

    fn user_urls(&self) -> &[String] {
        &self.access.user_urls
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api.server", &self.api.server)?;
        validation::validate_range("api.timeout_seconds", self.api.timeout_seconds, 1, 300)?;
        validation::validate_url_patterns("access.public_urls", &self.access.public_urls)?;
        validation::validate_url_patterns("access.user_urls", &self.access.user_urls)?;
        if let Some(file) = &self.cookies.file {
            validation::validate_path("cookies.file", file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_any_section() {
        let config = SessionConfig::from_toml_str("").unwrap();

        assert_eq!(config.api.server, DEFAULT_API_SERVER);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.access.user_urls, vec!["/projects*".to_string()]);
        assert_eq!(config.access.public_urls.len(), 5);
        assert_eq!(config.test_user.email, "frontend@dropper.org");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[api]
server = "https://api.example.com/v1/"
timeout_seconds = 10

[access]
public_urls = ["/", "/help*"]
user_urls = ["/projects*", "/settings"]

[cookies]
file = "./session.json"

[test_user]
username = "qa"
email = "qa@example.com"
password = "pw"
"#;

        let config = SessionConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.api_server(), "https://api.example.com/v1/");
        assert_eq!(config.public_urls(), &["/".to_string(), "/help*".to_string()]);
        assert_eq!(config.cookies.file.as_deref(), Some("./session.json"));
        assert_eq!(config.test_user.to_login().email, "qa@example.com");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DROPPER_TEST_API_SERVER", "https://test.api.com/api/");

        let toml_content = r#"
[api]
server = "${DROPPER_TEST_API_SERVER}"
"#;

        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.api.server, "https://test.api.com/api/");

        std::env::remove_var("DROPPER_TEST_API_SERVER");
    }

    #[test]
    fn test_unknown_env_var_is_kept() {
        let toml_content = r#"
[api]
server = "${DROPPER_SURELY_UNSET_VARIABLE}"
"#;

        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.api.server, "${DROPPER_SURELY_UNSET_VARIABLE}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[access]
user_urls = ["projects*"]
"#;

        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[api]\nserver = \"http://127.0.0.1:9000/api/\"\n")
            .unwrap();

        let config = SessionConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.api.server, "http://127.0.0.1:9000/api/");
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let err = SessionConfig::from_toml_str("[api\nserver =").unwrap_err();
        assert!(matches!(err, SessionError::ConfigValidationError { .. }));
    }
}
