use clap::Parser;
use dropper_session::config::Command;
use dropper_session::core::{ApiBody, FetchOptions, UserLogin};
use dropper_session::utils::{logger, validation::Validate};
use dropper_session::{ApiStore, CliConfig, FileCookieStore, SessionConfig, SessionError, UserStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let cookie_file = config
        .cookies
        .file
        .clone()
        .unwrap_or_else(|| dropper_session::config::DEFAULT_COOKIE_FILE.to_string());
    let cookies = Arc::new(FileCookieStore::new(cookie_file));
    let api = Arc::new(ApiStore::new(&config, cookies)?);
    let users = UserStore::new(api.clone(), &config)?;

    if !matches!(cli.command, Command::Version) {
        match api.init().await {
            Ok(true) => tracing::info!("🔑 Session restored"),
            Ok(false) => tracing::debug!("No stored session"),
            Err(e) => tracing::warn!("⚠️ Could not restore session: {}", e),
        }
    }

    if let Err(e) = run(cli.command, &config, &users).await {
        tracing::error!("❌ {} (status {})", e, e.status());
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        let exit_code = if e.is_api_error() { 2 } else { 1 };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(command: Command, config: &SessionConfig, users: &UserStore) -> Result<(), SessionError> {
    let api = users.api();
    match command {
        Command::Login { email, password } => {
            let mut login = config.test_user.to_login();
            if let Some(email) = email {
                login.email = email;
            }
            if let Some(password) = password {
                login.password = password;
            }
            users.login(&login).await?;
            println!("✅ Logged in as {} <{}>", users.username(), users.email());
        }
        Command::Create {
            username,
            email,
            password,
            mail_key,
        } => {
            let user = UserLogin {
                username,
                password,
                email,
                mail_key,
            };
            users.create(&user).await?;
            println!("✅ Created and logged in as {}", users.username());
        }
        Command::Refresh => {
            api.refresh_token().await?;
            println!("✅ Token refreshed");
        }
        Command::Logoff => {
            users.logoff().await?;
            println!("👋 Logged off");
        }
        Command::Status => {
            let user = users.user_config();
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::CheckUrl { urls } => {
            for url in urls {
                let mark = if users.has_url_access(&url) { "✅" } else { "⛔" };
                println!("{} {}", mark, url);
            }
        }
        Command::Get {
            path,
            params,
            output,
        } => {
            let query: serde_json::Map<String, serde_json::Value> = params
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            let options = if output.is_some() {
                FetchOptions::blob()
            } else {
                FetchOptions::default()
            };
            let response = api.get(&path, &query, options).await?;
            match (response.body, output) {
                (ApiBody::Blob { bytes, filename }, Some(output)) => {
                    tokio::fs::write(&output, &bytes).await?;
                    println!("📁 Saved {} bytes to {} (server name: {})", bytes.len(), output, filename);
                }
                (ApiBody::Json(value), _) => println!("{}", serde_json::to_string_pretty(&value)?),
                (ApiBody::Blob { bytes, .. }, None) => println!("{} bytes", bytes.len()),
            }
        }
        Command::Post { path, body } => {
            let body: serde_json::Value = serde_json::from_str(&body)?;
            let response = api.post(&path, &body, FetchOptions::default()).await?;
            if let Some(value) = response.body.json() {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
        }
        Command::MailKey { email } => {
            println!("{}", users.gen_mail_key(&email).await?);
        }
        Command::UsernameExists { username } => {
            let exists = users.username_exists(&username).await?;
            println!("{}", if exists { "taken" } else { "available" });
        }
        Command::Version => println!("dropper-session {}", config.app_version()),
    }
    Ok(())
}
