use std::path::PathBuf;

/// Development fallback for the token-signing secret. Running with this value
/// outside a dev box is a misconfiguration; startup logs a warning.
pub const DEV_TOKEN_SECRET: &str = "rosterd-dev-secret-not-for-production";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind: String,
    pub token_secret: String,
    pub token_secret_is_default: bool,
}

impl Config {
    /// Reads configuration from the environment once at startup.
    pub fn from_env() -> Config {
        let data_dir = std::env::var("ROSTERD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let bind =
            std::env::var("ROSTERD_BIND").unwrap_or_else(|_| "127.0.0.1:7151".to_string());
        let (token_secret, token_secret_is_default) = match std::env::var("ROSTERD_TOKEN_SECRET") {
            Ok(s) if !s.trim().is_empty() => (s, false),
            _ => (DEV_TOKEN_SECRET.to_string(), true),
        };
        Config {
            data_dir,
            bind,
            token_secret,
            token_secret_is_default,
        }
    }
}
