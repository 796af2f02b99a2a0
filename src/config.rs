use chrono::Duration;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server settings: CLI flags, then environment (a `.env` file is loaded
/// first), then defaults.
#[derive(Parser, Clone)]
#[command(name = "photo_blog", about = "Photo blog REST API server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PHOTO_BLOG_BIND", default_value = "0.0.0.0:11111")]
    pub bind: SocketAddr,

    /// Sled database directory
    #[arg(long, env = "PHOTO_BLOG_DATA_DIR", default_value = "photo_blog_data")]
    pub data_dir: PathBuf,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Session lifetime in hours
    #[arg(long, env = "PHOTO_BLOG_SESSION_TTL_HOURS", default_value_t = 144)]
    pub session_ttl_hours: i64,

    #[arg(long, env = "PHOTO_BLOG_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "PHOTO_BLOG_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("data_dir", &self.data_dir)
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("log_format", &self.log_format)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Config {
    /// Load `.env` (if any) and parse the process arguments.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.session_ttl_hours <= 0 {
            anyhow::bail!("session TTL must be positive, got {} hours", self.session_ttl_hours);
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_secret_given() {
        let config = Config::try_parse_from(["photo_blog", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:11111".parse::<SocketAddr>().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("photo_blog_data"));
        assert_eq!(config.session_ttl(), Duration::days(6));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "photo_blog",
            "--jwt-secret",
            "s3cret",
            "--bind",
            "127.0.0.1:8080",
            "--session-ttl-hours",
            "1",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.session_ttl(), Duration::hours(1));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_secret_and_bad_ttl_rejected() {
        let mut config = Config::try_parse_from(["photo_blog", "--jwt-secret", "  "]).unwrap();
        assert!(config.validate().is_err());
        config.jwt_secret = "ok".to_string();
        config.session_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = Config::try_parse_from(["photo_blog", "--jwt-secret", "hunter2"]).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
