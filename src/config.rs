//! Environment configuration

use crate::db::{ChatId, UserId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// How updates reach the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Webhook,
    Poll,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_url: String,
    pub webhook_secret: Option<String>,
    pub db_path: PathBuf,
    pub staff_channel: ChatId,
    pub admin_ids: Vec<UserId>,
    pub port: u16,
    pub files_dir: PathBuf,
    pub public_url: String,
    pub transport: TransportMode,
    pub broadcast_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());

        let bot_token =
            get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let staff_channel = parse(
            "ADMIN_CHANNEL_ID",
            &get("ADMIN_CHANNEL_ID").ok_or(ConfigError::Missing("ADMIN_CHANNEL_ID"))?,
        )?;
        let admin_ids = get("ADMIN_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| parse("ADMIN_IDS", id))
                    .collect::<Result<Vec<UserId>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        let port = get("AERP_PORT")
            .map(|p| parse("AERP_PORT", &p))
            .transpose()?
            .unwrap_or(8000);
        let transport = match get("AERP_TRANSPORT").as_deref() {
            None | Some("webhook") => TransportMode::Webhook,
            Some("poll") => TransportMode::Poll,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "AERP_TRANSPORT",
                    value: other.to_string(),
                })
            }
        };
        let broadcast_delay = get("AERP_BROADCAST_DELAY_MS")
            .map(|ms| parse("AERP_BROADCAST_DELAY_MS", &ms))
            .transpose()?
            .map_or(Duration::from_millis(50), Duration::from_millis);

        Ok(Self {
            bot_token,
            api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            webhook_secret: get("TELEGRAM_WEBHOOK_SECRET"),
            db_path: get("AERP_DB_PATH")
                .map_or_else(|| PathBuf::from(&home).join(".aerp/aerp.db"), PathBuf::from),
            staff_channel,
            admin_ids,
            port,
            files_dir: get("AERP_FILES_DIR")
                .map_or_else(|| PathBuf::from(&home).join(".aerp/files"), PathBuf::from),
            public_url: get("AERP_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            transport,
            broadcast_delay,
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("ADMIN_CHANNEL_ID", "-1001"),
        ("HOME", "/home/bot"),
    ];

    #[test]
    fn test_defaults() {
        let c = config(&REQUIRED).unwrap();
        assert_eq!(c.staff_channel, -1001);
        assert!(c.admin_ids.is_empty());
        assert_eq!(c.port, 8000);
        assert_eq!(c.transport, TransportMode::Webhook);
        assert_eq!(c.db_path, PathBuf::from("/home/bot/.aerp/aerp.db"));
        assert_eq!(c.public_url, "http://localhost:8000");
        assert_eq!(c.broadcast_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_admin_ids_skip_blanks() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("ADMIN_IDS", " 11, ,22,"));
        assert_eq!(config(&vars).unwrap().admin_ids, vec![11, 22]);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("ADMIN_IDS", "11,abc"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: "ADMIN_IDS", .. })
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("AERP_TRANSPORT", "carrier-pigeon"));
        assert!(config(&vars).is_err());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            config(&[("ADMIN_CHANNEL_ID", "1")]).unwrap_err(),
            ConfigError::Missing("TELEGRAM_BOT_TOKEN")
        );
    }
}
