use std::{env, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, DispatchConfig, GroupTarget, LoggingConfig,
    SendFailurePolicy,
};

const DEFAULT_SEND_DELAY_SECS: u64 = 120;

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let telegram_api_url = match env::var("TELEGRAM_API_URL") {
            Ok(value) if !value.trim().is_empty() => {
                Some(parse_api_url("TELEGRAM_API_URL", &value)?)
            }
            _ => None,
        };

        let target_group = GroupTarget {
            name: env::var("TARGET_GROUP_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing("TARGET_GROUP_NAME"))?,
            id: parse_opt::<i64>("TARGET_GROUP_ID")?,
        };

        let sender_username = env::var("SENDER_USERNAME")
            .ok()
            .map(|v| normalize_username(&v))
            .filter(|v| !v.is_empty());

        let known_chat_ids = match env::var("KNOWN_CHAT_IDS") {
            Ok(value) => parse_id_list("KNOWN_CHAT_IDS", &value)?,
            Err(_) => Vec::new(),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            downloads_dir: env::var("DOWNLOADS_DIR").unwrap_or_else(|_| "downloads".to_string()),
            db_filename: env::var("DB_FILENAME")
                .unwrap_or_else(|_| "conversations.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let dispatch = DispatchConfig {
            urls_file: PathBuf::from(
                env::var("URLS_FILE").unwrap_or_else(|_| "post_urls.json".to_string()),
            ),
            send_delay: Duration::from_secs(
                parse_opt::<u64>("SEND_DELAY_SECONDS")?.unwrap_or(DEFAULT_SEND_DELAY_SECS),
            ),
            on_failure: parse_opt::<SendFailurePolicy>("DISPATCH_ON_FAILURE")?.unwrap_or_default(),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_api_url,
            target_group,
            sender_username,
            known_chat_ids,
            directories,
            logging,
            dispatch,
        })
    }
}

fn parse_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(None),
    }
}

fn parse_id_list(key: &'static str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| ConfigError::Invalid {
                key,
                value: part.to_string(),
            })
        })
        .collect()
}

/// Bot API base URL. Method paths get appended to it, so it must be an
/// http(s) URL that can carry path segments.
fn parse_api_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::Invalid {
        key,
        value: value.to_string(),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(url)
}

fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}
