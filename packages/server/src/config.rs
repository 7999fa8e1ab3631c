use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public prefix of the job endpoints, used in logs
    pub base_url: String,
    pub slack_api_base_url: String,
    pub sync: SyncSettings,
    pub workspace_schedule_cron: String,
    pub channel_schedule_cron: String,
    pub job_runner_batch_size: i64,
    pub job_poll_interval: Duration,
}

/// Tunables read by the sync pipeline.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Page size for channel history calls
    pub history_page_size: u32,
    pub users_page_size: u32,
    pub channels_page_size: u32,
    pub auth_cache_ttl: Duration,
    /// How far a scheduler pass pushes a workspace's `next_update`
    pub workspace_update_interval: chrono::Duration,
    /// Delay between history crawls of one channel
    pub channel_crawl_interval: chrono::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            history_page_size: 100,
            users_page_size: 200,
            channels_page_size: 200,
            auth_cache_ttl: Duration::from_secs(30 * 60),
            workspace_update_interval: chrono::Duration::hours(24),
            channel_crawl_interval: chrono::Duration::hours(1),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = SyncSettings::default();
        let sync = SyncSettings {
            history_page_size: parse_or("CRAWLER_BATCH_SIZE", defaults.history_page_size)?,
            users_page_size: parse_or("USERS_PAGE_SIZE", defaults.users_page_size)?,
            channels_page_size: parse_or("CHANNELS_PAGE_SIZE", defaults.channels_page_size)?,
            auth_cache_ttl: Duration::from_secs(parse_or("AUTH_CACHE_TTL_SECS", 1800u64)?),
            workspace_update_interval: chrono::Duration::seconds(parse_or(
                "WORKSPACE_UPDATE_INTERVAL_SECS",
                86_400i64,
            )?),
            channel_crawl_interval: chrono::Duration::seconds(parse_or(
                "CHANNEL_CRAWL_INTERVAL_SECS",
                3_600i64,
            )?),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080u16)?,
            base_url: env::var("BASE_URL").unwrap_or_default(),
            slack_api_base_url: env::var("SLACK_API_BASE_URL")
                .unwrap_or_else(|_| slack::DEFAULT_BASE_URL.to_string()),
            sync,
            workspace_schedule_cron: env::var("WORKSPACE_SCHEDULE_CRON")
                .unwrap_or_else(|_| "0 */15 * * * *".to_string()),
            channel_schedule_cron: env::var("CHANNEL_SCHEDULE_CRON")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
            job_runner_batch_size: parse_or("JOB_RUNNER_BATCH_SIZE", 10i64)?,
            job_poll_interval: Duration::from_millis(parse_or("JOB_POLL_INTERVAL_MS", 5000u64)?),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: u32 = parse_or("SERVER_CORE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("SERVER_CORE_TEST_BAD_NUMBER", "twelve");
        let result: Result<u32> = parse_or("SERVER_CORE_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
        env::remove_var("SERVER_CORE_TEST_BAD_NUMBER");
    }

    #[test]
    fn default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.history_page_size, 100);
        assert_eq!(settings.auth_cache_ttl, Duration::from_secs(1800));
        assert_eq!(settings.workspace_update_interval, chrono::Duration::days(1));
    }
}
