use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Hard cap on instances generated for a template with no recurrence end
/// date. Keeps a runaway weekly rule from filling the table for a decade.
pub const MAX_INSTANCES_PER_TEMPLATE: usize = 52;

/// Longest booking the portal accepts, in minutes (4 hours).
pub const MAX_DURATION_MINUTES: u32 = 240;

/// Top-level config (matchpoint.toml + MATCHPOINT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchpointConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl MatchpointConfig {
    /// Load config: explicit path > `~/.matchpoint/matchpoint.toml`,
    /// then `MATCHPOINT_*` env vars on top.
    ///
    /// Env keys use `__` between section and key, since key names themselves
    /// contain underscores: `MATCHPOINT_ENGINE__MAX_RETRIES=5` sets
    /// `engine.max_retries`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MatchpointConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MATCHPOINT_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Everything the engine needs to know about the external booking portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin (or the same-origin relay standing in front of it),
    /// without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// How many days before a date the portal opens bookings for it.
    #[serde(default = "default_advance_window_days")]
    pub advance_window_days: u32,
    /// Portal-local wall time at which the booking window opens, "HH:MM".
    #[serde(default = "default_window_open_time")]
    pub window_open_time: String,
    /// Fixed UTC offset of the portal's locale, in hours.
    #[serde(default)]
    pub utc_offset_hours: i32,
    /// Slot granularity the portal books in, minutes.
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// Per-request network timeout, seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long an acquired challenge token stays submittable, seconds.
    #[serde(default = "default_token_budget_secs")]
    pub token_budget_secs: u64,
}

impl PortalConfig {
    /// Parse `window_open_time` into a wall-clock time.
    pub fn window_open(&self) -> Result<chrono::NaiveTime> {
        chrono::NaiveTime::parse_from_str(&self.window_open_time, "%H:%M").map_err(|e| {
            CoreError::Config(format!(
                "invalid portal.window_open_time {:?}: {e}",
                self.window_open_time
            ))
        })
    }

    /// Fixed UTC offset of the portal's locale.
    pub fn utc_offset(&self) -> Result<chrono::FixedOffset> {
        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            CoreError::Config(format!(
                "invalid portal.utc_offset_hours: {}",
                self.utc_offset_hours
            ))
        })
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            advance_window_days: default_advance_window_days(),
            window_open_time: default_window_open_time(),
            utc_offset_hours: 0,
            slot_minutes: default_slot_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
            token_budget_secs: default_token_budget_secs(),
        }
    }
}

/// Execution-engine knobs: polling cadence, retry policy, worker pool width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Transient-failure attempts before an instance is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; doubles per attempt.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Upper bound on any single retry delay.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Concurrent submissions per tick. Keep small — each one holds a live
    /// portal session.
    #[serde(default = "default_worker_width")]
    pub worker_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            worker_width: default_worker_width(),
        }
    }
}

/// Env/file-backed fallback credential source for single-operator
/// deployments. The production secret store is an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.matchpoint/matchpoint.db")
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.matchpoint/matchpoint.toml")
}

fn default_base_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_advance_window_days() -> u32 {
    7
}

fn default_window_open_time() -> String {
    "08:00".to_string()
}

fn default_slot_minutes() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_budget_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_cap_secs() -> u64 {
    600
}

fn default_worker_width() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = MatchpointConfig::default();
        assert_eq!(cfg.portal.advance_window_days, 7);
        assert_eq!(cfg.portal.window_open_time, "08:00");
        assert_eq!(cfg.engine.max_retries, 3);
        assert_eq!(cfg.engine.worker_width, 2);
        assert!(cfg.credentials.username.is_none());
    }

    #[test]
    fn window_open_time_parses() {
        let cfg = PortalConfig::default();
        assert_eq!(
            cfg.window_open().unwrap(),
            chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );

        let bad = PortalConfig {
            window_open_time: "8am".to_string(),
            ..Default::default()
        };
        assert!(bad.window_open().is_err());
    }

    #[test]
    fn toml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "matchpoint.toml",
                r#"
                [portal]
                base_url = "https://courts.example.net"
                advance_window_days = 14

                [engine]
                poll_interval_secs = 10
                "#,
            )?;
            let cfg = MatchpointConfig::load(Some("matchpoint.toml")).unwrap();
            assert_eq!(cfg.portal.base_url, "https://courts.example.net");
            assert_eq!(cfg.portal.advance_window_days, 14);
            assert_eq!(cfg.engine.poll_interval_secs, 10);
            // untouched section keeps its defaults
            assert_eq!(cfg.portal.slot_minutes, 30);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_reach_underscored_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MATCHPOINT_ENGINE__MAX_RETRIES", "9");
            jail.set_env("MATCHPOINT_PORTAL__ADVANCE_WINDOW_DAYS", "14");
            jail.set_env("MATCHPOINT_PORTAL__BASE_URL", "https://courts.example.net");
            let cfg = MatchpointConfig::load(Some("absent.toml")).unwrap();
            assert_eq!(cfg.engine.max_retries, 9);
            assert_eq!(cfg.portal.advance_window_days, 14);
            assert_eq!(cfg.portal.base_url, "https://courts.example.net");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_beat_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "matchpoint.toml",
                r#"
                [engine]
                poll_interval_secs = 10
                "#,
            )?;
            jail.set_env("MATCHPOINT_ENGINE__POLL_INTERVAL_SECS", "5");
            let cfg = MatchpointConfig::load(Some("matchpoint.toml")).unwrap();
            assert_eq!(cfg.engine.poll_interval_secs, 5);
            Ok(())
        });
    }
}
