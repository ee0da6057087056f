//! Configuration parsing for the Kiwi replay feed.
//!
//! Both processes read their settings from a single JSON config file. The
//! scheduler reads the `scheduler` section, the broadcast server the
//! `broadcast` section; `logging` is shared.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "kiwi", "log_path": "/tmp/kiwi" },
//!   "scheduler": {
//!     "data_dir": "./data",
//!     "interval_ms": 1000,
//!     "collector_addr": "localhost:8080",
//!     "retry_delay_ms": 2000,
//!     "max_connect_attempts": -1,
//!     "on_disconnect": "terminate",
//!     "delimiter": ","
//!   },
//!   "broadcast": { "listen_addr": "0.0.0.0:8080" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::KiwiError;
use crate::retry::RetryPolicy;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Logging metadata (module name, log path).
    pub logging: Option<LoggingMeta>,

    /// Replay side: data directory, pacing and collector address.
    pub scheduler: Option<SchedulerConfig>,

    /// Receiving side: listen address and bind retry.
    pub broadcast: Option<BroadcastConfig>,
}

impl AppConfig {
    /// Returns the module name, falling back to `default`.
    pub fn module_name(&self, default: &str) -> String {
        self.logging
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| default.to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.logging.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// Logging metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// What a worker does when it finds the collector connection unhealthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    /// Log and stop this worker; other symbols keep running.
    #[default]
    Terminate,
    /// Drop this tick's packet and keep pacing.
    Skip,
    /// Reconnect (one worker at a time), then send.
    Reconnect,
}

/// Scheduler (replay) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding one `<SYMBOL>.csv` per symbol.
    pub data_dir: PathBuf,

    /// Pacing interval between rows of one symbol (default: 1000).
    pub interval_ms: Option<u64>,

    /// Collector `host:port` (default: `localhost:8080`).
    pub collector_addr: Option<String>,

    /// Delay between connect attempts (default: 2000).
    pub retry_delay_ms: Option<u64>,

    /// Connect attempts before giving up; negative means forever (default: -1).
    pub max_connect_attempts: Option<i64>,

    /// Reaction to an unhealthy connection (default: `terminate`).
    #[serde(default)]
    pub on_disconnect: DisconnectPolicy,

    /// Field separator in row files, a single ASCII character (default: `,`).
    pub delimiter: Option<char>,
}

impl SchedulerConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            interval_ms: None,
            collector_addr: None,
            retry_delay_ms: None,
            max_connect_attempts: None,
            on_disconnect: DisconnectPolicy::default(),
            delimiter: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(1_000))
    }

    pub fn collector_addr(&self) -> String {
        self.collector_addr.clone().unwrap_or_else(|| "localhost:8080".to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            Duration::from_millis(self.retry_delay_ms.unwrap_or(2_000)),
            self.max_connect_attempts.unwrap_or(-1),
        )
    }

    /// Row file delimiter as a byte. Only meaningful after [`validate`](Self::validate).
    pub fn delimiter(&self) -> u8 {
        self.delimiter
            .and_then(|c| u8::try_from(c).ok())
            .unwrap_or(b',')
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), KiwiError> {
        if self.interval_ms == Some(0) {
            return Err(KiwiError::Config("scheduler.interval_ms must be positive".into()));
        }
        if self.max_connect_attempts == Some(0) {
            return Err(KiwiError::Config(
                "scheduler.max_connect_attempts must be positive, or negative for unbounded".into(),
            ));
        }
        if self.collector_addr.as_deref().is_some_and(str::is_empty) {
            return Err(KiwiError::Config("scheduler.collector_addr is empty".into()));
        }
        if let Some(c) = self.delimiter {
            if !c.is_ascii() || matches!(c, '"' | '\n' | '\r') {
                return Err(KiwiError::Config(format!("scheduler.delimiter {c:?} is not a usable ASCII separator")));
            }
        }
        Ok(())
    }
}

/// Broadcast (receiving) server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastConfig {
    /// Listen address (default: `0.0.0.0:8080`).
    pub listen_addr: Option<String>,

    /// Delay between bind attempts (default: 2000).
    pub retry_delay_ms: Option<u64>,

    /// Bind attempts before giving up; negative means forever (default: -1).
    pub max_bind_attempts: Option<i64>,

    /// Log every received packet (default: true). When off, only
    /// per-connection totals are logged.
    pub log_packets: Option<bool>,
}

impl BroadcastConfig {
    pub fn listen_addr(&self) -> String {
        self.listen_addr.clone().unwrap_or_else(|| "0.0.0.0:8080".to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            Duration::from_millis(self.retry_delay_ms.unwrap_or(2_000)),
            self.max_bind_attempts.unwrap_or(-1),
        )
    }

    pub fn log_packets(&self) -> bool {
        self.log_packets.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<(), KiwiError> {
        if self.max_bind_attempts == Some(0) {
            return Err(KiwiError::Config(
                "broadcast.max_bind_attempts must be positive, or negative for unbounded".into(),
            ));
        }
        Ok(())
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "scheduler": { "data_dir": "./data" } }"#).unwrap();
        let sched = config.scheduler.as_ref().unwrap();

        assert_eq!(sched.interval(), Duration::from_secs(1));
        assert_eq!(sched.collector_addr(), "localhost:8080");
        assert_eq!(sched.retry_policy(), RetryPolicy::new(Duration::from_secs(2), None));
        assert_eq!(sched.on_disconnect, DisconnectPolicy::Terminate);
        assert!(sched.validate().is_ok());
        assert!(config.broadcast.is_none());
        assert_eq!(config.module_name("kiwi"), "kiwi");
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "logging": { "module_name": "replay", "log_path": "/tmp/kiwi" },
            "scheduler": {
                "data_dir": "/srv/bars",
                "interval_ms": 100,
                "collector_addr": "10.0.0.5:9000",
                "retry_delay_ms": 250,
                "max_connect_attempts": 3,
                "on_disconnect": "reconnect"
            },
            "broadcast": { "listen_addr": "127.0.0.1:9000", "max_bind_attempts": 5, "log_packets": false }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.module_name("kiwi"), "replay");
        assert_eq!(config.log_path().as_deref(), Some("/tmp/kiwi"));

        let sched = config.scheduler.unwrap();
        assert_eq!(sched.data_dir, PathBuf::from("/srv/bars"));
        assert_eq!(sched.interval(), Duration::from_millis(100));
        assert_eq!(sched.retry_policy(), RetryPolicy::new(Duration::from_millis(250), Some(3)));
        assert_eq!(sched.on_disconnect, DisconnectPolicy::Reconnect);

        let bc = config.broadcast.unwrap();
        assert_eq!(bc.listen_addr(), "127.0.0.1:9000");
        assert_eq!(bc.retry_policy().max_attempts, Some(5));
        assert!(!bc.log_packets());
    }

    #[test]
    fn validation_rejects_zero_interval_and_zero_attempts() {
        let mut sched = SchedulerConfig::new("./data");
        sched.interval_ms = Some(0);
        assert!(matches!(sched.validate(), Err(KiwiError::Config(_))));

        let mut sched = SchedulerConfig::new("./data");
        sched.max_connect_attempts = Some(0);
        assert!(matches!(sched.validate(), Err(KiwiError::Config(_))));

        let bc = BroadcastConfig { max_bind_attempts: Some(0), ..Default::default() };
        assert!(matches!(bc.validate(), Err(KiwiError::Config(_))));
    }

    #[test]
    fn delimiter_defaults_to_comma_and_must_be_ascii() {
        let sched = SchedulerConfig::new("./data");
        assert_eq!(sched.delimiter(), b',');

        let config: AppConfig =
            serde_json::from_str(r#"{ "scheduler": { "data_dir": ".", "delimiter": ";" } }"#).unwrap();
        let sched = config.scheduler.unwrap();
        assert!(sched.validate().is_ok());
        assert_eq!(sched.delimiter(), b';');

        let mut sched = SchedulerConfig::new("./data");
        sched.delimiter = Some('§');
        assert!(matches!(sched.validate(), Err(KiwiError::Config(_))));
        sched.delimiter = Some('"');
        assert!(matches!(sched.validate(), Err(KiwiError::Config(_))));
    }

    #[test]
    fn unknown_disconnect_policy_is_rejected() {
        let json = r#"{ "scheduler": { "data_dir": ".", "on_disconnect": "panic" } }"#;
        assert!(serde_json::from_str::<AppConfig>(json).is_err());
    }

    #[test]
    fn load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "broadcast": {{ "listen_addr": "127.0.0.1:7000" }} }}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.broadcast.unwrap().listen_addr(), "127.0.0.1:7000");
        assert!(load_config(Path::new("/nonexistent/kiwi.json")).is_err());
    }
}
