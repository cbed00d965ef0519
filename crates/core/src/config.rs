//! Vault configuration
//!
//! Controls where documents live, whether writes are verified, and how
//! snapshots are scheduled and retained. Values can be supplied in code
//! through the builder methods or read from the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names understood by [`VaultConfig::from_env`]
pub mod env_keys {
    /// Root data directory
    pub const DATA_DIR: &str = "DOCVAULT_DATA_DIR";
    /// Verify every document write with a checksum (`true`/`false`).
    pub const VERIFY_WRITES: &str = "DOCVAULT_VERIFY_WRITES";
    /// Enable the periodic snapshot scheduler.
    pub const BACKUP_ENABLED: &str = "BACKUP_ENABLED";
    /// Scheduler interval in hours
    pub const BACKUP_INTERVAL_HOURS: &str = "BACKUP_INTERVAL_HOURS";
    /// Gzip snapshot archives
    pub const BACKUP_COMPRESS: &str = "BACKUP_COMPRESS";
    /// Maximum snapshots retained overall
    pub const BACKUP_MAX_COUNT: &str = "BACKUP_MAX_COUNT";
    /// Snapshots kept in the daily tier.
    pub const BACKUP_KEEP_DAILY: &str = "BACKUP_KEEP_DAILY";
    /// Snapshots kept in the weekly tier.
    pub const BACKUP_KEEP_WEEKLY: &str = "BACKUP_KEEP_WEEKLY";
    /// Snapshots kept in the monthly tier.
    pub const BACKUP_KEEP_MONTHLY: &str = "BACKUP_KEEP_MONTHLY";
    /// Take a final snapshot when the vault shuts down.
    pub const BACKUP_ON_SHUTDOWN: &str = "BACKUP_ON_SHUTDOWN";
    /// `independent` or `atomic`
    pub const BACKUP_RESTORE_MODE: &str = "BACKUP_RESTORE_MODE";
}

/// How a multi-document restore behaves when one document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Each document is restored on its own; earlier documents stay
    /// restored when a later one fails.
    #[default]
    Independent,
    /// All documents are decoded first and written as one batch; any
    /// failure reverts every document to its pre-restore content.
    Atomic,
}

impl FromStr for RestoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(RestoreMode::Independent),
            "atomic" => Ok(RestoreMode::Atomic),
            other => Err(other.to_string()),
        }
    }
}

/// Per-tier snapshot counts.
///
/// Tiers are age buckets: daily (< 7 days), weekly (< 30 days) and
/// monthly (< 365 days). Snapshots older than the monthly bound are always
/// pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Maximum snapshots younger than 7 days.
    pub daily: usize,
    /// Maximum snapshots between 7 and 30 days old.
    pub weekly: usize,
    /// Maximum snapshots between 30 and 365 days old.
    pub monthly: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            daily: 7,
            weekly: 4,
            monthly: 12,
        }
    }
}

/// Snapshot scheduling and retention settings.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Run the periodic scheduler
    pub enabled: bool,
    /// Time between scheduled snapshots
    pub interval: Duration,
    /// Gzip each archive
    pub compress: bool,
    /// Cap on snapshots retained overall, applied after the tiers.
    pub max_snapshots: Option<usize>,
    /// Tiered retention counts
    pub retention: RetentionConfig,
    /// Take a final snapshot during shutdown.
    pub snapshot_on_shutdown: bool,
    /// Multi-document restore behavior
    pub restore_mode: RestoreMode,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            enabled: true,
            interval: Duration::from_secs(24 * 3600),
            compress: true,
            max_snapshots: None,
            retention: RetentionConfig::default(),
            snapshot_on_shutdown: false,
            restore_mode: RestoreMode::Independent,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root data directory (`documents/` and `backups/` live under it).
    pub data_dir: PathBuf,
    /// Verify each document write against an MD5 of the payload.
    pub verify_writes: bool,
    /// Snapshot settings
    pub backup: BackupConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            data_dir: PathBuf::from("data"),
            verify_writes: false,
            backup: BackupConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Create config rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        VaultConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Create config for testing.
    ///
    /// The scheduler is disabled so tests drive snapshots explicitly, and
    /// writes are verified.
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        VaultConfig {
            data_dir: data_dir.into(),
            verify_writes: true,
            backup: BackupConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a key lookup function.
    ///
    /// Unset keys keep their defaults. Set but unparseable keys fail.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = VaultConfig::default();

        if let Some(dir) = lookup(env_keys::DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_key::<bool, _>(&lookup, env_keys::VERIFY_WRITES)? {
            config.verify_writes = v;
        }
        if let Some(v) = parse_key::<bool, _>(&lookup, env_keys::BACKUP_ENABLED)? {
            config.backup.enabled = v;
        }
        if let Some(hours) = parse_key::<u64, _>(&lookup, env_keys::BACKUP_INTERVAL_HOURS)? {
            config.backup.interval = Duration::from_secs(hours.saturating_mul(3600));
        }
        if let Some(v) = parse_key::<bool, _>(&lookup, env_keys::BACKUP_COMPRESS)? {
            config.backup.compress = v;
        }
        if let Some(v) = parse_key::<usize, _>(&lookup, env_keys::BACKUP_MAX_COUNT)? {
            config.backup.max_snapshots = Some(v);
        }
        if let Some(v) = parse_key::<usize, _>(&lookup, env_keys::BACKUP_KEEP_DAILY)? {
            config.backup.retention.daily = v;
        }
        if let Some(v) = parse_key::<usize, _>(&lookup, env_keys::BACKUP_KEEP_WEEKLY)? {
            config.backup.retention.weekly = v;
        }
        if let Some(v) = parse_key::<usize, _>(&lookup, env_keys::BACKUP_KEEP_MONTHLY)? {
            config.backup.retention.monthly = v;
        }
        if let Some(v) = parse_key::<bool, _>(&lookup, env_keys::BACKUP_ON_SHUTDOWN)? {
            config.backup.snapshot_on_shutdown = v;
        }
        if let Some(v) = parse_key::<RestoreMode, _>(&lookup, env_keys::BACKUP_RESTORE_MODE)? {
            config.backup.restore_mode = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set write verification
    pub fn with_verify_writes(mut self, verify: bool) -> Self {
        self.verify_writes = verify;
        self
    }

    /// Enable or disable the scheduler.
    pub fn with_scheduler(mut self, enabled: bool) -> Self {
        self.backup.enabled = enabled;
        self
    }

    /// Set the scheduler interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.backup.interval = interval;
        self
    }

    /// Set archive compression
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.backup.compress = compress;
        self
    }

    /// Set tiered retention counts
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.backup.retention = retention;
        self
    }

    /// Set the overall snapshot cap.
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.backup.max_snapshots = Some(max);
        self
    }

    /// Set the restore mode
    pub fn with_restore_mode(mut self, mode: RestoreMode) -> Self {
        self.backup.restore_mode = mode;
        self
    }

    /// Take a final snapshot during shutdown.
    pub fn with_snapshot_on_shutdown(mut self, enabled: bool) -> Self {
        self.backup.snapshot_on_shutdown = enabled;
        self
    }

    /// Documents directory
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    /// Snapshot directory
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if self.backup.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.backup.retention.daily == 0 {
            return Err(ConfigError::ZeroDailyRetention);
        }
        if self.backup.max_snapshots == Some(0) {
            return Err(ConfigError::ZeroMaxSnapshots);
        }
        Ok(())
    }
}

fn parse_key<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment value could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Data directory is empty
    #[error("Data directory must not be empty")]
    EmptyDataDir,

    /// Scheduler interval is zero
    #[error("Backup interval must be greater than zero")]
    ZeroInterval,

    /// Daily tier keeps nothing
    #[error("Daily retention must keep at least one snapshot")]
    ZeroDailyRetention,

    /// Overall cap keeps nothing
    #[error("Maximum snapshot count must be at least one")]
    ZeroMaxSnapshots,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert!(config.backup.enabled);
        assert!(config.backup.compress);
        assert_eq!(config.backup.interval, Duration::from_secs(86_400));
        assert_eq!(config.backup.retention, RetentionConfig::default());
        assert_eq!(config.backup.restore_mode, RestoreMode::Independent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = VaultConfig::new("/tmp/vault")
            .with_verify_writes(true)
            .with_compression(false)
            .with_max_snapshots(3)
            .with_restore_mode(RestoreMode::Atomic);

        assert!(config.verify_writes);
        assert!(!config.backup.compress);
        assert_eq!(config.backup.max_snapshots, Some(3));
        assert_eq!(config.backup.restore_mode, RestoreMode::Atomic);
        assert_eq!(config.documents_dir(), PathBuf::from("/tmp/vault/documents"));
        assert_eq!(config.backups_dir(), PathBuf::from("/tmp/vault/backups"));
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            (env_keys::DATA_DIR, "/srv/data"),
            (env_keys::VERIFY_WRITES, "true"),
            (env_keys::BACKUP_ENABLED, "false"),
            (env_keys::BACKUP_INTERVAL_HOURS, "6"),
            (env_keys::BACKUP_COMPRESS, "false"),
            (env_keys::BACKUP_MAX_COUNT, "20"),
            (env_keys::BACKUP_KEEP_DAILY, "3"),
            (env_keys::BACKUP_KEEP_WEEKLY, "2"),
            (env_keys::BACKUP_KEEP_MONTHLY, "1"),
            (env_keys::BACKUP_ON_SHUTDOWN, "true"),
            (env_keys::BACKUP_RESTORE_MODE, "Atomic"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert!(config.verify_writes);
        assert!(!config.backup.enabled);
        assert_eq!(config.backup.interval, Duration::from_secs(6 * 3600));
        assert!(!config.backup.compress);
        assert_eq!(config.backup.max_snapshots, Some(20));
        assert_eq!(
            config.backup.retention,
            RetentionConfig {
                daily: 3,
                weekly: 2,
                monthly: 1
            }
        );
        assert!(config.backup.snapshot_on_shutdown);
        assert_eq!(config.backup.restore_mode, RestoreMode::Atomic);
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = VaultConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.backup.retention.daily, 7);
    }

    #[test]
    fn test_from_lookup_invalid_integer() {
        let result = VaultConfig::from_lookup(lookup_from(&[(
            env_keys::BACKUP_KEEP_DAILY,
            "seven",
        )]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                key: env_keys::BACKUP_KEEP_DAILY,
                value: "seven".to_string()
            }
        );
    }

    #[test]
    fn test_from_lookup_invalid_restore_mode() {
        let result =
            VaultConfig::from_lookup(lookup_from(&[(env_keys::BACKUP_RESTORE_MODE, "partial")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = VaultConfig::default().with_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let result =
            VaultConfig::from_lookup(lookup_from(&[(env_keys::BACKUP_INTERVAL_HOURS, "0")]));
        assert_eq!(result.unwrap_err(), ConfigError::ZeroInterval);
    }

    #[test]
    fn test_validate_zero_daily() {
        let config = VaultConfig::default().with_retention(RetentionConfig {
            daily: 0,
            weekly: 4,
            monthly: 12,
        });
        assert_eq!(config.validate(), Err(ConfigError::ZeroDailyRetention));
    }

    #[test]
    fn test_validate_zero_max() {
        let config = VaultConfig::default().with_max_snapshots(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxSnapshots));
    }

    #[test]
    fn test_for_testing() {
        let config = VaultConfig::for_testing("/tmp/t");
        assert!(!config.backup.enabled);
        assert!(config.verify_writes);
    }
}
