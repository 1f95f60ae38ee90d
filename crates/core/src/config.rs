use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub tracker: TrackerConfig,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `METER_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("METER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
            tracker: TrackerConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject combinations that break cross-instance exclusivity.
    ///
    /// The processing lock must outlive the slowest grant, which is bounded
    /// by the signaling API timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lock_ttl = self.queue.lock_ttl();
        let timeout = self.notify.timeout();
        if lock_ttl <= timeout {
            return Err(ConfigError::LockShorterThanGrant {
                lock_ttl_ms: self.queue.lock_ttl_ms,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:     {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  store:      backend={}, namespace={}",
            self.store.backend,
            self.store.namespace
        );
        tracing::info!(
            "  tracker:    idle_ttl={}s, pending_ttl={}ms",
            self.tracker.idle_ttl_secs,
            self.tracker.pending_ttl_ms
        );
        tracing::info!(
            "  queue:      meta_ttl={}s, grace={}s, lock_ttl={}ms, lock_retries={}, max_orphan_skips={}",
            self.queue.meta_ttl_secs,
            self.queue.update_grace_secs,
            self.queue.lock_ttl_ms,
            self.queue.lock_retry_count,
            self.queue.max_orphan_skips
        );
        tracing::info!(
            "  scheduler:  assign_every={}ms, update_every={}ms",
            self.scheduler.assign_interval_ms,
            self.scheduler.update_interval_ms
        );
        tracing::info!(
            "  notify:     signal_token={}, recorder_token={}, timeout={}s",
            if self.notify.signal_api_token.is_some() { "set" } else { "(none)" },
            if self.notify.recorder_token.is_some() { "set" } else { "(none)" },
            self.notify.timeout_secs
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3000),
        }
    }
}

// ── Shared store ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "redis"
    pub backend: String,
    pub redis_url: String,
    /// Prefix for every key the service writes.
    pub namespace: String,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "STORE_BACKEND", "memory").to_lowercase(),
            redis_url: profiled_env_or(p, "REDIS_URL", "redis://127.0.0.1:6379"),
            namespace: profiled_env_or(p, "KEY_NAMESPACE", "recorder"),
        }
    }
}

// ── Recorder pool ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub idle_ttl_secs: u64,
    pub pending_ttl_ms: u64,
}

impl TrackerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            idle_ttl_secs: profiled_env_u64(p, "IDLE_TTL_SECS", 90),
            pending_ttl_ms: profiled_env_u64(p, "PENDING_TTL_MS", 10_000),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_ttl_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 90,
            pending_ttl_ms: 10_000,
        }
    }
}

// ── Request queue ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub meta_ttl_secs: u64,
    pub update_grace_secs: u64,
    pub lock_ttl_ms: u64,
    pub lock_retry_count: u32,
    pub lock_retry_delay_ms: u64,
    pub lock_retry_jitter_ms: u64,
    /// Consecutive skips of an orphaned head before it is evicted (0 = never).
    pub max_orphan_skips: u32,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            meta_ttl_secs: profiled_env_u64(p, "REQUEST_META_TTL_SECS", 86_400),
            update_grace_secs: profiled_env_u64(p, "UPDATE_GRACE_SECS", 2),
            lock_ttl_ms: profiled_env_u64(p, "PROCESSING_LOCK_TTL_MS", 15_000),
            lock_retry_count: profiled_env_u32(p, "LOCK_RETRY_COUNT", 3),
            lock_retry_delay_ms: profiled_env_u64(p, "LOCK_RETRY_DELAY_MS", 200),
            lock_retry_jitter_ms: profiled_env_u64(p, "LOCK_RETRY_JITTER_MS", 200),
            max_orphan_skips: profiled_env_u32(p, "MAX_ORPHAN_SKIPS", 5),
        }
    }

    pub fn meta_ttl(&self) -> Duration {
        Duration::from_secs(self.meta_ttl_secs)
    }

    pub fn update_grace(&self) -> Duration {
        Duration::from_secs(self.update_grace_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            meta_ttl_secs: 86_400,
            update_grace_secs: 2,
            lock_ttl_ms: 15_000,
            lock_retry_count: 3,
            lock_retry_delay_ms: 200,
            lock_retry_jitter_ms: 200,
            max_orphan_skips: 5,
        }
    }
}

// ── Loops ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub assign_interval_ms: u64,
    pub update_interval_ms: u64,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            assign_interval_ms: profiled_env_u64(p, "ASSIGN_INTERVAL_MS", 1_000),
            update_interval_ms: profiled_env_u64(p, "UPDATE_INTERVAL_MS", 3_000),
        }
    }

    pub fn assign_interval(&self) -> Duration {
        Duration::from_millis(self.assign_interval_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assign_interval_ms: 1_000,
            update_interval_ms: 3_000,
        }
    }
}

// ── Signaling API ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Bearer token for calls to the signaling API.
    pub signal_api_token: Option<String>,
    /// Credential handed to a requester whose request was granted.
    pub recorder_token: Option<String>,
    pub timeout_secs: u64,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            signal_api_token: profiled_env_opt(p, "SIGNAL_API_TOKEN"),
            recorder_token: profiled_env_opt(p, "RECORDER_TOKEN"),
            timeout_secs: profiled_env_u64(p, "SIGNAL_API_TIMEOUT_SECS", 10),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            signal_api_token: None,
            recorder_token: None,
            timeout_secs: 10,
        }
    }
}
