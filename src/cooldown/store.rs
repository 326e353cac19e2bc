//! Durable key → expiry map gating notifications.
//!
//! Entries are evicted lazily: an expired entry is treated as absent and
//! dropped when its key is next looked up, or by [`CooldownStore::compact`].
//! The file format is a flat JSON object `{"SYMBOL|signal": "<RFC3339>"}`.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::common::fs::write_atomic;
use crate::models::signal::CooldownKey;

#[derive(Debug, Error)]
pub enum CooldownError {
    /// The persisted file exists but cannot be parsed.
    #[error("cooldown file {path} is corrupt: {reason}")]
    PersistenceCorrupt { path: String, reason: String },

    #[error("cooldown file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cooldown serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct CooldownStore {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    save_lock: Mutex<()>,
}

impl CooldownStore {
    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Load from `path`. A missing or unreadable file yields an empty store;
    /// this never fails.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path).await {
            Ok(Some(entries)) => {
                info!(path = %path.display(), count = entries.len(), "Cooldown store loaded");
                entries
            }
            Ok(None) => {
                info!(path = %path.display(), "No cooldown file, starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cooldown file unusable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
            save_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True iff a live entry exists, i.e. `now < expires_at`.
    pub async fn is_suppressed(&self, key: &CooldownKey, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().await;
        live_expiry(&mut entries, &key.to_string(), now).is_some()
    }

    /// Expiry of the live entry for `key`, if any.
    pub async fn expires_at(&self, key: &CooldownKey, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut entries = self.entries.lock().await;
        live_expiry(&mut entries, &key.to_string(), now)
    }

    /// Upsert `expires_at = now + duration`.
    pub async fn record(&self, key: &CooldownKey, duration: Duration, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), expiry_after(now, duration));
    }

    /// Atomic check-then-set. Returns `true` and records the entry when no
    /// live entry existed; returns `false` (leaving the entry untouched) when
    /// the key is suppressed.
    pub async fn try_acquire(&self, key: &CooldownKey, duration: Duration, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().await;
        let id = key.to_string();
        if let Some(expiry) = live_expiry(&mut entries, &id, now) {
            debug!(key = %id, expires_at = %expiry, "Cooldown active");
            return false;
        }
        entries.insert(id, expiry_after(now, duration));
        true
    }

    /// Remove expired entries. Returns how many were dropped.
    pub async fn compact(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, expiry| now < *expiry);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Persist atomically (temp file + rename). No-op for in-memory stores.
    pub async fn save(&self) -> Result<(), CooldownError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().await;
        let snapshot: BTreeMap<String, DateTime<Utc>> = {
            let entries = self.entries.lock().await;
            entries.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(path, &bytes).await?;

        debug!(path = %path.display(), count = snapshot.len(), "Cooldown store saved");
        Ok(())
    }
}

/// Entries never outlive this, so expiries stay within RFC3339 range.
const MAX_ENTRY_LIFETIME_DAYS: i64 = 10 * 365;

/// `now + duration` with the duration capped at [`MAX_ENTRY_LIFETIME_DAYS`].
fn expiry_after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    let capped = Duration::try_days(MAX_ENTRY_LIFETIME_DAYS)
        .map_or(duration, |max| duration.min(max));
    now.checked_add_signed(capped).unwrap_or(now)
}

fn live_expiry(
    entries: &mut HashMap<String, DateTime<Utc>>,
    id: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match entries.get(id).copied() {
        Some(expiry) if now < expiry => Some(expiry),
        Some(_) => {
            entries.remove(id);
            None
        }
        None => None,
    }
}

async fn read_entries(path: &Path) -> Result<Option<HashMap<String, DateTime<Utc>>>, CooldownError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CooldownError::PersistenceCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
