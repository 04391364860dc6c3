//! On-disk cache of reusable remote sessions.
//!
//! Each cached session is one JSON record named `session_{fingerprint}.json`
//! inside the store directory. The fingerprint is derived from the
//! (platform, app id, device id, server URL) tuple, so each combination has at
//! most one record.
//!
//! Reads fail open: a missing, unreadable, corrupt or stale record is a cache
//! miss, never an error. Writes go to a temporary file in the same directory
//! and are renamed into place, so readers never see a partially written
//! record. Two processes saving the same fingerprint at once still race; the
//! last rename wins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::platform::Platform;

/// Records older than this are stale.
pub const SESSION_TTL_SECS: i64 = 300;

const RECORD_PREFIX: &str = "session_";
const RECORD_SUFFIX: &str = ".json";

/// Computes the cache fingerprint for a session slot.
///
/// The first 12 hex characters of SHA-256 over
/// `"{platform}:{app_id}:{device_id}:{server_url}"`.
pub fn fingerprint(platform: Platform, app_id: &str, device_id: &str, server_url: &str) -> String {
    let key = format!("{platform}:{app_id}:{device_id}:{server_url}");
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// A cached remote session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub platform: Platform,
    pub app_id: String,
    pub device_id: String,
    pub server_url: String,
    pub last_touched: DateTime<Utc>,
}

impl SessionDescriptor {
    /// The fingerprint of the slot this record belongs to.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.platform, &self.app_id, &self.device_id, &self.server_url)
    }

    /// True when the record was last touched more than `ttl` before `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_touched > ttl
    }
}

/// Directory-backed session cache.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record for `fingerprint`.
    pub fn record_path(&self, fingerprint: &str) -> PathBuf {
        self.dir
            .join(format!("{RECORD_PREFIX}{fingerprint}{RECORD_SUFFIX}"))
    }

    /// Loads a fresh record, evicting it if stale.
    pub fn load(&self, fingerprint: &str) -> Option<SessionDescriptor> {
        self.load_at(fingerprint, Utc::now())
    }

    /// [`load`](Self::load) with an explicit clock.
    pub fn load_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<SessionDescriptor> {
        let path = self.record_path(fingerprint);
        let descriptor = read_record(&path)?;
        if descriptor.is_stale_at(now, Duration::seconds(SESSION_TTL_SECS)) {
            debug!(%fingerprint, "cached session is stale");
            self.remove(fingerprint);
            return None;
        }
        Some(descriptor)
    }

    /// Writes (or replaces) a record.
    pub fn save(&self, descriptor: &SessionDescriptor) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let fingerprint = descriptor.fingerprint();
        let json = serde_json::to_string_pretty(descriptor)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let tmp = self
            .dir
            .join(format!(".{RECORD_PREFIX}{fingerprint}.{}.tmp", std::process::id()));
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, self.record_path(&fingerprint)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    /// Refreshes the timestamp of an existing record.
    ///
    /// Returns false when there is no fresh record to touch.
    pub fn touch(&self, fingerprint: &str) -> bool {
        self.touch_at(fingerprint, Utc::now())
    }

    pub fn touch_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let Some(mut descriptor) = self.load_at(fingerprint, now) else {
            return false;
        };
        descriptor.last_touched = now;
        match self.save(&descriptor) {
            Ok(()) => true,
            Err(e) => {
                warn!(%fingerprint, error = %e, "failed to refresh cached session");
                false
            }
        }
    }

    /// Deletes one record. Missing records are ignored.
    pub fn remove(&self, fingerprint: &str) {
        let path = self.record_path(fingerprint);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove cached session");
            }
        }
    }

    /// Every readable record in the store, stale or not.
    pub fn list(&self) -> Vec<SessionDescriptor> {
        self.record_paths()
            .iter()
            .filter_map(|path| read_record(path))
            .collect()
    }

    /// Deletes every record file, readable or not. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        self.record_paths()
            .into_iter()
            .filter(|path| std::fs::remove_file(path).is_ok())
            .count()
    }

    fn record_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(RECORD_PREFIX) && n.ends_with(RECORD_SUFFIX))
            })
            .collect();
        paths.sort();
        paths
    }
}

fn read_record(path: &Path) -> Option<SessionDescriptor> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring unreadable session record");
            None
        }
    }
}
