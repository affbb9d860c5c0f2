use crate::error::{Result, RuleError};
use crate::types::RuleVersion;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Content-hashed ruleset snapshot store.
///
/// Each source owns the subtree `{base}/prom_{id}/`; with history enabled
/// every accepted ruleset lands as a timestamped file under `history/`,
/// otherwise `current.yml` is overwritten in place. The reconciler
/// guarantees a single writer per source, so no cross-process locking is
/// needed here.
pub struct RuleArchive {
    base_dir: PathBuf,
    retention_days: u32,
    enable_history: bool,
}

impl RuleArchive {
    /// Create the archive, ensuring the base directory exists. This is the
    /// one archive failure that is fatal at startup.
    pub fn new(base_dir: impl Into<PathBuf>, retention_days: u32, enable_history: bool) -> Result<Self> {
        let base_dir = base_dir.into();
        create_dir_0755(&base_dir)?;

        Ok(Self {
            base_dir,
            retention_days,
            enable_history,
        })
    }

    /// Persist one ruleset snapshot and return its path. Directories are
    /// created with mode 0755 and the snapshot with mode 0644.
    pub fn save(&self, prom_id: i64, content: &[u8]) -> Result<PathBuf> {
        let hash = content_hash(content);
        let prom_dir = self.base_dir.join(format!("prom_{prom_id}"));
        create_dir_0755(&prom_dir)?;

        let path = if self.enable_history {
            let history_dir = self.history_dir(prom_id);
            create_dir_0755(&history_dir)?;
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            history_dir.join(format!("rule_{timestamp}.yml"))
        } else {
            self.current_path(prom_id)
        };

        write_file_0644(&path, content)?;

        tracing::info!(prom_id, path = %path.display(), hash = %hash, "Rule snapshot saved");
        Ok(path)
    }

    /// Path of the non-history snapshot for a source. Does not touch disk.
    pub fn current_path(&self, prom_id: i64) -> PathBuf {
        self.base_dir.join(format!("prom_{prom_id}")).join("current.yml")
    }

    /// List archived snapshots for a source, newest first. `limit == 0`
    /// returns all versions. A source with no history yet yields an empty
    /// list; history being disabled is an error.
    pub fn list_versions(&self, prom_id: i64, limit: usize) -> Result<Vec<RuleVersion>> {
        if !self.enable_history {
            return Err(RuleError::HistoryDisabled);
        }

        let history_dir = self.history_dir(prom_id);
        let entries = match std::fs::read_dir(&history_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            files.push((entry.path(), modified));
        }

        files.sort_by(|a, b| b.1.cmp(&a.1));
        if limit > 0 {
            files.truncate(limit);
        }

        let mut versions: Vec<RuleVersion> = Vec::with_capacity(files.len());
        for (path, modified) in files {
            // unreadable files are skipped without gapping the ordinals
            let Ok(content) = std::fs::read(&path) else {
                continue;
            };
            let version = versions.len() as i64 + 1;
            versions.push(RuleVersion {
                version,
                prom_id,
                created_at: DateTime::<Utc>::from(modified),
                file_path: path,
                hash: content_hash(&content),
            });
        }

        Ok(versions)
    }

    /// Delete history files older than the retention window across all
    /// sources. Per-file failures are logged and do not abort the sweep;
    /// returns the number of files removed.
    pub fn cleanup_old_versions(&self) -> Result<usize> {
        if !self.enable_history {
            return Ok(0);
        }

        let cutoff = SystemTime::now() - Duration::from_secs(u64::from(self.retention_days) * 86_400);
        let mut deleted = 0usize;

        for prom_dir in std::fs::read_dir(&self.base_dir)?.flatten() {
            if !prom_dir.path().is_dir() {
                continue;
            }

            let history_dir = prom_dir.path().join("history");
            let entries = match std::fs::read_dir(&history_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::error!(dir = %history_dir.display(), error = %e, "Failed to read history directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if metadata.is_dir() {
                    continue;
                }
                let Ok(modified) = metadata.modified() else {
                    continue;
                };

                if modified < cutoff {
                    let path = entry.path();
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::error!(path = %path.display(), error = %e, "Failed to remove old rule version");
                        continue;
                    }
                    deleted += 1;
                }
            }
        }

        if deleted > 0 {
            tracing::info!(
                deleted,
                retention_days = self.retention_days,
                "Cleaned up old rule versions"
            );
        }

        Ok(deleted)
    }

    fn history_dir(&self, prom_id: i64) -> PathBuf {
        self.base_dir.join(format!("prom_{prom_id}")).join("history")
    }
}

fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// `mkdir -p` with an explicit 0755, independent of the process umask.
fn create_dir_0755(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Write a snapshot file with mode 0644, independent of the process umask.
#[cfg(unix)]
fn write_file_0644(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)?;
    file.write_all(content)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_file_0644(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}
