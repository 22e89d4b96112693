use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use promptrelay_core_types::{timestamp_now, DeliveryId, SiteId};
use serde_json::to_writer_pretty;
use tracing::{debug, warn};

use crate::{PendingPayload, PendingStore, StoreDocument, StoreError};

/// JSON-file store shared by every promptrelay process on the machine.
///
/// Each mutation takes an exclusive advisory lock on the sibling `.lock` file, re-reads the
/// document, applies the change and writes a temp file that is renamed over the original.
/// Readers never see a torn file and writers in different processes never lose an update.
pub struct FilePendingStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FilePendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    /// `<data dir>/promptrelay/pending.json`.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("promptrelay").join("pending.json"))
            .ok_or(StoreError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document without taking the write lock.
    pub fn load(&self) -> Result<StoreDocument, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StoreDocument::default())
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreDocument::default());
        }

        match serde_json::from_slice::<StoreDocument>(&raw) {
            Ok(doc) => Ok(doc),
            Err(err) => {
                let backup = self.path.with_extension("json.corrupt");
                warn!(
                    target: "pending-store",
                    path = %self.path.display(),
                    backup = %backup.display(),
                    ?err,
                    "pending store unreadable; starting from an empty document"
                );
                if let Err(err) = fs::rename(&self.path, &backup) {
                    warn!(target: "pending-store", ?err, "failed to move corrupt store aside");
                }
                Ok(StoreDocument::default())
            }
        }
    }

    fn save(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(|err| StoreError::io(&tmp, err))?;
            let mut writer = BufWriter::new(file);
            to_writer_pretty(&mut writer, doc)?;
            writer.flush().map_err(|err| StoreError::io(&tmp, err))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|err| StoreError::io(&tmp, err))?;
        }
        fs::rename(&tmp, &self.path).map_err(|err| StoreError::io(&self.path, err))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Open the lock file and block until this handle holds it exclusively.
    fn lock_file(&self) -> Result<File, StoreError> {
        let path = self.lock_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| StoreError::io(&path, err))?;
        file.lock_exclusive()
            .map_err(|err| StoreError::io(&path, err))?;
        Ok(file)
    }

    /// Read-modify-write under the process mutex and the file lock. The document is only
    /// written back when `apply` reports a change.
    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreDocument) -> (T, bool),
    ) -> Result<T, StoreError> {
        let _guard = self.io_lock.lock();
        let lock = self.lock_file()?;
        let result = self.load().and_then(|mut doc| {
            let (out, changed) = apply(&mut doc);
            if changed {
                self.save(&doc)?;
                debug!(target: "pending-store", path = %self.path.display(), payloads = doc.payloads.len(), "pending store written");
            }
            Ok(out)
        });
        if let Err(err) = FileExt::unlock(&lock) {
            warn!(target: "pending-store", ?err, "failed to unlock pending store");
        }
        result
    }
}

#[async_trait]
impl PendingStore for FilePendingStore {
    async fn put(&self, payload: PendingPayload) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.put(payload);
            ((), true)
        })
    }

    async fn take(&self, site: SiteId) -> Result<Option<PendingPayload>, StoreError> {
        self.mutate(|doc| {
            let taken = doc.take(site);
            let changed = taken.is_some();
            (taken, changed)
        })
    }

    async fn remove(&self, id: &DeliveryId) -> Result<bool, StoreError> {
        self.mutate(|doc| {
            let removed = doc.remove(id);
            (removed, removed)
        })
    }

    async fn list(&self) -> Result<Vec<PendingPayload>, StoreError> {
        Ok(self.load()?.list())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        self.mutate(|doc| {
            let removed = doc.clear();
            (removed, removed > 0)
        })
    }

    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = timestamp_now();
        self.mutate(|doc| {
            doc.prune_locks(now);
            let acquired = doc.try_lock(key, owner, ttl, now);
            (acquired, true)
        })
    }

    async fn release(&self, key: &str, owner: &str) -> Result<(), StoreError> {
        self.mutate(|doc| {
            let removed = doc.release(key, owner);
            ((), removed)
        })
    }
}
