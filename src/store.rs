use crate::models::file::Records;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Full-document access to the file records. Failures never reach the
/// caller: a broken read yields an empty map and a broken write is logged.
pub trait RecordStore: Send + Sync {
    fn load(&self) -> Records;
    fn save(&self, records: &Records);
}

/// Records kept as one pretty-printed JSON document on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(JsonFileStore { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, records: &Records) -> anyhow::Result<()> {
        let body = serde_json::to_vec_pretty(records)?;
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Records {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Records::new(),
            Err(e) => {
                log::error!("store read failed path={} err={e}", self.path.display());
                return Records::new();
            }
        };
        if contents.trim().is_empty() {
            return Records::new();
        }
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            log::error!("store document is corrupt path={} err={e}", self.path.display());
            Records::new()
        })
    }

    fn save(&self, records: &Records) {
        if let Err(e) = self.write_document(records) {
            log::error!("store write failed path={} err={e:?}", self.path.display());
        }
    }
}
