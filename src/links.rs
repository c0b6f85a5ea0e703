use crate::clock::Clock;
use crate::errors::ApiError;
use crate::models::file::{link_status, FileRecord, LinkStatus};
use crate::store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sanitize_filename::sanitize;
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireUnit {
    Unlimited,
    Minutes,
    Hours,
    Days,
}

impl FromStr for ExpireUnit {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unlimited" => Ok(ExpireUnit::Unlimited),
            "minutes" => Ok(ExpireUnit::Minutes),
            "hours" => Ok(ExpireUnit::Hours),
            "days" => Ok(ExpireUnit::Days),
            other => Err(ApiError::BadRequest(format!("unknown expiration unit '{other}'"))),
        }
    }
}

/// Lifetime and download limit chosen at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub lifetime: Option<Duration>,
    pub max_downloads: Option<u32>,
}

/// Raw form values as they arrived in the upload request.
#[derive(Debug, Default, Clone)]
pub struct PolicyFields {
    pub expire_value: Option<String>,
    pub expire_unit: Option<String>,
    pub max_downloads_option: Option<String>,
    pub max_downloads: Option<String>,
}

/// Reads the leading integer of a form value, so "10abc" is 10. Missing,
/// non-numeric and non-positive values fall back to 1; values past `i64`
/// saturate.
fn positive_or_one(raw: Option<&str>) -> i64 {
    let Some(v) = raw.map(str::trim_start) else {
        return 1;
    };
    let (negative, digits) = match v.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, v.strip_prefix('+').unwrap_or(v)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) if !negative && n > 0 => n,
        Err(e) if !negative && *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
        _ => 1,
    }
}

impl UploadPolicy {
    pub fn from_fields(fields: &PolicyFields) -> Result<Self, ApiError> {
        let unit = match fields.expire_unit.as_deref() {
            None => ExpireUnit::Unlimited,
            Some(raw) => raw.parse()?,
        };
        let value = positive_or_one(fields.expire_value.as_deref());
        let lifetime = match unit {
            ExpireUnit::Unlimited => None,
            ExpireUnit::Minutes => Some(Duration::try_minutes(value)),
            ExpireUnit::Hours => Some(Duration::try_hours(value)),
            ExpireUnit::Days => Some(Duration::try_days(value)),
        }
        .map(|d| d.ok_or_else(|| ApiError::BadRequest("expiration is too far away".into())))
        .transpose()?;

        // Either field set to "unlimited" wins; only `max_downloads` carries a number.
        let unlimited = [&fields.max_downloads_option, &fields.max_downloads]
            .iter()
            .any(|f| f.as_deref().map(str::trim) == Some("unlimited"));
        let max_downloads = if unlimited {
            None
        } else {
            let n = positive_or_one(fields.max_downloads.as_deref());
            Some(u32::try_from(n).unwrap_or(u32::MAX))
        };

        Ok(UploadPolicy {
            lifetime,
            max_downloads,
        })
    }

    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ApiError> {
        self.lifetime
            .map(|d| {
                now.checked_add_signed(d)
                    .ok_or_else(|| ApiError::BadRequest("expiration is too far away".into()))
            })
            .transpose()
    }
}

/// Random hex name plus the original extension, when it has a plain one.
pub fn new_storage_name(original_name: &str, name_bytes: usize) -> String {
    let mut bytes = vec![0u8; name_bytes.max(1)];
    rand::thread_rng().fill_bytes(&mut bytes);
    let safe = sanitize(original_name);
    let ext = Path::new(&safe)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{}{}", hex::encode(bytes), ext)
}

pub struct NewUpload {
    pub storage_name: String,
    pub original_name: String,
    pub mime_type: String,
}

pub struct FileRow {
    pub record: FileRecord,
    pub status: LinkStatus,
}

pub struct Overview {
    pub total_files: usize,
    pub total_downloads: u64,
    pub active_links: usize,
    pub rows: Vec<FileRow>,
}

/// Every read-modify-write of the record store goes through here. The mutex
/// serializes those sequences within this process; separate processes sharing
/// one store document can still overwrite each other.
pub struct Links {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    uploads_dir: PathBuf,
    name_bytes: usize,
    guard: Mutex<()>,
}

impl Links {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        uploads_dir: impl Into<PathBuf>,
        name_bytes: usize,
    ) -> Self {
        Links {
            store,
            clock,
            uploads_dir: uploads_dir.into(),
            name_bytes,
            guard: Mutex::new(()),
        }
    }

    fn critical(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn storage_name_for(&self, original_name: &str) -> String {
        new_storage_name(original_name, self.name_bytes)
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn storage_path(&self, storage_name: &str) -> PathBuf {
        self.uploads_dir.join(storage_name)
    }

    pub fn file_count(&self) -> usize {
        self.store.load().len()
    }

    /// Records an upload whose bytes are already at `storage_path`.
    pub fn register(&self, upload: NewUpload, policy: &UploadPolicy) -> Result<FileRecord, ApiError> {
        let now = self.clock.now();
        let record = FileRecord {
            storage_path: self.storage_path(&upload.storage_name),
            storage_name: upload.storage_name,
            original_name: upload.original_name,
            mime_type: upload.mime_type,
            uploaded_at: now,
            expires_at: policy.expires_at(now)?,
            max_downloads: policy.max_downloads,
            download_count: 0,
        };

        let _g = self.critical();
        let mut records = self.store.load();
        records.insert(record.storage_name.clone(), record.clone());
        self.store.save(&records);
        Ok(record)
    }

    /// Charges one download against the link and returns the updated record.
    /// Links past their lifetime or limit are deleted on the spot.
    pub fn resolve(&self, storage_name: &str) -> Result<FileRecord, ApiError> {
        let _g = self.critical();
        let mut records = self.store.load();
        let record = match records.get_mut(storage_name) {
            Some(r) if r.storage_path.exists() => r,
            _ => return Err(ApiError::NotFound),
        };

        let status = link_status(self.clock.now(), record);
        if status != LinkStatus::Active {
            remove_file_logged(&record.storage_path);
            records.remove(storage_name);
            self.store.save(&records);
            log::info!("lazy delete storage_name={storage_name} status={status:?}");
            return Err(ApiError::LinkUnavailable(status));
        }

        record.download_count = record.download_count.saturating_add(1);
        let served = record.clone();
        self.store.save(&records);
        Ok(served)
    }

    /// Read-only listing; never triggers lazy deletion.
    pub fn overview(&self) -> Overview {
        let now = self.clock.now();
        let mut rows: Vec<FileRow> = self
            .store
            .load()
            .into_values()
            .map(|record| FileRow {
                status: link_status(now, &record),
                record,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .uploaded_at
                .cmp(&a.record.uploaded_at)
                .then_with(|| a.record.storage_name.cmp(&b.record.storage_name))
        });

        Overview {
            total_files: rows.len(),
            total_downloads: rows.iter().map(|r| u64::from(r.record.download_count)).sum(),
            active_links: rows.iter().filter(|r| r.status == LinkStatus::Active).count(),
            rows,
        }
    }

    /// Idempotent; returns whether a record was present.
    pub fn delete(&self, storage_name: &str) -> bool {
        let _g = self.critical();
        let mut records = self.store.load();
        let removed = records.remove(storage_name);
        if let Some(record) = &removed {
            remove_file_logged(&record.storage_path);
            self.store.save(&records);
        }
        removed.is_some()
    }
}

pub fn remove_file_logged(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::error!("failed to delete file path={} err={e}", path.display());
    }
}
