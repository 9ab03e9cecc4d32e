//! JSONL persistence: one request document per line.
//!
//! The portable snapshot format. Writes go through a temp file and an
//! atomic rename so a crash mid-write never leaves a truncated snapshot.

use hemolink_core::{RequestId, UrgentRequest};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::store::{RequestStore, StoreError};

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted snapshot: {0}")]
    Corrupt(String),
}

/// Read request documents from a JSONL reader.
pub fn read_requests(reader: impl BufRead) -> Result<Vec<UrgentRequest>, JsonlError> {
    let mut requests = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| JsonlError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let request: UrgentRequest = serde_json::from_str(trimmed)
            .map_err(|e| JsonlError::Parse(line_no + 1, e.to_string()))?;
        requests.push(request);
    }
    Ok(requests)
}

/// Write request documents to a JSONL writer.
pub fn write_requests(
    writer: &mut impl Write,
    requests: &[UrgentRequest],
) -> Result<(), JsonlError> {
    for request in requests {
        let line =
            serde_json::to_string(request).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Read request documents from a JSONL file path.
pub fn read_requests_from_path(path: impl AsRef<Path>) -> Result<Vec<UrgentRequest>, JsonlError> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))?;
    validate_snapshot_bytes(path, &bytes)?;
    let reader = BufReader::new(bytes.as_slice());
    read_requests(reader)
}

/// Write request documents to a JSONL file path, replacing it atomically.
pub fn write_requests_to_path(
    path: impl AsRef<Path>,
    requests: &[UrgentRequest],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| JsonlError::Io(0, format!("{parent:?}: {e}")))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), JsonlError> {
        let file = File::create(&tmp_path)
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        write_requests(&mut writer, requests)?;
        writer
            .flush()
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let file = writer
            .into_inner()
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        JsonlError::Io(
            0,
            format!("{} -> {}: {e}", tmp_path.display(), path.display()),
        )
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent)
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", parent.display())))?;
        dir.sync_all()
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", parent.display())))?;
    }

    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_snapshot_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Durable request store backed by one JSONL snapshot file.
///
/// Each persist rewrites the full snapshot under an internal lock. The
/// ledger already serializes writes per request; this lock only orders
/// writes for *different* requests against the shared file.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_index(&self) -> Result<BTreeMap<RequestId, UrgentRequest>, JsonlError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let requests = read_requests_from_path(&self.path)?;
        let mut index = BTreeMap::new();
        for request in requests {
            // Last write wins on duplicate ids, matching overlay semantics.
            index.insert(request.id, request);
        }
        Ok(index)
    }
}

#[async_trait::async_trait]
impl RequestStore for JsonlStore {
    async fn persist(&self, request: &UrgentRequest) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_index()?;
        index.insert(request.id, request.clone());
        let requests: Vec<UrgentRequest> = index.into_values().collect();
        write_requests_to_path(&self.path, &requests)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<UrgentRequest>, StoreError> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load_index()?.into_values().collect())
    }
}
