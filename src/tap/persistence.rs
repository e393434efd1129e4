use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{TreasuryError, internal_error},
    tap::types::TapLedgerSnapshot,
};

const PERSISTENCE_VERSION: u64 = 1;

/// Durable asset-record table. Writes go to a temp file that is synced and
/// renamed over the previous state.
#[derive(Debug, Clone)]
pub struct TapPersistence {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedTapState {
    version: u64,
    checksum: String,
    ledger: TapLedgerSnapshot,
}

impl TapPersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<TapLedgerSnapshot>, TreasuryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(internal_error(format!(
                    "failed to read tap state '{}': {err}",
                    self.path.display()
                )));
            }
        };

        let parsed: PersistedTapState = serde_json::from_str(&content).map_err(|err| {
            internal_error(format!(
                "failed to parse tap state '{}': {err}",
                self.path.display()
            ))
        })?;
        if parsed.version != PERSISTENCE_VERSION {
            return Err(internal_error(format!(
                "unsupported tap state version {} at '{}'",
                parsed.version,
                self.path.display()
            )));
        }

        let expected = snapshot_checksum(&parsed.ledger)?;
        if parsed.checksum != expected {
            return Err(internal_error(format!(
                "tap state checksum mismatch at '{}'",
                self.path.display()
            )));
        }

        Ok(Some(parsed.ledger))
    }

    pub fn save(&self, snapshot: &TapLedgerSnapshot) -> Result<(), TreasuryError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|err| {
            internal_error(format!(
                "failed to create tap state directory '{}': {err}",
                parent.display()
            ))
        })?;

        let persisted = PersistedTapState {
            version: PERSISTENCE_VERSION,
            checksum: snapshot_checksum(snapshot)?,
            ledger: snapshot.clone(),
        };

        let tmp_path = self.path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|err| {
            internal_error(format!(
                "failed to create tap state temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;
        {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &persisted).map_err(|err| {
                internal_error(format!(
                    "failed to serialize tap state '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.write_all(b"\n").map_err(|err| {
                internal_error(format!(
                    "failed to finalize tap state '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            let file = writer.into_inner().map_err(|err| {
                internal_error(format!(
                    "failed to flush tap state '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            file.sync_all().map_err(|err| {
                internal_error(format!(
                    "failed to sync tap state temp file '{}': {err}",
                    tmp_path.display()
                ))
            })?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            internal_error(format!(
                "failed to replace tap state '{}' from '{}': {err}",
                self.path.display(),
                tmp_path.display()
            ))
        })?;

        if let Ok(parent_file) = fs::File::open(&parent) {
            let _ = parent_file.sync_all();
        }

        Ok(())
    }
}

fn snapshot_checksum(snapshot: &TapLedgerSnapshot) -> Result<String, TreasuryError> {
    let canonical = serde_json::to_vec(snapshot)
        .map_err(|err| internal_error(format!("failed to encode tap snapshot: {err}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}
