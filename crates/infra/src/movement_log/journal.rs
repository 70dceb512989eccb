//! File-backed movement log: an append-only JSON-lines journal.
//!
//! One line per committed movement. A line is written and `sync_data`'d before the
//! movement becomes visible, so the journal write is the single persistence boundary.
//! On open the journal is replayed into an in-memory index; a trailing line without a
//! newline (crash mid-write) is truncated away.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{Sku, StockMovement};

use super::in_memory::InMemoryMovementStore;
use super::r#trait::{MovementStore, MovementStoreError};

#[derive(Debug)]
struct JournalFile {
    file: File,
    /// Length of the journal up to the last complete line.
    len: u64,
}

#[derive(Debug)]
pub struct JournalMovementStore {
    path: PathBuf,
    journal: Mutex<JournalFile>,
    index: InMemoryMovementStore,
}

impl JournalMovementStore {
    /// Open (or create) a journal and load every movement it holds.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MovementStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let index = InMemoryMovementStore::new();
        let mut offset = 0usize;
        let mut line_no = 0usize;

        while offset < bytes.len() {
            line_no += 1;
            let rest = &bytes[offset..];

            let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
                warn!(
                    path = %path.display(),
                    line = line_no,
                    torn_bytes = rest.len(),
                    "truncating torn trailing journal line"
                );
                file.set_len(offset as u64)?;
                file.sync_data()?;
                break;
            };

            let line = &rest[..newline];
            if !line.iter().all(u8::is_ascii_whitespace) {
                let movement: StockMovement =
                    serde_json::from_slice(line).map_err(|e| MovementStoreError::Corrupt {
                        line: line_no,
                        reason: e.to_string(),
                    })?;
                index
                    .restore(movement)
                    .map_err(|e| MovementStoreError::Corrupt {
                        line: line_no,
                        reason: e.to_string(),
                    })?;
            }
            offset += newline + 1;
        }

        let len = offset as u64;
        info!(
            path = %path.display(),
            movements = index.head_position()?,
            "movement journal opened"
        );

        Ok(Self {
            path,
            journal: Mutex::new(JournalFile { file, len }),
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MovementStore for JournalMovementStore {
    fn append(
        &self,
        movement: StockMovement,
        expected_version: ExpectedVersion,
    ) -> Result<StockMovement, MovementStoreError> {
        let mut journal = self.journal.lock().map_err(|_| MovementStoreError::Poisoned)?;

        self.index.append_with(movement, expected_version, |stored| {
            let mut line = serde_json::to_vec(stored).map_err(|e| {
                MovementStoreError::InvalidAppend(format!("movement serialization failed: {e}"))
            })?;
            line.push(b'\n');

            let written = journal
                .file
                .write_all(&line)
                .and_then(|()| journal.file.sync_data());

            if let Err(e) = written {
                // Drop any partial line so the next append starts on a clean boundary.
                let len = journal.len;
                if let Err(truncate) = journal.file.set_len(len) {
                    warn!(error = %truncate, "failed to roll back partial journal write");
                }
                return Err(e.into());
            }

            journal.len += line.len() as u64;
            Ok(())
        })
    }

    fn load_stream(&self, sku: &Sku) -> Result<Vec<StockMovement>, MovementStoreError> {
        self.index.load_stream(sku)
    }

    fn read_from(
        &self,
        after_position: u64,
        limit: usize,
    ) -> Result<Vec<StockMovement>, MovementStoreError> {
        self.index.read_from(after_position, limit)
    }

    fn head_position(&self) -> Result<u64, MovementStoreError> {
        self.index.head_position()
    }
}
