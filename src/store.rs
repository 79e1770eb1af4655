/*
 * aurboost - AUR helper for Arch Linux built around pacman.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Local record store of AUR packages installed through aurboost.
//!
//! The whole file is read on open and rewritten on drop. One record per line,
//! `name`, `version` and `source_url` joined by the byte 0x01. An exclusive
//! advisory lock is held for the lifetime of the store, so a second instance
//! fails to open instead of racing on the final rewrite.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{AurError, Result};
use crate::package::PackageRecord;

/// Field separator, never present in package metadata
pub const FIELD_DELIMITER: char = '\u{1}';

/// Lines at or below this length are treated as corrupt
const MIN_RECORD_LEN: usize = 5;

/// Serialize the persisted fields of a record into one line (without newline).
///
/// Returns `None` for records that cannot be represented.
pub fn encode_record(record: &PackageRecord) -> Option<String> {
    let fields = [&record.name, &record.version, &record.source_url];
    if record.name.is_empty() || fields.iter().any(|f| f.contains(FIELD_DELIMITER) || f.contains('\n')) {
        return None;
    }
    let line = format!(
        "{}{d}{}{d}{}",
        record.name,
        record.version,
        record.source_url,
        d = FIELD_DELIMITER
    );
    if line.len() <= MIN_RECORD_LEN {
        return None;
    }
    Some(line)
}

/// Parse one line of the store file
pub fn decode_record(line: &str) -> Option<PackageRecord> {
    if line.len() <= MIN_RECORD_LEN {
        return None;
    }
    let mut parts = line.splitn(3, FIELD_DELIMITER);
    let name = parts.next()?;
    let version = parts.next()?;
    let source_url = parts.next()?;
    if name.is_empty() {
        return None;
    }
    Some(PackageRecord::new(name, version, source_url))
}

/// Record store backed by a single locked file
pub struct PackageStore {
    path: PathBuf,
    file: File,
    records: Vec<PackageRecord>,
}

impl PackageStore {
    /// Open the store, creating the file (and its directory) if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AurError::storage(&path, "cannot create store directory", e))?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| AurError::storage(&path, "cannot open record store", e))?;

        lock_exclusive(&file).map_err(|e| AurError::storage(&path, "record store is in use by another aurboost process", e))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| AurError::storage(&path, "cannot read record store", e))?;

        let records: Vec<PackageRecord> = content.lines().filter_map(decode_record).collect();
        tracing::debug!("loaded {} records from {}", records.len(), path.display());

        let mut store = Self {
            path,
            file,
            records: Vec::with_capacity(records.len()),
        };
        // Collapse duplicate names left by hand edits, last one wins
        for record in records {
            store.upsert(record);
        }
        Ok(store)
    }

    /// Index of the record with this exact name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.find(name).map(|i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Overwrite the record with the same name in place, or append
    pub fn upsert(&mut self, record: PackageRecord) {
        let record = record.persisted();
        match self.find(&record.name) {
            Some(i) => self.records[i] = record,
            None => self.records.push(record),
        }
    }

    /// Remove a record; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        match self.find(name) {
            Some(i) => {
                self.records.remove(i);
                true
            }
            None => false,
        }
    }

    /// All records in insertion order
    pub fn all_records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole file from the in-memory set.
    ///
    /// Records that fail to encode are dropped without error.
    pub fn flush(&mut self) -> Result<()> {
        let mut out = String::new();
        for record in &self.records {
            match encode_record(record) {
                Some(line) => {
                    out.push_str(&line);
                    out.push('\n');
                }
                None => tracing::debug!("dropping corrupt record {:?}", record.name),
            }
        }

        let path = self.path.clone();
        let write = |file: &mut File| -> std::io::Result<()> {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(out.as_bytes())?;
            file.sync_data()
        };
        write(&mut self.file).map_err(|e| AurError::storage(path, "cannot write record store", e))
    }
}

impl Drop for PackageStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!("{}", e);
        }
    }
}

fn lock_exclusive(file: &File) -> std::io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and stays open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
