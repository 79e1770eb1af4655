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

//! The system package manager, driven through the pacman CLI.

use regex::Regex;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{AurError, Result, TransactionFailure};
use crate::package::PackageRecord;

/// Outcome of a pacman transaction
pub type TransactionResult = std::result::Result<(), TransactionFailure>;

/// Operations aurboost needs from the system package manager
pub trait PackageManager {
    /// Installed packages as (name, version)
    fn installed(&self) -> Result<Vec<(String, String)>>;

    /// Search the sync databases
    fn search(&self, pattern: &str) -> Result<Vec<PackageRecord>>;

    /// Whether a sync database carries this exact name
    fn in_sync_db(&self, name: &str) -> bool;

    /// Install built package files
    fn install_files(&self, files: &[PathBuf], as_deps: bool) -> TransactionResult;

    /// Install packages from the sync databases
    fn install_names(&self, names: &[String]) -> TransactionResult;

    fn remove(&self, names: &[String]) -> TransactionResult;

    /// Full system upgrade (`-Syu`)
    fn sys_upgrade(&self) -> TransactionResult;
}

/// pacman invoked as a subprocess, through sudo when not root
pub struct Pacman {
    use_sudo: bool,
    noconfirm: bool,
}

impl Pacman {
    pub fn new(noconfirm: bool) -> Self {
        // SAFETY: getuid has no preconditions
        let is_root = unsafe { libc::getuid() } == 0;
        Self {
            use_sudo: !is_root,
            noconfirm,
        }
    }

    fn query(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("pacman")
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        // pacman exits 1 when nothing matched
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn transaction(&self, mut args: Vec<OsString>) -> TransactionResult {
        if self.noconfirm {
            args.insert(1, "--noconfirm".into());
        }

        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("pacman");
            cmd
        } else {
            Command::new("pacman")
        };
        tracing::debug!("pacman {:?}", args);

        let mut child = cmd
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransactionFailure::Other(format!("failed to run pacman: {}", e)))?;

        // sudo and pacman prompt on stderr, so it is forwarded live while being kept for classification
        let captured = match child.stderr.take() {
            Some(pipe) => tee_stderr(pipe, io::stderr()).unwrap_or_else(|e| {
                tracing::warn!("lost pacman stderr: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let status = child
            .wait()
            .map_err(|e| TransactionFailure::Other(format!("failed to wait for pacman: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(TransactionFailure::classify(&String::from_utf8_lossy(&captured)))
        }
    }
}

impl PackageManager for Pacman {
    fn installed(&self) -> Result<Vec<(String, String)>> {
        let out = self.query(&["-Q"])?;
        Ok(parse_installed(&out))
    }

    fn search(&self, pattern: &str) -> Result<Vec<PackageRecord>> {
        let out = self.query(&["-Ss", "--", pattern])?;
        parse_search(&out)
    }

    fn in_sync_db(&self, name: &str) -> bool {
        Command::new("pacman")
            .args(["-Si", "--", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn install_files(&self, files: &[PathBuf], as_deps: bool) -> TransactionResult {
        if files.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["-U".into()];
        if as_deps {
            args.push("--asdeps".into());
        }
        args.extend(files.iter().map(|f| f.as_os_str().to_owned()));
        self.transaction(args)
    }

    fn install_names(&self, names: &[String]) -> TransactionResult {
        if names.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["-S".into(), "--needed".into()];
        args.extend(names.iter().map(OsString::from));
        self.transaction(args)
    }

    fn remove(&self, names: &[String]) -> TransactionResult {
        if names.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["-R".into()];
        args.extend(names.iter().map(OsString::from));
        self.transaction(args)
    }

    fn sys_upgrade(&self) -> TransactionResult {
        self.transaction(vec!["-Syu".into()])
    }
}

/// Copy `from` into `to` chunk by chunk, flushing each chunk, and return everything copied
fn tee_stderr<R: Read, W: Write>(mut from: R, mut to: W) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match from.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        to.write_all(&buf[..n])?;
        to.flush()?;
        captured.extend_from_slice(&buf[..n]);
    }
    Ok(captured)
}

/// Parse `pacman -Q` output
pub fn parse_installed(out: &str) -> Vec<(String, String)> {
    out.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let version = parts.next()?;
            Some((name.to_string(), version.to_string()))
        })
        .collect()
}

/// Parse `pacman -Ss` output: a header line per package followed by an indented description
pub fn parse_search(out: &str) -> Result<Vec<PackageRecord>> {
    let header = Regex::new(r"^(\S+)/(\S+) (\S+)(.*)$").map_err(|e| AurError::Config {
        message: e.to_string(),
    })?;

    let mut results: Vec<PackageRecord> = Vec::new();
    for line in out.lines() {
        if line.starts_with(char::is_whitespace) {
            if let Some(last) = results.last_mut() {
                let desc = line.trim();
                if !desc.is_empty() {
                    last.description = Some(desc.to_string());
                }
            }
            continue;
        }
        if let Some(caps) = header.captures(line) {
            let mut pkg = PackageRecord::new(&caps[2], &caps[3], "");
            pkg.repository = caps[1].to_string();
            pkg.installed = caps[4].contains("[installed");
            results.push(pkg);
        }
    }
    Ok(results)
}
