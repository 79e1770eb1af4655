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

//! Build recipe fetching: snapshot tarballs or git checkouts.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{AurError, Result};

/// How a source URL is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Tarball,
    Git,
}

impl SourceKind {
    /// Pick the strategy from the URL suffix
    pub fn from_url(url: &str) -> Option<Self> {
        if url.ends_with(".tar.gz") {
            Some(SourceKind::Tarball)
        } else if url.ends_with(".git") {
            Some(SourceKind::Git)
        } else {
            None
        }
    }
}

/// Materializes a package's build recipe into a directory
pub trait SourceFetcher {
    /// Download a `.tar.gz` snapshot and unpack it into `dest`
    fn fetch_tar(&self, url: &str, dest: &Path) -> Result<()>;

    /// Clone into `dest`, or reset an existing checkout to its upstream
    fn fetch_git(&self, url: &str, dest: &Path) -> Result<()>;

    /// Dispatch on the URL suffix. Unknown suffixes touch nothing.
    fn fetch_any(&self, url: &str, dest: &Path) -> Result<()> {
        match SourceKind::from_url(url) {
            Some(SourceKind::Tarball) => self.fetch_tar(url, dest),
            Some(SourceKind::Git) => self.fetch_git(url, dest),
            None => Err(AurError::UnsupportedSource {
                url: url.to_string(),
            }),
        }
    }
}

/// Fetcher using HTTP + `tar` for snapshots and the `git` CLI for checkouts
pub struct GitTarFetcher {
    agent: ureq::Agent,
}

impl GitTarFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(concat!("aurboost/", env!("CARGO_PKG_VERSION")))
                .build(),
        }
    }

    fn download(&self, url: &str, archive: &Path) -> Result<u64> {
        let tar_err = |reason: String| AurError::TarFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => tar_err(format!("HTTP {}", code)),
            ureq::Error::Transport(t) => tar_err(t.to_string()),
        })?;

        let total = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let mut file = File::create(archive)
            .map_err(|e| tar_err(format!("cannot create {}: {}", archive.display(), e)))?;

        let pb = if total > 0 {
            let pb = ProgressBar::new(total);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("   {spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            {
                pb.set_style(bar_style.progress_chars("=>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut reader = pb.wrap_read(response.into_reader());
        let written = std::io::copy(&mut reader, &mut file).map_err(|e| tar_err(e.to_string()))?;
        pb.finish_and_clear();

        Ok(written)
    }
}

impl Default for GitTarFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher for GitTarFetcher {
    fn fetch_tar(&self, url: &str, dest: &Path) -> Result<()> {
        let tar_err = |reason: String| AurError::TarFetch {
            url: url.to_string(),
            reason,
        };

        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| tar_err(format!("cannot create {}: {}", parent.display(), e)))?;

        let archive = archive_path(dest);
        println!("   {} downloading {}...", style("->").blue(), style(url).cyan());
        let size = self.download(url, &archive)?;
        tracing::debug!("downloaded {} bytes to {}", size, archive.display());

        unpack(url, &archive, dest)
    }

    fn fetch_git(&self, url: &str, dest: &Path) -> Result<()> {
        if dest.join(".git").exists() {
            println!("   {} updating {}...", style("->").blue(), style(dest.display()).cyan());
            run_git(url, Some(dest), &["fetch", "--quiet", "origin"])?;
            // local edits from earlier builds are discarded
            return run_git(url, Some(dest), &["reset", "--hard", "--quiet", "@{upstream}"]);
        }

        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|e| AurError::GitFetch {
                url: url.to_string(),
                reason: format!("cannot remove stale {}: {}", dest.display(), e),
            })?;
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        println!("   {} cloning {}...", style("->").blue(), style(url).cyan());
        let dest_arg = dest.to_string_lossy();
        run_git(url, None, &["clone", "--quiet", url, dest_arg.as_ref()])
    }
}

/// Replace `dest` with the archive's contents, dropping the top-level directory.
/// The archive is removed whether or not extraction succeeds.
fn unpack(url: &str, archive: &Path, dest: &Path) -> Result<()> {
    let tar_err = |reason: String| AurError::TarFetch {
        url: url.to_string(),
        reason,
    };

    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| tar_err(format!("cannot clean {}: {}", dest.display(), e)))?;
    }
    fs::create_dir_all(dest).map_err(|e| tar_err(format!("cannot create {}: {}", dest.display(), e)))?;

    let output = Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .arg("--strip-components=1")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    let _ = fs::remove_file(archive);
    let output = output.map_err(|e| tar_err(format!("failed to run tar: {}", e)))?;

    if !output.status.success() {
        return Err(tar_err(format!(
            "tar exited with code {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

/// Archive lives next to the target directory
fn archive_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    dest.with_file_name(format!("{}.tar.gz", name))
}

fn run_git(url: &str, dir: Option<&Path>, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    let output = cmd
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| AurError::GitFetch {
            url: url.to_string(),
            reason: format!("failed to run git: {}", e),
        })?;

    if !output.status.success() {
        return Err(AurError::GitFetch {
            url: url.to_string(),
            reason: format!(
                "git {} exited with code {:?}: {}",
                args.first().copied().unwrap_or_default(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}
