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

//! AUR package building with proper privilege handling, and the install step
//! that records successful installs in the package store.

use console::style;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::error::{AurError, Result};
use crate::package::PackageRecord;
use crate::pacman::PackageManager;
use crate::store::PackageStore;

const PACKAGE_EXTENSIONS: [&str; 4] = [".pkg.tar", ".pkg.tar.zst", ".pkg.tar.xz", ".pkg.tar.gz"];

/// Turns a build recipe directory into installable package files
pub trait BuildTool {
    fn build(&self, pkg: &PackageRecord, source_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// makepkg-backed build tool
pub struct Makepkg {
    /// Number of parallel make jobs
    make_jobs: usize,
    /// Disable compression for faster builds
    disable_compression: bool,
}

impl Makepkg {
    /// Create a builder from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            make_jobs: config.get_make_jobs(),
            disable_compression: config.build.disable_compression,
        }
    }

    fn pkgext(&self) -> &'static str {
        if self.disable_compression {
            ".pkg.tar"
        } else {
            ".pkg.tar.zst"
        }
    }

    /// makepkg must not run as root; under sudo, build as the invoking user
    fn command(&self, build_dir: &Path, pkg_name: &str) -> Result<Command> {
        // SAFETY: getuid has no preconditions
        let is_root = unsafe { libc::getuid() } == 0;

        let mut cmd = if is_root {
            let sudo_user = std::env::var("SUDO_USER").map_err(|_| AurError::BuildFailed {
                package: pkg_name.to_string(),
                reason: "cannot build AUR packages as root without SUDO_USER set".to_string(),
                exit_code: None,
            })?;
            println!("   {} dropping privileges to {}...", style("->").yellow(), style(&sudo_user).cyan());

            let _ = Command::new("chown")
                .arg("-R")
                .arg(format!("{}:{}", sudo_user, sudo_user))
                .arg(build_dir)
                .status();

            let mut cmd = Command::new("sudo");
            cmd.args(["-u", &sudo_user, "makepkg"]);
            cmd
        } else {
            Command::new("makepkg")
        };

        cmd.env("MAKEFLAGS", format!("-j{}", self.make_jobs));
        cmd.env("PKGEXT", self.pkgext());
        cmd.current_dir(build_dir);
        Ok(cmd)
    }

    /// Paths makepkg reports for the current PKGBUILD
    fn package_list(&self, build_dir: &Path, pkg_name: &str) -> Vec<PathBuf> {
        let output = self
            .command(build_dir, pkg_name)
            .ok()
            .and_then(|mut cmd| {
                cmd.arg("--packagelist")
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .ok()
            });

        match output {
            Some(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
                .lines()
                .map(|l| PathBuf::from(l.trim()))
                .filter(|p| p.is_file())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl BuildTool for Makepkg {
    fn build(&self, pkg: &PackageRecord, source_dir: &Path) -> Result<Vec<PathBuf>> {
        if !source_dir.join("PKGBUILD").exists() {
            return Err(AurError::BuildFailed {
                package: pkg.name.clone(),
                reason: format!("PKGBUILD not found in {}", source_dir.display()),
                exit_code: None,
            });
        }

        println!("   {} running makepkg (MAKEFLAGS -j{}, PKGEXT {})...",
            style("->").blue(),
            self.make_jobs,
            style(self.pkgext()).cyan());

        let status = self
            .command(source_dir, &pkg.name)?
            .args(["-sf", "--noconfirm"])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| AurError::BuildFailed {
                package: pkg.name.clone(),
                reason: format!("failed to run makepkg: {}", e),
                exit_code: None,
            })?;

        if !status.success() {
            return Err(AurError::BuildFailed {
                package: pkg.name.clone(),
                reason: format!("makepkg exited with code {:?}", status.code()),
                exit_code: status.code(),
            });
        }

        let mut packages = self.package_list(source_dir, &pkg.name);
        if packages.is_empty() {
            packages = find_built_packages(source_dir)?;
        }
        let packages = select_artifacts(pkg, packages);

        if packages.is_empty() {
            return Err(AurError::BuildFailed {
                package: pkg.name.clone(),
                reason: "no packages were built".to_string(),
                exit_code: None,
            });
        }
        Ok(packages)
    }
}

/// Find built package files in build directory
fn find_built_packages(build_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut packages = Vec::new();

    for entry in fs::read_dir(build_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if PACKAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                packages.push(path);
            }
        }
    }

    packages.sort();
    Ok(packages)
}

/// File name prefix of the artifact for a package: `name-version-`
pub fn artifact_prefix(pkg: &PackageRecord) -> String {
    format!("{}-{}-", pkg.name, pkg.version)
}

/// Prefer the artifact built for this exact package over split-package siblings
fn select_artifacts(pkg: &PackageRecord, packages: Vec<PathBuf>) -> Vec<PathBuf> {
    let prefix = artifact_prefix(pkg);
    let exact: Vec<PathBuf> = packages
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    if exact.is_empty() {
        packages
    } else {
        exact
    }
}

/// Builds, installs and records packages.
///
/// Build and install are separate steps; the store is only touched after pacman
/// accepted the artifacts.
pub struct Installer<'a> {
    builder: &'a dyn BuildTool,
    pacman: &'a dyn PackageManager,
    store: &'a mut PackageStore,
    clean_after_install: bool,
}

impl<'a> Installer<'a> {
    pub fn new(builder: &'a dyn BuildTool, pacman: &'a dyn PackageManager, store: &'a mut PackageStore) -> Self {
        Self {
            builder,
            pacman,
            store,
            clean_after_install: false,
        }
    }

    pub fn clean_after_install(mut self, clean: bool) -> Self {
        self.clean_after_install = clean;
        self
    }

    pub fn store(&self) -> &PackageStore {
        &*self.store
    }

    /// Run the build tool in `source_dir`
    pub fn build(&self, pkg: &PackageRecord, source_dir: &Path) -> Result<Vec<PathBuf>> {
        let _span = crate::span_build!(pkg.name.as_str()).entered();
        self.builder.build(pkg, source_dir)
    }

    /// Install artifacts, then record the package
    pub fn install(&mut self, pkg: &PackageRecord, artifacts: &[PathBuf], as_dependency: bool) -> Result<()> {
        println!("   {} installing with pacman...", style("->").blue());
        self.pacman
            .install_files(artifacts, as_dependency)
            .map_err(|reason| AurError::InstallFailed {
                package: pkg.name.clone(),
                reason,
            })?;

        self.store.upsert(pkg.clone());
        tracing::info!("recorded {} {}", pkg.name, pkg.version);
        Ok(())
    }

    /// Build and install a package
    pub fn build_and_install(&mut self, pkg: &PackageRecord, source_dir: &Path, as_dependency: bool) -> Result<()> {
        println!();
        println!("{} {} {} {}",
            style("::").cyan().bold(),
            style("Building").white(),
            style(&pkg.name).yellow().bold(),
            style(&pkg.version).green());

        let artifacts = self.build(pkg, source_dir)?;

        println!("   {} built {} package(s):", style("->").green(), artifacts.len());
        for artifact in &artifacts {
            if let Some(name) = artifact.file_name() {
                let size = fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
                println!("      {} ({:.2} MiB)",
                    style(name.to_string_lossy()).cyan(),
                    size as f64 / 1024.0 / 1024.0);
            }
        }

        self.install(pkg, &artifacts, as_dependency)?;

        if self.clean_after_install {
            println!("   {} cleaning build directory...", style("->").dim());
            let _ = fs::remove_dir_all(source_dir);
        }

        println!("   {} {} installed", style("->").green(), style(&pkg.name).white().bold());
        Ok(())
    }
}
