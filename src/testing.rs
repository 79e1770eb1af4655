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

//! In-memory stand-ins for the AUR, the fetcher, makepkg and pacman.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::aur::builder::{artifact_prefix, BuildTool};
use crate::aur::client::MetadataSource;
use crate::aur::fetcher::SourceFetcher;
use crate::error::{AurError, Result, TransactionFailure};
use crate::package::PackageRecord;
use crate::pacman::{PackageManager, TransactionResult};

pub fn aur_pkg(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
    PackageRecord::new(
        name,
        version,
        format!("https://aur.archlinux.org/cgit/aur.git/snapshot/{}.tar.gz", name),
    )
    .with_depends(depends.iter().copied())
}

#[derive(Default)]
pub struct FakeAur {
    pub packages: HashMap<String, PackageRecord>,
    pub queries: RefCell<Vec<String>>,
    /// Every query fails with a network error
    pub offline: bool,
}

impl FakeAur {
    pub fn with(packages: Vec<PackageRecord>) -> Self {
        Self {
            packages: packages.into_iter().map(|p| (p.name.clone(), p)).collect(),
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    fn reachable(&self) -> Result<()> {
        if self.offline {
            return Err(AurError::network("https://aur.archlinux.org/rpc/", "connection refused"));
        }
        Ok(())
    }
}

impl MetadataSource for FakeAur {
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        self.queries.borrow_mut().push(query.to_string());
        self.reachable()?;
        let mut found: Vec<PackageRecord> = self
            .packages
            .values()
            .filter(|p| p.name.contains(query))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    fn fetch_one(&self, name: &str) -> Result<Option<PackageRecord>> {
        self.queries.borrow_mut().push(name.to_string());
        self.reachable()?;
        Ok(self.packages.get(name).cloned())
    }

    fn fetch_many(&self, names: &[String]) -> Result<Vec<PackageRecord>> {
        self.queries.borrow_mut().extend(names.iter().cloned());
        self.reachable()?;
        Ok(names.iter().filter_map(|n| self.packages.get(n).cloned()).collect())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: RefCell<Vec<String>>,
    pub fail: HashSet<String>,
}

impl FakeFetcher {
    pub fn failing(urls_containing: &[&str]) -> Self {
        Self {
            fetched: RefCell::new(Vec::new()),
            fail: urls_containing.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn record(&self, url: &str, dest: &Path) -> Result<()> {
        if self.fail.iter().any(|f| url.contains(f.as_str())) {
            return Err(AurError::TarFetch {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            });
        }
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.fetched.borrow_mut().push(name);
        Ok(())
    }
}

impl SourceFetcher for FakeFetcher {
    fn fetch_tar(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(url, dest)
    }

    fn fetch_git(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(url, dest)
    }
}

#[derive(Default)]
pub struct FakeBuilder {
    pub built: RefCell<Vec<String>>,
    pub fail: HashSet<String>,
}

impl FakeBuilder {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            built: RefCell::new(Vec::new()),
            fail: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl BuildTool for FakeBuilder {
    fn build(&self, pkg: &PackageRecord, source_dir: &Path) -> Result<Vec<PathBuf>> {
        self.built.borrow_mut().push(pkg.name.clone());
        if self.fail.contains(&pkg.name) {
            return Err(AurError::BuildFailed {
                package: pkg.name.clone(),
                reason: "makepkg exited with code Some(1)".to_string(),
                exit_code: Some(1),
            });
        }
        Ok(vec![source_dir.join(format!("{}x86_64.pkg.tar", artifact_prefix(pkg)))])
    }
}

#[derive(Default)]
pub struct FakePacman {
    pub installed_files: RefCell<Vec<PathBuf>>,
    pub installed_names: RefCell<Vec<String>>,
    pub removed: RefCell<Vec<String>>,
    pub upgrades: RefCell<usize>,
    pub sync_db: HashSet<String>,
    pub local: Vec<(String, String)>,
    pub fail_install: bool,
    pub fail_upgrade: bool,
    pub fail_query: bool,
}

impl PackageManager for FakePacman {
    fn installed(&self) -> Result<Vec<(String, String)>> {
        if self.fail_query {
            return Err(AurError::Io(std::io::Error::other("pacman -Q failed")));
        }
        Ok(self.local.clone())
    }

    fn search(&self, pattern: &str) -> Result<Vec<PackageRecord>> {
        Ok(self
            .sync_db
            .iter()
            .filter(|n| n.contains(pattern))
            .map(|n| {
                let mut pkg = PackageRecord::new(n.as_str(), "1.0-1", "");
                pkg.repository = "extra".to_string();
                pkg
            })
            .collect())
    }

    fn in_sync_db(&self, name: &str) -> bool {
        self.sync_db.contains(name)
    }

    fn install_files(&self, files: &[PathBuf], _as_deps: bool) -> TransactionResult {
        if self.fail_install {
            return Err(TransactionFailure::FileConflicts);
        }
        self.installed_files.borrow_mut().extend(files.iter().cloned());
        Ok(())
    }

    fn install_names(&self, names: &[String]) -> TransactionResult {
        self.installed_names.borrow_mut().extend(names.iter().cloned());
        Ok(())
    }

    fn remove(&self, names: &[String]) -> TransactionResult {
        self.removed.borrow_mut().extend(names.iter().cloned());
        Ok(())
    }

    fn sys_upgrade(&self) -> TransactionResult {
        *self.upgrades.borrow_mut() += 1;
        if self.fail_upgrade {
            return Err(TransactionFailure::ConflictingDeps);
        }
        Ok(())
    }
}

/// Selector answering from a fixed script
pub struct ScriptedSelector {
    pub one: Vec<usize>,
    pub many: Vec<Vec<usize>>,
    pub asked: Vec<Vec<String>>,
}

impl ScriptedSelector {
    pub fn new(one: Vec<usize>, many: Vec<Vec<usize>>) -> Self {
        Self { one, many, asked: Vec::new() }
    }
}

impl crate::select::Selector for ScriptedSelector {
    fn choose_one(&mut self, _title: &str, candidates: &[String]) -> Result<usize> {
        self.asked.push(candidates.to_vec());
        if self.one.is_empty() {
            return Err(AurError::UserAbort);
        }
        Ok(self.one.remove(0))
    }

    fn choose_many(&mut self, _title: &str, candidates: &[String], _allow_all: bool) -> Result<Vec<usize>> {
        self.asked.push(candidates.to_vec());
        if self.many.is_empty() {
            return Err(AurError::UserAbort);
        }
        Ok(self.many.remove(0))
    }
}
