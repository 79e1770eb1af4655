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

//! AUR dependency resolution with cycle detection.
//!
//! Dependencies are walked depth-first with an explicit stack. Each frame is a
//! package whose recipe has already been fetched; once all of its AUR
//! dependencies are installed it is built and installed itself, so dependencies
//! always land before their dependents.

use console::style;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::builder::Installer;
use super::client::MetadataSource;
use super::fetcher::SourceFetcher;
use crate::error::{AurError, Result};
use crate::package::PackageRecord;

/// A package waiting for its dependencies
struct Frame {
    pkg: PackageRecord,
    dir: PathBuf,
    as_dependency: bool,
    /// Index of the next dependency to visit
    next: usize,
}

/// Resolves AUR dependencies and drives the installer over them
pub struct Resolver<'a> {
    metadata: &'a dyn MetadataSource,
    fetcher: &'a dyn SourceFetcher,
}

impl<'a> Resolver<'a> {
    pub fn new(metadata: &'a dyn MetadataSource, fetcher: &'a dyn SourceFetcher) -> Self {
        Self { metadata, fetcher }
    }

    /// Install `pkg` and every AUR dependency it is missing.
    ///
    /// `pkg`'s recipe must already be at `dest_root/<name>`; dependency recipes
    /// are fetched next to it. Names in `known_local` are treated as satisfied.
    /// Dependencies the AUR does not know are left to pacman. Any fetch, build or
    /// install failure aborts the whole call; packages installed before the
    /// failure stay installed.
    pub fn install_with_dependencies(
        &self,
        pkg: &PackageRecord,
        dest_root: &Path,
        known_local: &HashSet<String>,
        installer: &mut Installer<'_>,
    ) -> Result<()> {
        let _span = crate::span_operation!(pkg.name.as_str()).entered();

        let mut satisfied: HashSet<String> = HashSet::new();
        let mut in_progress: HashSet<String> = HashSet::new();
        in_progress.insert(pkg.name.clone());

        let mut stack = vec![Frame {
            pkg: pkg.clone(),
            dir: dest_root.join(&pkg.name),
            as_dependency: false,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(dep) = frame.pkg.depends.get(frame.next).cloned() else {
                let Some(done) = stack.pop() else { break };
                in_progress.remove(&done.pkg.name);
                installer.build_and_install(&done.pkg, &done.dir, done.as_dependency)?;
                satisfied.insert(done.pkg.name);
                continue;
            };
            frame.next += 1;

            if satisfied.contains(&dep) {
                continue;
            }
            if in_progress.contains(&dep) {
                let mut cycle: Vec<String> = stack
                    .iter()
                    .map(|f| f.pkg.name.clone())
                    .skip_while(|name| name != &dep)
                    .collect();
                cycle.push(dep);
                return Err(AurError::DependencyCycle { cycle });
            }
            if known_local.contains(&dep) {
                tracing::debug!("{} already installed", dep);
                continue;
            }

            let Some(dep_pkg) = self.metadata.fetch_one(&dep)? else {
                tracing::debug!("{} is not an AUR package, leaving it to pacman", dep);
                continue;
            };

            println!("   {} fetching dependency {}", style("->").blue(), style(&dep_pkg.name).yellow());
            let dir = dest_root.join(&dep_pkg.name);
            self.fetcher.fetch_any(&dep_pkg.source_url, &dir)?;

            in_progress.insert(dep_pkg.name.clone());
            stack.push(Frame {
                pkg: dep_pkg,
                dir,
                as_dependency: true,
                next: 0,
            });
        }

        Ok(())
    }
}
