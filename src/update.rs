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

//! System upgrade followed by rebuilding every tracked AUR package that changed.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::aur::{lookup, Installer, MetadataSource, Resolver, SourceFetcher};
use crate::error::{AurError, Result};
use crate::pacman::PackageManager;

/// Result of one package update attempt
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub name: String,
    pub from: String,
    pub to: String,
    /// `Err` holds the failure message
    pub result: std::result::Result<(), String>,
}

/// What a bulk update did
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub outcomes: Vec<UpdateOutcome>,
    /// Tracked packages already at the AUR version
    pub up_to_date: usize,
    /// Names the AUR returned that the store does not track
    pub untracked: Vec<String>,
}

impl UpdateReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Print the per-package table and the totals line
    pub fn print_summary(&self) {
        use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

        if self.outcomes.is_empty() {
            println!("{} all AUR packages are up to date", style("::").green().bold());
            return;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("Package").fg(Color::Cyan),
            Cell::new("Old").fg(Color::Cyan),
            Cell::new("New").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
        ]);

        for outcome in &self.outcomes {
            let status = match &outcome.result {
                Ok(()) => Cell::new("updated").fg(Color::Green),
                Err(reason) => Cell::new(format!("failed: {}", reason)).fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(&outcome.name).fg(Color::White),
                Cell::new(&outcome.from).fg(Color::DarkGrey),
                Cell::new(&outcome.to).fg(Color::Yellow),
                status,
            ]);
        }

        println!("{}", table);
        println!("{} {}/{} AUR package(s) updated, {} failed",
            style("::").cyan().bold(),
            self.succeeded(),
            self.attempted(),
            self.failed());
    }
}

/// Upgrade native packages, then rebuild tracked AUR packages with a newer version.
///
/// A failed native upgrade aborts before anything is rebuilt. An AUR that cannot be
/// reached leaves an empty report. After that, each package is attempted
/// independently: failures are collected in the report and only fatal errors stop
/// the loop.
pub fn update_all(
    metadata: &dyn MetadataSource,
    fetcher: &dyn SourceFetcher,
    pacman: &dyn PackageManager,
    installer: &mut Installer<'_>,
    cache_root: &Path,
) -> Result<UpdateReport> {
    let _span = crate::span_operation!("update").entered();

    println!("{} {}", style("::").cyan().bold(), style("Synchronizing package databases and upgrading...").bold());
    pacman.sys_upgrade().map_err(|reason| AurError::InstallFailed {
        package: "system upgrade".to_string(),
        reason,
    })?;

    let mut report = UpdateReport::default();
    if installer.store().is_empty() {
        return Ok(report);
    }

    let names = installer.store().names();
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("checking {} AUR package(s)...", names.len()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let remote = metadata.fetch_many(&names);
    spinner.finish_and_clear();
    let Some(remote) = lookup(remote)? else {
        crate::logging::warning("skipping AUR updates");
        return Ok(report);
    };

    let known_local: HashSet<String> = match pacman.installed() {
        Ok(installed) => installed.into_iter().map(|(name, _)| name).collect(),
        Err(e) => {
            // every dependency then goes through the AUR lookup instead
            crate::logging::warning(format!("cannot list installed packages: {}", e));
            HashSet::new()
        }
    };
    let resolver = Resolver::new(metadata, fetcher);

    for pkg in remote {
        let Some(from) = installer.store().get(&pkg.name).map(|r| r.version.clone()) else {
            crate::logging::warning(format!("{} is not tracked, skipping", pkg.name));
            report.untracked.push(pkg.name);
            continue;
        };
        if from == pkg.version {
            tracing::debug!("{} {} is up to date", pkg.name, pkg.version);
            report.up_to_date += 1;
            continue;
        }

        println!("{} {} {} -> {}",
            style("::").cyan().bold(),
            style(&pkg.name).white().bold(),
            style(&from).dim(),
            style(&pkg.version).green());

        let result = match fetcher.fetch_any(&pkg.source_url, &cache_root.join(&pkg.name)) {
            Ok(()) => resolver.install_with_dependencies(&pkg, cache_root, &known_local, installer),
            Err(e) => Err(e),
        };

        let result = match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                crate::logging::error(format!("{}: {}", pkg.name, e));
                Err(e.to_string())
            }
        };

        report.outcomes.push(UpdateOutcome {
            name: pkg.name,
            from,
            to: pkg.version,
            result,
        });
    }

    Ok(report)
}
