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

//! Command handlers behind the CLI operations.
//!
//! Each handler returns `Ok(true)` when every target succeeded, `Ok(false)` when
//! some target failed and was reported, and `Err` for failures that end the run.

use anyhow::{anyhow, Context as _, Result};
use chrono::DateTime;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use std::collections::HashSet;
use std::fs;

use crate::aur::{lookup, BuildTool, Installer, MetadataSource, Resolver, SourceFetcher};
use crate::config::Config;
use crate::error::AurError;
use crate::logging;
use crate::package::PackageRecord;
use crate::pacman::PackageManager;
use crate::select::Selector;
use crate::store::PackageStore;
use crate::update;

/// Everything a command needs, constructed once in `main`
pub struct Session<'a> {
    pub config: &'a Config,
    pub metadata: &'a dyn MetadataSource,
    pub fetcher: &'a dyn SourceFetcher,
    pub builder: &'a dyn BuildTool,
    pub pacman: &'a dyn PackageManager,
    pub selector: &'a mut dyn Selector,
    pub store: &'a mut PackageStore,
}

/// `-S`: install targets from the sync databases or the AUR
pub fn sync(session: &mut Session<'_>, targets: &[String]) -> Result<bool> {
    if targets.is_empty() {
        return Err(anyhow!("no targets specified"));
    }

    let mut ok = true;
    let mut native: Vec<String> = Vec::new();
    let mut aur: Vec<PackageRecord> = Vec::new();

    for target in targets {
        if !session.config.aur_only && session.pacman.in_sync_db(target) {
            native.push(target.clone());
            continue;
        }
        match classify_aur_target(session, target)? {
            Some(pkg) => {
                if !aur.iter().any(|p| p.name == pkg.name) {
                    aur.push(pkg);
                }
            }
            None => {
                logging::error(AurError::PackageNotFound { package: target.clone() }.to_string());
                ok = false;
            }
        }
    }

    if !native.is_empty() {
        logging::info("Installing from the sync databases...");
        if let Err(reason) = session.pacman.install_names(&native) {
            logging::error(format!("pacman failed to install {}: {}", native.join(" "), reason));
            ok = false;
        }
    }

    if aur.is_empty() {
        return Ok(ok);
    }

    clean_build_dirs(session, &aur)?;

    let mut known_local: HashSet<String> = session
        .pacman
        .installed()
        .context("failed to list installed packages")?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    known_local.extend(session.store.names());

    let cache_dir = session.config.cache_dir.clone();
    let resolver = Resolver::new(session.metadata, session.fetcher);
    let fetcher = session.fetcher;
    let mut installer = Installer::new(session.builder, session.pacman, session.store)
        .clean_after_install(session.config.build.clean_after_install);

    for pkg in &aur {
        let dir = cache_dir.join(&pkg.name);
        let result = match fetcher.fetch_any(&pkg.source_url, &dir) {
            Ok(()) => resolver.install_with_dependencies(pkg, &cache_dir, &known_local, &mut installer),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                known_local.insert(pkg.name.clone());
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                logging::error(format!("{}: {}", pkg.name, e));
                ok = false;
            }
        }
    }

    Ok(ok)
}

/// Exact AUR match, else a search the user picks from
fn classify_aur_target(session: &mut Session<'_>, target: &str) -> Result<Option<PackageRecord>> {
    if let Some(pkg) = lookup_flat(session.metadata.fetch_one(target))? {
        return Ok(Some(pkg));
    }

    let mut matches = lookup(session.metadata.search(target))?.unwrap_or_default();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => {
            let labels: Vec<String> = matches.iter().map(candidate_label).collect();
            let index = session
                .selector
                .choose_one(&format!("No exact match for '{}', pick a package", target), &labels)?;
            Ok(matches.into_iter().nth(index))
        }
    }
}

fn lookup_flat(result: crate::error::Result<Option<PackageRecord>>) -> crate::error::Result<Option<PackageRecord>> {
    lookup(result).map(Option::flatten)
}

fn candidate_label(pkg: &PackageRecord) -> String {
    match &pkg.description {
        Some(desc) => format!("{} {} - {}", pkg.name, pkg.version, desc),
        None => format!("{} {}", pkg.name, pkg.version),
    }
}

/// Offer to wipe cached build directories so the fetch starts clean
fn clean_build_dirs(session: &mut Session<'_>, pkgs: &[PackageRecord]) -> Result<()> {
    let cached: Vec<String> = pkgs
        .iter()
        .map(|p| p.name.clone())
        .filter(|name| session.config.cache_dir.join(name).exists())
        .collect();
    if cached.is_empty() {
        return Ok(());
    }

    let chosen = session
        .selector
        .choose_many("Packages to clean build", &cached, true)?;
    for index in chosen {
        let dir = session.config.cache_dir.join(&cached[index]);
        logging::step(format!("cleaning {}", dir.display()));
        fs::remove_dir_all(&dir).with_context(|| format!("failed to remove {}", dir.display()))?;
    }
    Ok(())
}

/// `-Ss`: search the sync databases and the AUR
pub fn search(session: &Session<'_>, targets: &[String]) -> Result<bool> {
    if targets.is_empty() {
        return Err(anyhow!("no search terms specified"));
    }

    let mut found = false;
    for target in targets {
        if !session.config.aur_only {
            let native = session
                .pacman
                .search(target)
                .with_context(|| format!("pacman search for '{}' failed", target))?;
            for pkg in &native {
                print_native(pkg);
            }
            found |= !native.is_empty();
        }

        let aur = lookup(session.metadata.search(target))?.unwrap_or_default();
        if !aur.is_empty() {
            println!("{} {} AUR result(s) for '{}':",
                style("::").cyan().bold(),
                style(aur.len()).white().bold(),
                style(target).yellow());
            println!("{}", aur_table(&aur, &*session.store));
            found = true;
        }
    }

    if !found {
        println!("no matches found.");
    }
    Ok(found)
}

fn print_native(pkg: &PackageRecord) {
    let installed = if pkg.installed {
        style(" [installed]").cyan().to_string()
    } else {
        String::new()
    };
    println!("{}/{} {}{}",
        style(&pkg.repository).cyan().bold(),
        style(&pkg.name).bold(),
        style(&pkg.version).green(),
        installed);
    if let Some(desc) = &pkg.description {
        println!("    {}", desc);
    }
}

fn aur_table(pkgs: &[PackageRecord], store: &PackageStore) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Package").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Votes").fg(Color::Cyan),
        Cell::new("Popularity").fg(Color::Cyan),
        Cell::new("Maintainer").fg(Color::Cyan),
        Cell::new("Out of date").fg(Color::Cyan),
    ]);

    for pkg in pkgs {
        let name = if store.contains(&pkg.name) {
            format!("{} [installed]", pkg.name)
        } else {
            pkg.name.clone()
        };
        let maintainer = if pkg.is_orphan() {
            Cell::new("orphan").fg(Color::Red)
        } else {
            Cell::new(pkg.maintainer.as_deref().unwrap_or_default()).fg(Color::White)
        };
        let out_of_date = match pkg.out_of_date.and_then(format_date) {
            Some(date) => Cell::new(date).fg(Color::Red),
            None => Cell::new("-").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(name).fg(Color::White),
            Cell::new(&pkg.version).fg(Color::Green),
            Cell::new(pkg.votes).fg(Color::Yellow),
            Cell::new(format!("{:.2}", pkg.popularity)).fg(Color::Blue),
            maintainer,
            out_of_date,
        ]);
    }
    table
}

/// Unix timestamp as a calendar date
fn format_date(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// `-Q`: list tracked packages; with `upgrades`, only those behind the AUR
pub fn query(session: &Session<'_>, upgrades: bool) -> Result<bool> {
    if session.store.is_empty() {
        println!("{} no AUR packages are tracked", style("::").yellow().bold());
        return Ok(true);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    if !upgrades {
        table.set_header(vec![
            Cell::new("Package").fg(Color::Cyan),
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("Source").fg(Color::Cyan),
        ]);
        for record in session.store.all_records() {
            table.add_row(vec![
                Cell::new(&record.name).fg(Color::White),
                Cell::new(&record.version).fg(Color::Green),
                Cell::new(&record.source_url).fg(Color::DarkGrey),
            ]);
        }
        println!("{}", table);
        println!("{} {} tracked package(s)", style("::").cyan().bold(), session.store.len());
        return Ok(true);
    }

    let Some(behind) = outdated(session.metadata, session.store.all_records())? else {
        return Ok(false);
    };
    if behind.is_empty() {
        println!("{} all AUR packages are up to date", style("::").green().bold());
        return Ok(true);
    }

    table.set_header(vec![
        Cell::new("Package").fg(Color::Cyan),
        Cell::new("Installed").fg(Color::Cyan),
        Cell::new("Available").fg(Color::Cyan),
    ]);
    for (local, remote) in &behind {
        table.add_row(vec![
            Cell::new(&local.name).fg(Color::White),
            Cell::new(&local.version).fg(Color::DarkGrey),
            Cell::new(&remote.version).fg(Color::Green),
        ]);
    }
    println!("{}", table);
    Ok(true)
}

/// Tracked records paired with a differing AUR record; `None` when the AUR gave no answer
fn outdated(
    metadata: &dyn MetadataSource,
    records: &[PackageRecord],
) -> Result<Option<Vec<(PackageRecord, PackageRecord)>>> {
    let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
    let Some(remote) = lookup(metadata.fetch_many(&names)).context("failed to query the AUR")? else {
        return Ok(None);
    };

    Ok(Some(records
        .iter()
        .filter_map(|local| {
            remote
                .iter()
                .find(|r| r.name == local.name && r.version != local.version)
                .map(|r| (local.clone(), r.clone()))
        })
        .collect()))
}

/// `-R`: remove tracked packages matching each target
pub fn remove(session: &mut Session<'_>, targets: &[String]) -> Result<bool> {
    if targets.is_empty() {
        return Err(anyhow!("no targets specified"));
    }

    let mut ok = true;
    let mut chosen: Vec<String> = Vec::new();

    for target in targets {
        if session.store.contains(target) {
            push_unique(&mut chosen, target.clone());
            continue;
        }

        let candidates: Vec<String> = session
            .store
            .all_records()
            .iter()
            .filter(|r| r.name.contains(target.as_str()))
            .map(|r| r.name.clone())
            .collect();
        if candidates.is_empty() {
            logging::warning(format!("no tracked package matches '{}'", target));
            ok = false;
            continue;
        }

        let picked = session
            .selector
            .choose_many(&format!("Packages matching '{}' to remove", target), &candidates, true)?;
        for index in picked {
            push_unique(&mut chosen, candidates[index].clone());
        }
    }

    if chosen.is_empty() {
        return Ok(ok);
    }

    println!("{} removing {}", style("::").cyan().bold(), style(chosen.join(" ")).white().bold());
    if let Err(reason) = session.pacman.remove(&chosen) {
        logging::error(format!("pacman failed to remove packages: {}", reason));
        return Ok(false);
    }

    for name in &chosen {
        session.store.remove(name);
    }
    Ok(ok)
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// `-Su`: native upgrade, then rebuild outdated AUR packages.
/// Per-package failures are listed in the summary and leave the result `true`.
pub fn upgrade(session: &mut Session<'_>) -> Result<bool> {
    let mut installer = Installer::new(session.builder, session.pacman, session.store)
        .clean_after_install(session.config.build.clean_after_install);

    let report = update::update_all(
        session.metadata,
        session.fetcher,
        session.pacman,
        &mut installer,
        &session.config.cache_dir,
    )
    .context("system upgrade failed")?;

    report.print_summary();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{aur_pkg, FakeAur, FakeBuilder, FakeFetcher, FakePacman, ScriptedSelector};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        config: Config,
        store: PackageStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let config = Config {
                cache_dir: dir.path().join("cache"),
                ..Config::default()
            };
            let store = PackageStore::open(dir.path().join("packages.db")).unwrap();
            Self { _dir: dir, config, store }
        }
    }

    #[test]
    fn test_sync_splits_native_and_aur_targets() {
        let mut fx = Fixture::new();
        let aur = FakeAur::with(vec![aur_pkg("foo", "1.0-1", &[])]);
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman {
            sync_db: ["vim".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut selector = ScriptedSelector::new(vec![], vec![]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        let ok = sync(&mut session, &["vim".to_string(), "foo".to_string()]).unwrap();

        assert!(ok);
        assert_eq!(*pacman.installed_names.borrow(), vec!["vim"]);
        assert_eq!(*builder.built.borrow(), vec!["foo"]);
        assert!(fx.store.contains("foo"));
        assert!(!fx.store.contains("vim"));
    }

    #[test]
    fn test_sync_aur_only_skips_sync_databases() {
        let mut fx = Fixture::new();
        fx.config.aur_only = true;
        let aur = FakeAur::with(vec![aur_pkg("vim", "9.1-1", &[])]);
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman {
            sync_db: ["vim".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut selector = ScriptedSelector::new(vec![], vec![]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(sync(&mut session, &["vim".to_string()]).unwrap());

        assert!(pacman.installed_names.borrow().is_empty());
        assert_eq!(*builder.built.borrow(), vec!["vim"]);
    }

    #[test]
    fn test_sync_disambiguates_search_results() {
        let mut fx = Fixture::new();
        let aur = FakeAur::with(vec![aur_pkg("foo-bin", "1-1", &[]), aur_pkg("foo-git", "r10-1", &[])]);
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![1], vec![]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(sync(&mut session, &["foo".to_string()]).unwrap());

        assert_eq!(*builder.built.borrow(), vec!["foo-git"]);
        assert_eq!(selector.asked.len(), 1);
    }

    #[test]
    fn test_sync_missing_target_reports_failure() {
        let mut fx = Fixture::new();
        let aur = FakeAur::default();
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(!sync(&mut session, &["nope".to_string()]).unwrap());
        assert!(builder.built.borrow().is_empty());
    }

    #[test]
    fn test_sync_cleans_selected_build_dirs() {
        let mut fx = Fixture::new();
        let stale = fx.config.cache_dir.join("foo");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("PKGBUILD"), "pkgname=foo").unwrap();

        let aur = FakeAur::with(vec![aur_pkg("foo", "1.0-1", &[])]);
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![vec![0]]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(sync(&mut session, &["foo".to_string()]).unwrap());

        assert!(!stale.exists());
        assert_eq!(selector.asked, vec![vec!["foo".to_string()]]);
    }

    #[test]
    fn test_remove_exact_match_skips_prompt() {
        let mut fx = Fixture::new();
        fx.store.upsert(aur_pkg("foo", "1-1", &[]));
        fx.store.upsert(aur_pkg("foo-git", "1-1", &[]));
        let aur = FakeAur::default();
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(remove(&mut session, &["foo".to_string()]).unwrap());

        assert!(selector.asked.is_empty());
        assert_eq!(*pacman.removed.borrow(), vec!["foo"]);
        assert!(!fx.store.contains("foo"));
        assert!(fx.store.contains("foo-git"));
    }

    #[test]
    fn test_remove_selects_among_matches() {
        let mut fx = Fixture::new();
        for name in ["foo-bin", "foo-git", "bar"] {
            fx.store.upsert(aur_pkg(name, "1-1", &[]));
        }
        let aur = FakeAur::default();
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![vec![1]]);

        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };
        assert!(remove(&mut session, &["foo".to_string()]).unwrap());

        assert_eq!(selector.asked, vec![vec!["foo-bin".to_string(), "foo-git".to_string()]]);
        assert_eq!(*pacman.removed.borrow(), vec!["foo-git"]);
        assert!(fx.store.contains("foo-bin"));
        assert!(!fx.store.contains("foo-git"));
    }

    #[test]
    fn test_outdated_lists_changed_versions() {
        let records = vec![aur_pkg("foo", "1.0", &[]), aur_pkg("bar", "2.0", &[])];
        let aur = FakeAur::with(vec![aur_pkg("foo", "1.1", &[]), aur_pkg("bar", "2.0", &[])]);

        let outdated = outdated(&aur, &records).unwrap().unwrap();
        assert_eq!(outdated.len(), 1);
        assert_eq!(outdated[0].0.name, "foo");
        assert_eq!(outdated[0].1.version, "1.1");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(1_700_000_000).as_deref(), Some("2023-11-14"));
    }

    #[test]
    fn test_outdated_with_aur_unreachable_is_none() {
        let records = vec![aur_pkg("foo", "1.0", &[])];
        assert!(outdated(&FakeAur::offline(), &records).unwrap().is_none());
    }

    #[test]
    fn test_query_upgrades_with_aur_unreachable_reports_failure() {
        let mut fx = Fixture::new();
        fx.store.upsert(aur_pkg("foo", "1.0", &[]));
        let aur = FakeAur::offline();
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![]);
        let session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };

        assert!(!query(&session, true).unwrap());
        assert!(query(&session, false).unwrap());
    }

    #[test]
    fn test_upgrade_succeeds_with_failed_packages_in_report() {
        let mut fx = Fixture::new();
        fx.store.upsert(aur_pkg("foo", "1.0", &[]));
        fx.store.upsert(aur_pkg("bar", "1.0", &[]));
        let aur = FakeAur::with(vec![aur_pkg("foo", "1.1", &[]), aur_pkg("bar", "1.1", &[])]);
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::failing(&["bar"]);
        let pacman = FakePacman::default();
        let mut selector = ScriptedSelector::new(vec![], vec![]);
        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };

        assert!(upgrade(&mut session).unwrap());
        assert_eq!(fx.store.get("foo").unwrap().version, "1.1");
        assert_eq!(fx.store.get("bar").unwrap().version, "1.0");
    }

    #[test]
    fn test_upgrade_fails_when_system_upgrade_fails() {
        let mut fx = Fixture::new();
        let aur = FakeAur::default();
        let fetcher = FakeFetcher::default();
        let builder = FakeBuilder::default();
        let pacman = FakePacman {
            fail_upgrade: true,
            ..Default::default()
        };
        let mut selector = ScriptedSelector::new(vec![], vec![]);
        let mut session = Session {
            config: &fx.config,
            metadata: &aur,
            fetcher: &fetcher,
            builder: &builder,
            pacman: &pacman,
            selector: &mut selector,
            store: &mut fx.store,
        };

        assert!(upgrade(&mut session).is_err());
    }
}
