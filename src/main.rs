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

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;

mod aur;
mod commands;
mod config;
mod error;
mod logging;
mod package;
mod pacman;
mod select;
mod store;
mod update;

#[cfg(test)]
mod testing;

use aur::{AurClient, GitTarFetcher, Makepkg};
use commands::Session;
use error::AurError;
use pacman::Pacman;
use select::{AcceptAll, PromptSelector, Selector};
use store::PackageStore;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Copyright (C) 2025  compiledkernel-idk and pacboost contributors\n",
    "License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>\n\n",
    "This is free software; you are free to change and redistribute it.\n",
    "There is NO WARRANTY, to the extent permitted by law."
);

#[derive(Parser)]
#[command(name = "aurboost")]
#[command(version = VERSION)]
#[command(long_version = LONG_VERSION)]
#[command(about = "AUR helper for Arch Linux built around pacman.")]
struct Cli {
    #[arg(short = 'S', long)]
    sync: bool,
    #[arg(short = 'Q', long)]
    query: bool,
    #[arg(short = 'R', long)]
    remove: bool,
    #[arg(short = 's', long)]
    search: bool,
    #[arg(short = 'y', long)]
    refresh: bool,
    #[arg(short = 'u', long)]
    sys_upgrade: bool,
    #[arg(short = 'A', long, help = "Only operate on AUR packages")]
    aur: bool,
    #[arg(long, help = "Fetch build recipes with git instead of snapshot tarballs")]
    git: bool,
    #[arg(long, value_name = "DIR", help = "Build directory cache")]
    cachedir: Option<PathBuf>,
    #[arg(long, help = "Bypass any confirmation prompts")]
    noconfirm: bool,
    #[arg(long, help = "Print debug messages")]
    debug: bool,
    #[arg(value_name = "TARGETS")]
    targets: Vec<String>,
}

impl Cli {
    fn has_operation(&self) -> bool {
        self.sync || self.query || self.remove
    }
}

const INTERRUPTED: &[u8] = b"\ninterrupted, aborting\n";

extern "C" fn on_interrupt(_signal: libc::c_int) {
    // SAFETY: write and _exit are async-signal-safe
    unsafe {
        libc::write(libc::STDERR_FILENO, INTERRUPTED.as_ptr().cast(), INTERRUPTED.len());
        libc::_exit(130);
    }
}

fn install_signal_handlers() {
    let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only calls async-signal-safe functions
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

/// Fail early with a clear message instead of a spawn error mid-build
fn require_tools(tools: &[&str]) -> Result<()> {
    let missing: Vec<&str> = tools
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("required tool(s) not found in PATH: {}", missing.join(", ")))
    }
}

fn main() {
    install_signal_handlers();
    let cli = Cli::parse();

    if !cli.has_operation() {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        return;
    }

    let code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            if matches!(e.downcast_ref::<AurError>(), Some(AurError::UserAbort)) {
                eprintln!("{}", style("aborted").yellow().bold());
            } else {
                logging::error(format!("{:#}", e));
            }
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<bool> {
    let (mut config, config_warnings) = config::Config::load();
    config.aur_only |= cli.aur;
    config.use_git |= cli.git;
    config.noconfirm |= cli.noconfirm;
    config.debug |= cli.debug;
    if let Some(dir) = cli.cachedir.clone() {
        config.cache_dir = dir;
    }
    config.validate().context("invalid configuration")?;

    if !config.color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    logging::init(&config.logging.level, config.debug, config.logging.file.as_deref());
    for warning in &config_warnings {
        logging::warning(warning);
    }
    logging::debug(format!("cache dir {}, store {}", config.cache_dir.display(), config.db_path.display()));

    let builds = cli.sync && !cli.search && (cli.sys_upgrade || !cli.targets.is_empty());
    if builds {
        let fetch_tool = if config.use_git { "git" } else { "tar" };
        require_tools(&["pacman", "makepkg", fetch_tool])?;
    } else if cli.remove || (cli.search && !config.aur_only) {
        require_tools(&["pacman"])?;
    }

    let mut store = PackageStore::open(&config.db_path)
        .with_context(|| format!("failed to open package store {}", config.db_path.display()))?;
    tracing::debug!("{} tracked package(s) in {}", store.len(), store.path().display());

    let client = AurClient::from_config(&config);
    let fetcher = GitTarFetcher::new();
    let builder = Makepkg::from_config(&config);
    let pacman = Pacman::new(config.noconfirm);
    let mut selector: Box<dyn Selector> = if config.noconfirm {
        Box::new(AcceptAll)
    } else {
        Box::new(PromptSelector::stdio())
    };

    let mut session = Session {
        config: &config,
        metadata: &client,
        fetcher: &fetcher,
        builder: &builder,
        pacman: &pacman,
        selector: selector.as_mut(),
        store: &mut store,
    };

    if cli.query {
        return commands::query(&session, cli.sys_upgrade);
    }
    if cli.remove {
        return commands::remove(&mut session, &cli.targets);
    }
    if cli.search {
        return commands::search(&session, &cli.targets);
    }

    let mut ok = true;
    if cli.sys_upgrade {
        if cli.refresh {
            tracing::debug!("-y is implied by the system upgrade");
        }
        ok &= commands::upgrade(&mut session)?;
    }
    if !cli.targets.is_empty() {
        ok &= commands::sync(&mut session, &cli.targets)?;
    } else if !cli.sys_upgrade {
        return Err(anyhow!("no targets specified (use -h for help)"));
    }
    Ok(ok)
}
