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

//! Configuration management with validation and defaults.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::error::{AurError, Result};

/// Main configuration structure for aurboost
#[derive(Debug, Clone)]
pub struct Config {
    /// Only operate on AUR packages, never the sync databases
    pub aur_only: bool,

    /// Fetch build recipes with git instead of snapshot tarballs
    pub use_git: bool,

    /// Skip every interactive prompt and take the full candidate list
    pub noconfirm: bool,

    /// Print debug messages
    pub debug: bool,

    /// Enable colored output
    pub color: bool,

    /// Directory holding per-package build directories
    pub cache_dir: PathBuf,

    /// Local package record store
    pub db_path: PathBuf,

    /// AUR-specific configuration
    pub aur: AurConfig,

    /// makepkg configuration
    pub build: BuildConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aur_only: false,
            use_git: false,
            noconfirm: false,
            debug: false,
            color: true,
            cache_dir: default_cache_dir(),
            db_path: default_db_path(),
            aur: AurConfig::default(),
            build: BuildConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("aurboost")
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("aurboost")
        .join("packages.db")
}

/// AUR-specific configuration
#[derive(Debug, Clone)]
pub struct AurConfig {
    /// AUR RPC endpoint
    pub rpc_url: String,

    /// AUR web root, used to derive git and snapshot URLs
    pub base_url: String,

    /// Number of info lookups kept in memory
    pub cache_size: usize,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://aur.archlinux.org/rpc/".to_string(),
            base_url: "https://aur.archlinux.org".to_string(),
            cache_size: 500,
        }
    }
}

/// makepkg configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Number of parallel make jobs (0 = auto-detect)
    pub make_jobs: usize,

    /// Disable compression for faster local builds
    pub disable_compression: bool,

    /// Remove the build directory once the package is installed
    pub clean_after_install: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            make_jobs: 0,
            disable_compression: true,
            clean_after_install: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (empty = no file logging)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. /etc/aurboost/aurboost.toml (system-wide)
    /// 2. ~/.config/aurboost/config.toml (user)
    /// 3. Environment variables (AURBOOST_*)
    ///
    /// Files that cannot be read or parsed are skipped; the returned messages say
    /// which and why, for printing once logging is up.
    pub fn load() -> (Self, Vec<String>) {
        let mut paths = vec![PathBuf::from("/etc/aurboost/aurboost.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("aurboost").join("config.toml"));
        }

        let (config, warnings) = Self::load_from(&paths);
        (config.apply_env_overrides(), warnings)
    }

    /// Layer config files over the defaults, later files winning key by key
    pub fn load_from(paths: &[PathBuf]) -> (Self, Vec<String>) {
        let mut config = Config::default();
        let mut warnings = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            let parsed = fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|content| parse_file(&content).map_err(|e| e.to_string()));
            match parsed {
                Ok(file) => config.apply(file),
                Err(e) => warnings.push(format!("ignoring config file {}: {}", path.display(), e)),
            }
        }

        (config, warnings)
    }

    /// Overwrite every key the file sets, including ones set back to their default
    fn apply(&mut self, file: ConfigFile) {
        set(&mut self.aur_only, file.aur_only);
        set(&mut self.use_git, file.use_git);
        set(&mut self.noconfirm, file.noconfirm);
        set(&mut self.debug, file.debug);
        set(&mut self.color, file.color);
        set(&mut self.cache_dir, file.cache_dir);
        set(&mut self.db_path, file.db_path);

        set(&mut self.aur.rpc_url, file.aur.rpc_url);
        set(&mut self.aur.base_url, file.aur.base_url);
        set(&mut self.aur.cache_size, file.aur.cache_size);

        set(&mut self.build.make_jobs, file.build.make_jobs);
        set(&mut self.build.disable_compression, file.build.disable_compression);
        set(&mut self.build.clean_after_install, file.build.clean_after_install);

        set(&mut self.logging.level, file.logging.level);
        if file.logging.file.is_some() {
            self.logging.file = file.logging.file;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("AURBOOST_CACHE_DIR") {
            self.cache_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("AURBOOST_DB_PATH") {
            self.db_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("AURBOOST_USE_GIT") {
            self.use_git = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("AURBOOST_NOCONFIRM") {
            self.noconfirm = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("AURBOOST_LOG_LEVEL") {
            self.logging.level = val;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.aur.rpc_url.trim().is_empty() {
            return Err(AurError::Config {
                message: "aur.rpc_url must not be empty".to_string(),
            });
        }
        if self.aur.base_url.trim().is_empty() {
            return Err(AurError::Config {
                message: "aur.base_url must not be empty".to_string(),
            });
        }
        if self.aur.cache_size == 0 {
            return Err(AurError::Config {
                message: "aur.cache_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the number of make jobs, auto-detecting if set to 0
    pub fn get_make_jobs(&self) -> usize {
        if self.build.make_jobs == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.build.make_jobs
        }
    }
}

/// One config file as written; absent keys stay `None`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    aur_only: Option<bool>,
    use_git: Option<bool>,
    noconfirm: Option<bool>,
    debug: Option<bool>,
    color: Option<bool>,
    cache_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    aur: AurFile,
    build: BuildFile,
    logging: LoggingFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AurFile {
    rpc_url: Option<String>,
    base_url: Option<String>,
    cache_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildFile {
    make_jobs: Option<usize>,
    disable_compression: Option<bool>,
    clean_after_install: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingFile {
    level: Option<String>,
    file: Option<PathBuf>,
}

fn parse_file(content: &str) -> Result<ConfigFile> {
    toml::from_str::<ConfigFile>(content).map_err(|e| AurError::Config {
        message: e.to_string(),
    })
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn parse_bool(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}
