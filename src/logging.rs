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

//! Logging with tracing, plus the severity-prefixed messages shown to the user.

use console::style;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Initialize logging with optional file output
pub fn init(level: &str, debug: bool, log_file: Option<&Path>) {
    DEBUG.store(debug, Ordering::Relaxed);
    let level = if debug { "debug" } else { level };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact();

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);

            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init();
            return;
        }
    }

    // Fallback to console-only
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

/// Whether debug output was requested
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

pub fn error(msg: impl AsRef<str>) {
    eprintln!("{} {}", style("error:").red().bold(), msg.as_ref());
}

pub fn warning(msg: impl AsRef<str>) {
    eprintln!("{} {}", style("warning:").yellow().bold(), msg.as_ref());
}

pub fn info(msg: impl AsRef<str>) {
    println!("{} {}", style("::").cyan().bold(), msg.as_ref());
}

/// Printed only when debug output is enabled
pub fn debug(msg: impl AsRef<str>) {
    if debug_enabled() {
        eprintln!("{} {}", style("debug:").dim(), msg.as_ref());
    }
}

/// Indented step line under the current operation
pub fn step(msg: impl AsRef<str>) {
    println!("   {} {}", style("->").blue(), msg.as_ref());
}

/// Span creation helpers
#[macro_export]
macro_rules! span_operation {
    ($name:expr) => {
        tracing::info_span!("operation", name = $name)
    };
}

#[macro_export]
macro_rules! span_build {
    ($package:expr) => {
        tracing::info_span!("build", package = $package)
    };
}
