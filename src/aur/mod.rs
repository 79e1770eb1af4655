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

//! AUR (Arch User Repository) support module.
//!
//! This module provides the AUR side of the install pipeline:
//! - RPC client with caching
//! - Source fetching (snapshot tarballs or git checkouts)
//! - Dependency resolution with cycle detection
//! - makepkg builds and pacman installs

pub mod builder;
pub mod client;
pub mod fetcher;
pub mod resolver;

pub use builder::{BuildTool, Installer, Makepkg};
pub use client::{lookup, AurClient, MetadataSource};
pub use fetcher::{GitTarFetcher, SourceFetcher};
pub use resolver::Resolver;

use serde::Deserialize;

use client::AurPackageInfo;

/// AUR RPC API response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct AurRpcResponse {
    #[serde(default)]
    pub version: u32,
    #[serde(rename = "type")]
    pub response_type: String,
    #[serde(default)]
    pub resultcount: usize,
    #[serde(default)]
    pub results: Vec<AurPackageInfo>,
    pub error: Option<String>,
}
