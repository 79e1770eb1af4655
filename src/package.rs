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

//! The package record passed between the client, resolver, builder and store.

/// A package as known to aurboost.
///
/// Only `name`, `version` and `source_url` are persisted; the remaining fields come
/// from AUR metadata and are used for display and dependency resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// `.git` for a checkout, `.tar.gz` for a snapshot
    pub source_url: String,

    pub description: Option<String>,
    pub maintainer: Option<String>,
    pub popularity: f64,
    pub votes: u32,
    /// Unix timestamp of the out-of-date flag
    pub out_of_date: Option<i64>,
    pub licenses: Vec<String>,
    /// Depends and MakeDepends merged, bare names, no duplicates
    pub depends: Vec<String>,
    pub installed: bool,
    /// Repository label ("aur", "core", "extra", ...)
    pub repository: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_url: source_url.into(),
            repository: "aur".to_string(),
            ..Default::default()
        }
    }

    /// Builder-style setter for dependencies
    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of the persisted fields only
    pub fn persisted(&self) -> Self {
        Self::new(&self.name, &self.version, &self.source_url)
    }

    /// Orphaned packages have no maintainer
    pub fn is_orphan(&self) -> bool {
        self.maintainer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_drops_display_fields() {
        let mut pkg = PackageRecord::new("foo", "1.0-1", "https://aur.archlinux.org/foo.git")
            .with_depends(["bar", "baz"]);
        pkg.description = Some("A foo".to_string());
        pkg.votes = 12;

        let stored = pkg.persisted();
        assert_eq!(stored.name, "foo");
        assert_eq!(stored.version, "1.0-1");
        assert!(stored.depends.is_empty());
        assert!(stored.description.is_none());
        assert_eq!(stored.votes, 0);
    }
}
