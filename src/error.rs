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

//! Error taxonomy shared by the store, fetcher, resolver and update engine.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for aurboost operations
#[derive(Debug, Error)]
pub enum AurError {
    /// Record store file could not be opened, locked or written
    #[error("Storage error for '{}': {message}", .path.display())]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Transport failure talking to the AUR
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The AUR answered with an error-typed response
    #[error("AUR RPC error: {message}")]
    Remote { message: String },

    /// Tarball download or extraction failed
    #[error("Failed to fetch tarball {url}: {reason}")]
    TarFetch { url: String, reason: String },

    /// Clone or fetch of a git checkout failed
    #[error("Failed to fetch git source {url}: {reason}")]
    GitFetch { url: String, reason: String },

    /// Source URL is neither a tarball nor a git URL
    #[error("Unsupported source URL: {url}")]
    UnsupportedSource { url: String },

    /// makepkg failed or produced nothing
    #[error("Build failed for '{package}': {reason}")]
    BuildFailed {
        package: String,
        reason: String,
        exit_code: Option<i32>,
    },

    /// pacman refused the transaction
    #[error("Installation failed for '{package}': {reason}")]
    InstallFailed {
        package: String,
        reason: TransactionFailure,
    },

    /// AUR build dependencies form a cycle
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// Name not found in the AUR or the sync databases
    #[error("Package '{package}' not found")]
    PackageNotFound { package: String },

    /// End of input during a prompt, or an interrupt
    #[error("Aborted by user")]
    UserAbort,

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Other I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured reason reported by the package manager when a transaction fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFailure {
    InvalidArch,
    UnsatisfiedDeps,
    ConflictingDeps,
    FileConflicts,
    InvalidPackage,
    Other(String),
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionFailure::InvalidArch => write!(f, "package architecture is not valid"),
            TransactionFailure::UnsatisfiedDeps => write!(f, "could not satisfy dependencies"),
            TransactionFailure::ConflictingDeps => write!(f, "conflicting dependencies"),
            TransactionFailure::FileConflicts => write!(f, "conflicting files"),
            TransactionFailure::InvalidPackage => write!(f, "invalid or corrupted package"),
            TransactionFailure::Other(reason) => write!(f, "{}", reason),
        }
    }
}

impl TransactionFailure {
    /// Classify pacman's diagnostic output into a failure reason
    pub fn classify(output: &str) -> Self {
        let lower = output.to_lowercase();
        if lower.contains("invalid architecture") || lower.contains("is not valid for this architecture") {
            TransactionFailure::InvalidArch
        } else if lower.contains("unable to satisfy dependency") || lower.contains("could not satisfy dependencies") {
            TransactionFailure::UnsatisfiedDeps
        } else if lower.contains("conflicting dependencies") || lower.contains("are in conflict") {
            TransactionFailure::ConflictingDeps
        } else if lower.contains("conflicting files") || lower.contains("exists in filesystem") {
            TransactionFailure::FileConflicts
        } else if lower.contains("invalid or corrupted package") || lower.contains("corrupted") {
            TransactionFailure::InvalidPackage
        } else {
            let last = output
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown failure");
            TransactionFailure::Other(last.trim().to_string())
        }
    }
}

impl AurError {
    /// Errors that must stop the whole process rather than one package
    pub fn is_fatal(&self) -> bool {
        matches!(self, AurError::Storage { .. } | AurError::UserAbort)
    }

    /// Create a storage error
    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>, source: std::io::Error) -> Self {
        AurError::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a network error
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        AurError::Network {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for aurboost operations
pub type Result<T> = std::result::Result<T, AurError>;
