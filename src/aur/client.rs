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

//! AUR RPC API client with caching.

use lru::LruCache;
use serde::Deserialize;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use super::AurRpcResponse;
use crate::config::Config;
use crate::error::{AurError, Result};
use crate::package::PackageRecord;

/// AUR RPC supports up to 250 packages per info request
const BATCH_SIZE: usize = 250;

/// Cache entries valid for 5 minutes
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Anything that can answer AUR metadata queries
pub trait MetadataSource {
    /// Name search; an empty result is not an error
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>>;

    /// Info query for exactly one name
    fn fetch_one(&self, name: &str) -> Result<Option<PackageRecord>>;

    /// Batched info query. Unresolved names are silently missing from the result.
    fn fetch_many(&self, names: &[String]) -> Result<Vec<PackageRecord>>;
}

/// Treat an unreachable or misbehaving AUR as "no answer", with a warning.
/// Every other error is passed through.
pub fn lookup<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ (AurError::Network { .. } | AurError::Remote { .. })) => {
            crate::logging::warning(format!("AUR lookup failed: {}", e));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// AUR package information from RPC API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AurPackageInfo {
    pub name: String,
    #[serde(default)]
    pub package_base: Option<String>,
    pub version: String,
    pub description: Option<String>,
    #[serde(default)]
    pub num_votes: u32,
    #[serde(default)]
    pub popularity: f64,
    pub out_of_date: Option<i64>,
    pub maintainer: Option<String>,
    #[serde(rename = "URLPath")]
    pub url_path: Option<String>,

    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub make_depends: Vec<String>,
    #[serde(default)]
    pub license: Vec<String>,
}

impl AurPackageInfo {
    /// Depends followed by MakeDepends, bare names, first occurrence kept
    pub fn all_deps(&self) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for dep in self.depends.iter().chain(self.make_depends.iter()) {
            let (name, _) = parse_dependency(dep);
            if !name.is_empty() && !deps.contains(&name) {
                deps.push(name);
            }
        }
        deps
    }

    fn base(&self) -> &str {
        self.package_base.as_deref().unwrap_or(&self.name)
    }

    /// Canonical source URL: git clone URL or snapshot tarball
    pub fn source_url(&self, base_url: &str, use_git: bool) -> String {
        let base_url = base_url.trim_end_matches('/');
        if use_git {
            return format!("{}/{}.git", base_url, self.base());
        }
        match &self.url_path {
            Some(path) if !path.is_empty() => format!("{}{}", base_url, path),
            _ => format!("{}/cgit/aur.git/snapshot/{}.tar.gz", base_url, self.base()),
        }
    }

    pub fn into_record(self, base_url: &str, use_git: bool) -> PackageRecord {
        let source_url = self.source_url(base_url, use_git);
        let depends = self.all_deps();
        PackageRecord {
            description: self.description,
            maintainer: self.maintainer,
            popularity: self.popularity,
            votes: self.num_votes,
            out_of_date: self.out_of_date,
            licenses: self.license,
            ..PackageRecord::new(self.name, self.version, source_url).with_depends(depends)
        }
    }
}

/// Blocking AUR RPC client with an in-memory info cache
pub struct AurClient {
    agent: ureq::Agent,
    rpc_url: String,
    base_url: String,
    use_git: bool,
    cache: RefCell<LruCache<String, CacheEntry>>,
}

#[derive(Clone)]
struct CacheEntry {
    record: PackageRecord,
    cached_at: Instant,
}

impl AurClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_config(
            config.aur.rpc_url.clone(),
            config.aur.base_url.clone(),
            config.use_git,
            config.aur.cache_size,
        )
    }

    /// Create a new AUR client with custom settings
    pub fn with_config(rpc_url: String, base_url: String, use_git: bool, cache_size: usize) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("aurboost/", env!("CARGO_PKG_VERSION")))
            .build();
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Self {
            agent,
            rpc_url,
            base_url,
            use_git,
            cache: RefCell::new(LruCache::new(cache_size)),
        }
    }

    fn request(&self, url: &str) -> Result<Vec<PackageRecord>> {
        tracing::debug!("GET {}", url);
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => AurError::network(url, format!("HTTP {}", code)),
            ureq::Error::Transport(t) => AurError::network(url, t.to_string()),
        })?;
        let body = response
            .into_string()
            .map_err(|e| AurError::network(url, e.to_string()))?;
        parse_response(&body, &self.base_url, self.use_git)
    }

    fn cached(&self, name: &str) -> Option<PackageRecord> {
        let cache = self.cache.borrow();
        cache
            .peek(name)
            .filter(|entry| entry.cached_at.elapsed() < CACHE_TTL)
            .map(|entry| entry.record.clone())
    }

    fn remember(&self, records: &[PackageRecord]) {
        let mut cache = self.cache.borrow_mut();
        for record in records {
            cache.put(
                record.name.clone(),
                CacheEntry {
                    record: record.clone(),
                    cached_at: Instant::now(),
                },
            );
        }
    }

    #[cfg(test)]
    fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl MetadataSource for AurClient {
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        let url = format!(
            "{}?v=5&type=search&by=name&arg={}",
            self.rpc_url,
            urlencoding::encode(query)
        );
        self.request(&url)
    }

    fn fetch_one(&self, name: &str) -> Result<Option<PackageRecord>> {
        let results = self.fetch_many(&[name.to_string()])?;
        Ok(results.into_iter().find(|r| r.name == name))
    }

    fn fetch_many(&self, names: &[String]) -> Result<Vec<PackageRecord>> {
        if names.is_empty() {
            return Ok(vec![]);
        }

        let mut all_results = Vec::new();
        let mut to_fetch = Vec::new();
        for name in names {
            match self.cached(name) {
                Some(record) => all_results.push(record),
                None => to_fetch.push(name.clone()),
            }
        }

        for chunk in to_fetch.chunks(BATCH_SIZE) {
            let args: Vec<String> = chunk
                .iter()
                .map(|n| format!("arg[]={}", urlencoding::encode(n)))
                .collect();
            let url = format!("{}?v=5&type=info&{}", self.rpc_url, args.join("&"));

            let results = self.request(&url)?;
            self.remember(&results);
            all_results.extend(results);
        }

        Ok(all_results)
    }
}

/// Decode an RPC response body into records
pub fn parse_response(body: &str, base_url: &str, use_git: bool) -> Result<Vec<PackageRecord>> {
    let response: AurRpcResponse = serde_json::from_str(body).map_err(|e| AurError::Remote {
        message: format!("malformed response: {}", e),
    })?;

    tracing::debug!("RPC v{} {} reply with {} result(s)", response.version, response.response_type, response.resultcount);
    if response.response_type == "error" || response.error.is_some() {
        return Err(AurError::Remote {
            message: response.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    Ok(response
        .results
        .into_iter()
        .map(|info| info.into_record(base_url, use_git))
        .collect())
}

/// Parse dependency string into name and optional version constraint
pub fn parse_dependency(dep: &str) -> (String, Option<String>) {
    // Dependencies can be in format: name, name>=version, name=version, etc.
    let dep = dep.trim();

    for op in &[">=", "<=", "=", ">", "<"] {
        if let Some(pos) = dep.find(op) {
            let name = dep[..pos].to_string();
            let version = dep[pos..].to_string();
            return (name, Some(version));
        }
    }

    // Optional-dependency style description (name: reason)
    if let Some(pos) = dep.find(':') {
        let name = dep[..pos].trim().to_string();
        return (name, None);
    }

    (dep.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://aur.archlinux.org";

    const INFO_BODY: &str = r#"{
        "version": 5,
        "type": "multiinfo",
        "resultcount": 1,
        "results": [{
            "ID": 1,
            "Name": "yay",
            "PackageBase": "yay",
            "PackageBaseID": 1,
            "Version": "12.3.5-1",
            "Description": "Yet another yogurt",
            "NumVotes": 2000,
            "Popularity": 35.5,
            "OutOfDate": null,
            "Maintainer": "jguer",
            "URLPath": "/cgit/aur.git/snapshot/yay.tar.gz",
            "Depends": ["pacman>6.1", "git"],
            "MakeDepends": ["go>=2:1.21", "git"],
            "License": ["GPL-3.0-or-later"]
        }]
    }"#;

    #[test]
    fn test_parse_dependency() {
        let (name, version) = parse_dependency("gcc");
        assert_eq!(name, "gcc");
        assert!(version.is_none());

        let (name, version) = parse_dependency("python>=3.10");
        assert_eq!(name, "python");
        assert_eq!(version.unwrap(), ">=3.10");

        let (name, version) = parse_dependency("rust=1.70.0");
        assert_eq!(name, "rust");
        assert_eq!(version.unwrap(), "=1.70.0");
    }

    #[test]
    fn test_parse_info_response() {
        let records = parse_response(INFO_BODY, BASE, false).unwrap();
        assert_eq!(records.len(), 1);
        let yay = &records[0];
        assert_eq!(yay.name, "yay");
        assert_eq!(yay.version, "12.3.5-1");
        assert_eq!(yay.source_url, "https://aur.archlinux.org/cgit/aur.git/snapshot/yay.tar.gz");
        assert_eq!(yay.votes, 2000);
        assert_eq!(yay.maintainer.as_deref(), Some("jguer"));
        assert_eq!(yay.licenses, vec!["GPL-3.0-or-later".to_string()]);
    }

    #[test]
    fn test_dependencies_merged_and_deduplicated() {
        let records = parse_response(INFO_BODY, BASE, false).unwrap();
        assert_eq!(
            records[0].depends,
            vec!["pacman".to_string(), "git".to_string(), "go".to_string()]
        );
    }

    #[test]
    fn test_git_source_url() {
        let records = parse_response(INFO_BODY, BASE, true).unwrap();
        assert_eq!(records[0].source_url, "https://aur.archlinux.org/yay.git");
    }

    #[test]
    fn test_empty_search_is_ok() {
        let body = r#"{"version":5,"type":"search","resultcount":0,"results":[]}"#;
        assert!(parse_response(body, BASE, false).unwrap().is_empty());
    }

    #[test]
    fn test_error_response() {
        let body = r#"{"version":5,"type":"error","resultcount":0,"results":[],"error":"Too many package results."}"#;
        match parse_response(body, BASE, false) {
            Err(AurError::Remote { message }) => assert_eq!(message, "Too many package results."),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_response() {
        assert!(matches!(
            parse_response("<html>", BASE, false),
            Err(AurError::Remote { .. })
        ));
    }

    #[test]
    fn test_cached_lookup_skips_network() {
        // Unroutable endpoint: any request would fail
        let client = AurClient::with_config("http://127.0.0.1:9/rpc/".to_string(), BASE.to_string(), false, 8);
        client.remember(&[PackageRecord::new("foo", "1.0", "https://aur.archlinux.org/foo.git")]);

        let found = client.fetch_one("foo").unwrap();
        assert_eq!(found.unwrap().version, "1.0");

        client.clear_cache();
        assert!(matches!(client.fetch_one("foo"), Err(AurError::Network { .. })));
    }

    #[test]
    fn test_lookup_swallows_only_remote_failures() {
        let offline: Result<Vec<PackageRecord>> = Err(AurError::network(BASE, "timed out"));
        assert_eq!(lookup(offline).unwrap(), None);

        let abort: Result<Vec<PackageRecord>> = Err(AurError::UserAbort);
        assert!(lookup(abort).is_err());

        assert_eq!(lookup(Ok(3)).unwrap(), Some(3));
    }
}
