//! Client-local persisted state.
//!
//! Two small JSON files under `LIBRADMIN_HOME` stand in for the browser:
//! a cookie jar (`cookies.json`, entries with expiry and same-site policy)
//! and a local-storage map (`local_storage.json`, no expiry). Both are read
//! fresh on every access and rewritten whole, so the last writer wins.
//!
//! Files are written with restricted permissions (0600) since the jar holds
//! the bearer token.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::config::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

/// Attributes applied when a cookie is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieOptions {
    /// Lifetime from now; `None` keeps the cookie until removed.
    pub expires_in: Option<Duration>,
    pub same_site: SameSite,
}

impl CookieOptions {
    /// One day, strict same-site: the policy for session cookies.
    pub fn session_day() -> Self {
        Self {
            expires_in: Some(Duration::from_secs(24 * 60 * 60)),
            same_site: SameSite::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub same_site: SameSite,
}

impl StoredCookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| now >= at)
    }
}

/// File-backed cookie jar.
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Jar at the default location under `LIBRADMIN_HOME`.
    pub fn default_location() -> Self {
        Self::new(paths::cookies_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cookie value, or `None` when absent or expired.
    ///
    /// # Errors
    /// Returns an error if the jar exists but cannot be read or parsed.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let cookies: BTreeMap<String, StoredCookie> = load_map(&self.path)?;
        let now = Utc::now();
        Ok(cookies
            .get(name)
            .filter(|cookie| !cookie.is_expired_at(now))
            .map(|cookie| cookie.value.clone()))
    }

    /// Sets a cookie, dropping any expired entries while rewriting the jar.
    ///
    /// # Errors
    /// Returns an error if the jar cannot be read or written.
    pub fn set(&self, name: &str, value: &str, options: CookieOptions) -> Result<()> {
        let mut cookies: BTreeMap<String, StoredCookie> = load_map(&self.path)?;
        let now = Utc::now();
        cookies.retain(|_, cookie| !cookie.is_expired_at(now));

        let expires = options
            .expires_in
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);
        cookies.insert(
            name.to_string(),
            StoredCookie {
                value: value.to_string(),
                expires,
                same_site: options.same_site,
            },
        );
        save_map(&self.path, &cookies)
    }

    /// Removes a cookie. Returns true if it was present.
    ///
    /// # Errors
    /// Returns an error if the jar cannot be read or written.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut cookies: BTreeMap<String, StoredCookie> = load_map(&self.path)?;
        if cookies.remove(name).is_none() {
            return Ok(false);
        }
        save_map(&self.path, &cookies)?;
        Ok(true)
    }

    /// Deletes the whole jar, readable or not.
    ///
    /// # Errors
    /// Returns an error if the file exists and cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// File-backed string map with no expiry.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        Self::new(paths::local_storage_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns an error if the store exists but cannot be read or parsed.
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items: BTreeMap<String, String> = load_map(&self.path)?;
        Ok(items.get(key).cloned())
    }

    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items: BTreeMap<String, String> = load_map(&self.path)?;
        items.insert(key.to_string(), value.to_string());
        save_map(&self.path, &items)
    }

    /// Drops the whole store, including a file that no longer parses.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let mut items: BTreeMap<String, String> = load_map(&self.path)?;
        if items.remove(key).is_none() {
            return Ok(false);
        }
        save_map(&self.path, &items)?;
        Ok(true)
    }
}

fn load_map<V: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, V>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_map<V: Serialize>(path: &Path, map: &BTreeMap<String, V>) -> Result<()> {
    let contents = serde_json::to_string_pretty(map)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_private(path, &contents)
}

/// Writes `contents` to a sibling temp file with 0600 permissions on unix,
/// then renames it over `path` so readers never see a partial file.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp = temp_sibling(path);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)
            .with_context(|| format!("Failed to open {} for writing", tmp.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write to {}", tmp.display()))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write to {}", tmp.display()))?;
    }

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

/// Per-process temp name, so concurrent writers never share one.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_cookie_roundtrip_and_remove() {
        let dir = tempdir().unwrap();
        let jar = CookieJar::new(dir.path().join("cookies.json"));

        assert_eq!(jar.get("token").unwrap(), None);
        jar.set("token", "abc", CookieOptions::session_day()).unwrap();
        assert_eq!(jar.get("token").unwrap().as_deref(), Some("abc"));

        assert!(jar.remove("token").unwrap());
        assert!(!jar.remove("token").unwrap());
        assert_eq!(jar.get("token").unwrap(), None);
    }

    #[test]
    fn test_expired_cookie_reads_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(
            &path,
            r#"{"token":{"value":"old","expires":"2000-01-01T00:00:00Z","same_site":"Strict"}}"#,
        )
        .unwrap();

        let jar = CookieJar::new(&path);
        assert_eq!(jar.get("token").unwrap(), None);

        // Rewriting the jar drops the stale entry.
        jar.set("other", "x", CookieOptions::default()).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("old"));
    }

    #[test]
    fn test_session_cookie_expires_in_a_day() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let jar = CookieJar::new(&path);
        jar.set("token", "abc", CookieOptions::session_day()).unwrap();

        let stored: BTreeMap<String, StoredCookie> = load_map(&path).unwrap();
        let cookie = &stored["token"];
        assert_eq!(cookie.same_site, SameSite::Strict);
        let expires = cookie.expires.unwrap();
        let remaining = expires - Utc::now();
        assert!(remaining <= chrono::Duration::hours(24));
        assert!(remaining > chrono::Duration::hours(23));
    }

    #[test]
    fn test_local_storage_items() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested").join("ls.json"));

        assert_eq!(storage.get_item("loansOverdue").unwrap(), None);
        storage.set_item("loansOverdue", "[]").unwrap();
        storage.set_item("other", "1").unwrap();
        assert_eq!(storage.get_item("loansOverdue").unwrap().as_deref(), Some("[]"));
        assert!(storage.remove_item("other").unwrap());
        assert_eq!(storage.get_item("other").unwrap(), None);
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ls.json");
        fs::write(&path, "{not json").unwrap();

        let err = LocalStorage::new(&path).get_item("x").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn test_clear_drops_unparseable_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ls.json");
        fs::write(&path, r#"{"loansOverdue": "[]""#).unwrap();

        let storage = LocalStorage::new(&path);
        assert!(storage.set_item("loansOverdue", "[]").is_err());
        storage.clear().unwrap();
        storage.clear().unwrap();
        storage.set_item("loansOverdue", "[]").unwrap();
        assert_eq!(storage.get_item("loansOverdue").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("ls.json"));
        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ls.json".to_string()]);
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_cookie_jar_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        CookieJar::new(&path)
            .set("token", "abc", CookieOptions::session_day())
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
