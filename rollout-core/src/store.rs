//! File-backed durable context store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.rollout/
//!   store/
//!     apps/<app>/contexts/<context_id>.json   (uploaded snapshots: mode 0600)
//!   apps/
//!     <app>/
//!       current.json                           (ContextRecord for the running context)
//! ```
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used by the daemon and by tests with `TempDir`
//! - [`load_current`]: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrapper; always use `_at`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::{AppName, Context};

/// The current context of an application and when it was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub context: Context,
    pub deployed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.rollout/`
pub fn rollout_root_at(home: &Path) -> PathBuf {
    home.join(".rollout")
}

/// `<home>/.rollout/apps/<app>/current.json`: pure, no I/O.
///
/// Rejects names that fail [`AppName::check`], so the path never leaves `apps/`.
pub fn current_path_at(home: &Path, app: &AppName) -> Result<PathBuf, StoreError> {
    app.check().map_err(|reason| StoreError::InvalidAppName {
        name: app.to_string(),
        reason,
    })?;
    Ok(rollout_root_at(home)
        .join("apps")
        .join(app.as_str())
        .join("current.json"))
}

/// `<home>/.rollout/store/<key>`.
///
/// Rejects absolute keys and keys containing `..`.
pub fn object_path_at(home: &Path, key: &str) -> Result<PathBuf, StoreError> {
    let relative = Path::new(key);
    let valid = !key.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !valid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(rollout_root_at(home).join("store").join(relative))
}

// ---------------------------------------------------------------------------
// 2. Upload (durable snapshot per accepted deploy)
// ---------------------------------------------------------------------------

/// Durably write `context` under `key`. Overwrites an existing object.
pub fn upload_at(home: &Path, context: &Context, key: &str) -> Result<PathBuf, StoreError> {
    let path = object_path_at(home, key)?;
    let json = serde_json::to_vec_pretty(context)?;
    write_atomic(&path, &json)?;
    Ok(path)
}

/// Load a previously uploaded snapshot.
pub fn load_uploaded_at(home: &Path, key: &str) -> Result<Context, StoreError> {
    let path = object_path_at(home, key)?;
    let contents = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_slice(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

// ---------------------------------------------------------------------------
// 3. Current context per application
// ---------------------------------------------------------------------------

/// Record `context` as the current context of its application.
pub fn save_current_at(home: &Path, context: &Context) -> Result<ContextRecord, StoreError> {
    let record = ContextRecord {
        context: context.clone(),
        deployed_at: Utc::now(),
    };
    let path = current_path_at(home, context.app_name())?;
    let json = serde_json::to_vec_pretty(&record)?;
    write_atomic(&path, &json)?;
    Ok(record)
}

/// Load the current context of `app`; `None` if it was never deployed.
pub fn load_current_at(home: &Path, app: &AppName) -> Result<Option<ContextRecord>, StoreError> {
    let path = current_path_at(home, app)?;
    let contents = match std::fs::read(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| StoreError::Parse { path, source: e })
}

/// `load_current_at` convenience wrapper.
pub fn load_current(app: &AppName) -> Result<Option<ContextRecord>, StoreError> {
    load_current_at(&home()?, app)
}

/// Names of every application with a recorded current context, sorted.
pub fn list_apps_at(home: &Path) -> Result<Vec<AppName>, StoreError> {
    let dir = rollout_root_at(home).join("apps");
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(&dir, err)),
    };
    let mut names: Vec<AppName> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().join("current.json").is_file())
        .map(|e| AppName::from(e.file_name().to_string_lossy().into_owned()))
        .filter(|name| name.check().is_ok())
        .collect();
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Write flow: create parent (0700) → `<name>.tmp` sibling → `chmod 0600` → `rename`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("path has no parent")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
