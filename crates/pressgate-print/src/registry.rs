// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device registry persisted as a single JSON document.
//
// Reads fail soft: a missing document is replaced by the built-in default and
// persisted, an unreadable one is logged and the built-in default is used in
// memory. Writes go to a sibling temp file which is synced and renamed over
// the target, so readers never observe a torn document.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::{DeviceProfile, REGISTRY_VERSION, RegistryState};

/// Handle on the registry document. Cheap to clone; holds no state besides
/// the path, so every `load` sees the latest saved document.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    path: PathBuf,
}

impl DeviceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state, materialising the built-in default on first
    /// run. Never fails.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> RegistryState {
        match self.read() {
            Ok(Some(state)) => {
                debug!(profiles = state.profiles.len(), "registry loaded");
                state
            }
            Ok(None) => {
                let mut state = RegistryState::builtin_default();
                match self.save(&mut state) {
                    Ok(()) => info!("registry created with built-in default"),
                    Err(e) => warn!(error = %e, "could not persist built-in registry"),
                }
                state
            }
            Err(e) => {
                warn!(error = %e, "using built-in registry");
                RegistryState::builtin_default()
            }
        }
    }

    /// Persist `state` atomically, refreshing its `last_updated` stamp.
    #[instrument(skip(self, state), fields(path = %self.path.display()))]
    pub fn save(&self, state: &mut RegistryState) -> Result<()> {
        state.version = REGISTRY_VERSION;
        state.last_updated = Utc::now();
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &bytes)?;
        debug!(profiles = state.profiles.len(), "registry saved");
        Ok(())
    }

    /// Insert or replace a profile by name and persist the result.
    ///
    /// Fails with `ConfigUnavailable` when the stored document cannot be
    /// read, leaving it untouched.
    pub fn upsert(&self, profile: DeviceProfile) -> Result<RegistryState> {
        let mut state = self.load_for_update()?;
        info!(name = %profile.name, priority = profile.priority, "upserting printer profile");
        state.upsert(profile);
        self.save(&mut state)?;
        Ok(state)
    }

    /// Point the default at `name` (unchecked) and persist the result.
    pub fn set_default(&self, name: &str) -> Result<RegistryState> {
        let mut state = self.load_for_update()?;
        if state.profile(name).is_none() {
            warn!(name, "default device has no matching profile");
        }
        state.set_default(name);
        self.save(&mut state)?;
        info!(name, "default device set");
        Ok(state)
    }

    /// Like `load`, but an unreadable document is an error rather than a
    /// fallback, so a mutation never overwrites configuration it could not see.
    fn load_for_update(&self) -> Result<RegistryState> {
        match self.read() {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(RegistryState::builtin_default()),
            Err(e) => {
                warn!(error = %e, "refusing to modify unreadable registry");
                Err(e)
            }
        }
    }

    fn read(&self) -> Result<Option<RegistryState>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PressgateError::ConfigUnavailable(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| PressgateError::ConfigUnavailable(format!("{}: {e}", self.path.display())))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry".into());
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let written = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_in(dir: &Path) -> DeviceRegistry {
        DeviceRegistry::new(dir.join("config").join("printers.json"))
    }

    #[test]
    fn first_load_persists_builtin_default() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());

        let state = registry.load();

        assert!(registry.path().exists());
        assert!(state.profile("generic").is_some());
        assert_eq!(state.default_device_name, None);
        assert_eq!(registry.load(), state);
    }

    #[test]
    fn corrupt_document_falls_back_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        std::fs::create_dir_all(registry.path().parent().unwrap()).unwrap();
        std::fs::write(registry.path(), b"{ not json").unwrap();

        let state = registry.load();

        assert!(state.profile("generic").is_some());
        // The corrupt file is left for an operator to inspect.
        assert_eq!(std::fs::read(registry.path()).unwrap(), b"{ not json");
    }

    #[test]
    fn mutations_never_overwrite_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        registry.upsert(DeviceProfile::new("Canon_A", "Canon A")).unwrap();
        registry.set_default("Canon_A").unwrap();

        // Truncate the document as a botched hand edit would.
        let raw = std::fs::read(registry.path()).unwrap();
        let damaged = &raw[..raw.len() - 2];
        std::fs::write(registry.path(), damaged).unwrap();

        let err = registry.upsert(DeviceProfile::new("Canon_B", "Canon B")).unwrap_err();
        assert!(matches!(err, PressgateError::ConfigUnavailable(_)));
        assert!(registry.set_default("Canon_B").is_err());

        assert_eq!(std::fs::read(registry.path()).unwrap(), damaged);
        // Reads still fall back.
        assert!(registry.load().profile("generic").is_some());
    }

    #[test]
    fn save_refreshes_last_updated() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        let mut state = registry.load();
        let before = state.last_updated;

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.save(&mut state).unwrap();

        assert!(state.last_updated > before);
        assert_eq!(registry.load().last_updated, state.last_updated);
    }

    #[test]
    fn upsert_and_set_default_persist() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());

        registry
            .upsert(DeviceProfile::new("Canon_A", "Canon A").with_priority(200))
            .unwrap();
        registry
            .upsert(
                DeviceProfile::new("Canon_A", "Canon A")
                    .with_priority(150)
                    .with_option("media", "Letter"),
            )
            .unwrap();
        registry.set_default("Canon_A").unwrap();

        let state = registry.load();
        assert_eq!(state.profiles.len(), 2);
        let a = state.profile("Canon_A").unwrap();
        assert_eq!(a.priority, 150);
        assert_eq!(a.options.get("media").map(String::as_str), Some("Letter"));
        assert_eq!(state.default_device_name.as_deref(), Some("Canon_A"));
    }

    #[test]
    fn set_default_accepts_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        let state = registry.set_default("NotConfigured").unwrap();
        assert_eq!(state.default_device_name.as_deref(), Some("NotConfigured"));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        registry.upsert(DeviceProfile::new("Canon_B", "B")).unwrap();
        let entries: Vec<_> = std::fs::read_dir(registry.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("printers.json")]);
    }
}
