// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pressgate print engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PressgateError;

/// Vendor print options for one device, passed to the spooler as-is.
///
/// There is no shared schema and no inheritance between profiles: a profile
/// that wants a shared default carries its own copy of it.
pub type PrintOptions = BTreeMap<String, String>;

/// Current version of the persisted registry document.
pub const REGISTRY_VERSION: u32 = 1;

/// Profile names consulted, in order, when no configured device is present.
pub const FALLBACK_PROFILE_NAMES: [&str; 2] = ["default", "generic"];

/// A named printer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    /// Unique key; matched against the device names the OS reports.
    pub name: String,
    pub display_name: String,
    /// Higher priority wins ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub options: PrintOptions,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            priority: 0,
            options: PrintOptions::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// The persisted device registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryState {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    /// May dangle; resolution falls through when it does.
    #[serde(default)]
    pub default_device_name: Option<String>,
    #[serde(default)]
    pub profiles: Vec<DeviceProfile>,
}

impl RegistryState {
    /// The state materialised on first run or when the stored document is
    /// unreadable. Always carries a generic profile so resolution has a
    /// fallback option set.
    pub fn builtin_default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            last_updated: Utc::now(),
            default_device_name: None,
            profiles: vec![
                DeviceProfile::new("generic", "Generic printer").with_option("fit-to-page", "true"),
            ],
        }
    }

    /// Look up a profile by its exact name.
    pub fn profile(&self, name: &str) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Insert the profile, or replace the one with the same name in place.
    pub fn upsert(&mut self, profile: DeviceProfile) {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    /// Point the default at `name`. Existence is not checked.
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_device_name = Some(name.into());
    }

    /// Profiles ordered highest priority first, then by name.
    pub fn profiles_by_priority(&self) -> Vec<&DeviceProfile> {
        let mut sorted: Vec<&DeviceProfile> = self.profiles.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        sorted
    }
}

/// Client-generated key identifying one logical print submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionKey(pub String);

impl SubmissionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubmissionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the image to print comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Url(String),
}

/// A caller's "print this" request.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub source: ImageSource,
    pub prefer_high_fidelity: bool,
    /// Supplied by callers that retry; generated otherwise.
    pub submission_key: Option<SubmissionKey>,
}

impl PrintRequest {
    pub fn new(source: ImageSource, prefer_high_fidelity: bool) -> Self {
        Self {
            source,
            prefer_high_fidelity,
            submission_key: None,
        }
    }

    pub fn with_key(mut self, key: SubmissionKey) -> Self {
        self.submission_key = Some(key);
        self
    }
}

/// Two renditions of one source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionPair {
    /// Uniqueness token shared by both file names.
    pub token: String,
    pub fast_path: PathBuf,
    pub archival_path: PathBuf,
}

impl RenditionPair {
    /// Remove both rendered files. Missing files are not an error.
    pub fn cleanup(&self) {
        for path in [&self.fast_path, &self.archival_path] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "rendition removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove rendition"),
            }
        }
    }
}

/// Everything the local executor needs to hand one job to the spooler.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    /// Resolved device the job is submitted to.
    pub device_name: String,
    /// Spooler options from the resolved profile, passed as `-o key=value`.
    pub options: PrintOptions,
    pub renditions: RenditionPair,
    /// Submit the archival rendition when it exists on disk.
    pub prefer_high_fidelity: bool,
    /// Carried into the job title so a retried job can be recognised.
    pub submission_key: SubmissionKey,
}

impl SubmissionRequest {
    /// Pick the file to submit and report whether it is the archival one.
    ///
    /// A requested archival rendition that is missing on disk downgrades to
    /// the fast rendition.
    pub fn source_path(&self) -> (&Path, bool) {
        if self.prefer_high_fidelity && self.renditions.archival_path.exists() {
            (&self.renditions.archival_path, true)
        } else {
            (&self.renditions.fast_path, false)
        }
    }

    /// Title attached to the spooler job so duplicates are recognisable.
    pub fn job_title(&self) -> String {
        format!("pressgate-{}", self.submission_key)
    }
}

/// Why a print attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    NoDeviceAvailable,
    SourceUnavailable,
    RenderFailure,
    /// Outcome unknown: the device may still print the job.
    SubmissionTimeout,
    SubmissionFailed,
    TransportFailure,
}

/// Outcome of one print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// True only when the spooler acknowledged the job.
    pub success: bool,
    /// Device the job went to (or was attempted on). `None` when resolution
    /// found nothing or the request failed before resolving.
    pub device_name: Option<String>,
    /// Spooler job id; set only on success.
    pub job_id: Option<String>,
    /// Whether the archival rendition was the one submitted.
    pub high_fidelity_used: bool,
    pub high_fidelity_requested: bool,
    pub error_message: Option<String>,
    /// Failure category; `None` on success.
    pub failure: Option<FailureKind>,
    /// Key this result is recorded under for replay.
    pub submission_key: SubmissionKey,
}

impl JobResult {
    pub fn accepted(
        device_name: impl Into<String>,
        job_id: impl Into<String>,
        high_fidelity_used: bool,
        high_fidelity_requested: bool,
        submission_key: SubmissionKey,
    ) -> Self {
        Self {
            success: true,
            device_name: Some(device_name.into()),
            job_id: Some(job_id.into()),
            high_fidelity_used,
            high_fidelity_requested,
            error_message: None,
            failure: None,
            submission_key,
        }
    }

    pub fn failed(
        device_name: Option<String>,
        err: &PressgateError,
        high_fidelity_requested: bool,
        submission_key: SubmissionKey,
    ) -> Self {
        Self {
            success: false,
            device_name,
            job_id: None,
            high_fidelity_used: false,
            high_fidelity_requested,
            error_message: Some(err.to_string()),
            failure: Some(err.failure_kind()),
            submission_key,
        }
    }

    /// Whether the outcome should be replayed for a repeated submission key
    /// rather than attempted again.
    pub fn is_settled(&self) -> bool {
        self.success || self.failure == Some(FailureKind::SubmissionTimeout)
    }
}

/// How submissions leave this process. Chosen once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Hand jobs to the OS print spooler on this host.
    Local,
    /// Forward jobs to a print gateway over HTTP.
    Remote,
}

impl std::str::FromStr for DispatchMode {
    type Err = PressgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(PressgateError::InvalidConfig(format!(
                "unknown dispatch mode '{other}' (expected 'local' or 'remote')"
            ))),
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// A device as seen by the queue supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceState {
    Unknown,
    Reconciling,
    Enabled,
    /// Not terminal: the next pass retries.
    ReconcileFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_in(dir: &Path) -> RenditionPair {
        RenditionPair {
            token: "t".into(),
            fast_path: dir.join("t-fast.jpg"),
            archival_path: dir.join("t-archival.png"),
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut state = RegistryState::builtin_default();
        state.upsert(DeviceProfile::new("Canon_A", "Canon A").with_priority(100));
        state.upsert(DeviceProfile::new("Canon_B", "Canon B"));
        state.upsert(DeviceProfile::new("Canon_A", "Canon A (lobby)").with_priority(200));

        assert_eq!(state.profiles.len(), 3);
        let a = state.profile("Canon_A").unwrap();
        assert_eq!(a.display_name, "Canon A (lobby)");
        assert_eq!(a.priority, 200);
        // Position is preserved.
        assert_eq!(state.profiles[1].name, "Canon_A");
    }

    #[test]
    fn profiles_sorted_by_priority() {
        let mut state = RegistryState::builtin_default();
        state.upsert(DeviceProfile::new("Canon_B", "B").with_priority(100));
        state.upsert(DeviceProfile::new("Canon_A", "A").with_priority(200));
        let names: Vec<&str> = state
            .profiles_by_priority()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["Canon_A", "Canon_B", "generic"]);
    }

    #[test]
    fn registry_document_uses_camel_case() {
        let mut state = RegistryState::builtin_default();
        state.set_default("Canon_A");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["defaultDeviceName"], "Canon_A");
        assert!(json["lastUpdated"].is_string());
        assert_eq!(json["profiles"][0]["displayName"], "Generic printer");
        assert_eq!(json["profiles"][0]["options"]["fit-to-page"], "true");
    }

    #[test]
    fn missing_archival_downgrades_to_fast() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair_in(dir.path());
        std::fs::write(&pair.fast_path, b"jpeg").unwrap();

        let request = SubmissionRequest {
            device_name: "Canon_A".into(),
            options: PrintOptions::new(),
            renditions: pair.clone(),
            prefer_high_fidelity: true,
            submission_key: SubmissionKey::new(),
        };
        let (path, high) = request.source_path();
        assert_eq!(path, pair.fast_path.as_path());
        assert!(!high);

        std::fs::write(&pair.archival_path, b"png").unwrap();
        let (path, high) = request.source_path();
        assert_eq!(path, pair.archival_path.as_path());
        assert!(high);
    }

    #[test]
    fn cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair_in(dir.path());
        std::fs::write(&pair.fast_path, b"jpeg").unwrap();
        pair.cleanup();
        assert!(!pair.fast_path.exists());
        assert!(!pair.archival_path.exists());
    }

    #[test]
    fn dispatch_mode_parses_case_insensitively() {
        assert_eq!("Remote".parse::<DispatchMode>().unwrap(), DispatchMode::Remote);
        assert_eq!(" local ".parse::<DispatchMode>().unwrap(), DispatchMode::Local);
        assert!("cloud".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn timeout_results_are_settled() {
        let key = SubmissionKey::new();
        let timeout = PressgateError::SubmissionTimeout {
            device: "Canon_A".into(),
            after_secs: 30,
        };
        assert!(JobResult::failed(Some("Canon_A".into()), &timeout, false, key.clone()).is_settled());
        assert!(!JobResult::failed(None, &PressgateError::NoDeviceAvailable, false, key).is_settled());
    }
}
