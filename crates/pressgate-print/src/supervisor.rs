// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue supervisor: clears stuck spooler queues.
//
// For each device: cancel every queued job, then re-enable the device. Runs
// once at start-up for every reported device and again after any failed or
// timed-out local submission for just that device. Best-effort throughout:
// failures are logged and recorded, never propagated, and one broken device
// never stops the others from being reconciled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::DeviceState;

use crate::spooler::PrintSpooler;

/// What happened to one device during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub device: String,
    /// `Enabled` or `ReconcileFailed`.
    pub state: DeviceState,
    /// One entry per failed step, empty on success.
    pub errors: Vec<String>,
}

/// Cancels queued jobs and re-enables devices. Devices are handled
/// concurrently; the steps for one device never overlap.
pub struct QueueSupervisor {
    /// Spooler whose queues are flushed.
    spooler: Arc<dyn PrintSpooler>,
    /// Last known state per device name.
    states: Mutex<HashMap<String, DeviceState>>,
    /// Held while a device is reconciled or a job is handed to it, so a fresh
    /// job never races a queue flush on the same device.
    device_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl QueueSupervisor {
    pub fn new(spooler: Arc<dyn PrintSpooler>) -> Self {
        Self {
            spooler,
            states: Mutex::new(HashMap::new()),
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Last known state of `device`.
    pub fn state(&self, device: &str) -> DeviceState {
        self.states
            .lock()
            .map(|s| s.get(device).copied().unwrap_or(DeviceState::Unknown))
            .unwrap_or(DeviceState::Unknown)
    }

    /// Snapshot of every device the supervisor has touched.
    pub fn states(&self) -> HashMap<String, DeviceState> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub(crate) fn device_lock(&self, device: &str) -> Arc<tokio::sync::Mutex<()>> {
        match self.device_locks.lock() {
            Ok(mut locks) => Arc::clone(locks.entry(device.to_string()).or_default()),
            // A poisoned map only loses mutual exclusion, not correctness.
            Err(_) => Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Reconcile every device the spooler currently reports.
    pub async fn reconcile_all(&self) -> Result<Vec<ReconcileOutcome>> {
        let devices = self.spooler.list_devices().await?;
        if devices.is_empty() {
            info!("no devices reported, nothing to reconcile");
        }
        Ok(self.reconcile(&devices).await)
    }

    /// Reconcile `devices` concurrently.
    #[instrument(skip(self), fields(count = devices.len()))]
    pub async fn reconcile(&self, devices: &[String]) -> Vec<ReconcileOutcome> {
        let outcomes = join_all(devices.iter().map(|d| self.reconcile_device(d))).await;
        let failed = outcomes
            .iter()
            .filter(|o| o.state == DeviceState::ReconcileFailed)
            .count();
        info!(total = outcomes.len(), failed, "reconciliation pass finished");
        outcomes
    }

    async fn reconcile_device(&self, device: &str) -> ReconcileOutcome {
        let lock = self.device_lock(device);
        let _guard = lock.lock().await;
        self.reconcile_device_locked(device).await
    }

    /// Reconcile `device` when the caller already holds its device lock, so
    /// nothing queued on the lock can reach the device before the flush.
    pub(crate) async fn reconcile_device_locked(&self, device: &str) -> ReconcileOutcome {
        self.set_state(device, DeviceState::Reconciling);

        let mut errors = Vec::new();
        // Cancellation completes (or fails) before the device is re-enabled.
        if let Err(e) = self.spooler.cancel_all(device).await {
            errors.push(self.record_failure(device, "cancel", e));
        }
        if let Err(e) = self.spooler.enable(device).await {
            errors.push(self.record_failure(device, "enable", e));
        }

        let state = if errors.is_empty() {
            debug!(device, "device reconciled");
            DeviceState::Enabled
        } else {
            DeviceState::ReconcileFailed
        };
        self.set_state(device, state);
        ReconcileOutcome {
            device: device.to_string(),
            state,
            errors,
        }
    }

    fn record_failure(&self, device: &str, step: &str, err: PressgateError) -> String {
        let failure = PressgateError::ReconcileFailure {
            device: device.to_string(),
            detail: format!("{step}: {err}"),
        };
        warn!(error = %failure, "reconcile step failed");
        failure.to_string()
    }

    fn set_state(&self, device: &str, state: DeviceState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(device.to_string(), state);
        }
    }
}
