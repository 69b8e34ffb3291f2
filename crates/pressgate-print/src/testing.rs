// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory spooler for tests. Enabled in other crates via the
// `test-support` feature.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::PrintOptions;

use crate::spooler::PrintSpooler;

/// How the mock answers `submit_job`.
#[derive(Debug, Clone)]
pub enum SubmitBehaviour {
    Accept,
    Reject(String),
    /// Sleep before accepting; used to trip the submission timeout.
    Stall(Duration),
}

/// A job the mock was asked to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub path: PathBuf,
    pub device: String,
    pub options: PrintOptions,
    pub title: String,
}

#[derive(Default)]
struct Calls {
    submitted: Vec<SubmittedJob>,
    cancelled: Vec<String>,
    enabled: Vec<String>,
    /// Every call in arrival order, e.g. `submit Canon_A`, `cancel Canon_A`.
    events: Vec<String>,
}

pub struct MockSpooler {
    devices: Mutex<Vec<String>>,
    behaviour: Mutex<SubmitBehaviour>,
    broken: Mutex<HashSet<String>>,
    calls: Mutex<Calls>,
}

impl MockSpooler {
    pub fn new(devices: &[&str]) -> Self {
        Self {
            devices: Mutex::new(devices.iter().map(|d| d.to_string()).collect()),
            behaviour: Mutex::new(SubmitBehaviour::Accept),
            broken: Mutex::new(HashSet::new()),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn with_behaviour(self, behaviour: SubmitBehaviour) -> Self {
        *self.behaviour.lock().unwrap() = behaviour;
        self
    }

    /// Make `cancel_all` and `enable` fail for `device`.
    pub fn with_broken_device(self, device: &str) -> Self {
        self.broken.lock().unwrap().insert(device.to_string());
        self
    }

    /// Change how later `submit_job` calls behave.
    pub fn set_behaviour(&self, behaviour: SubmitBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn set_devices(&self, devices: &[&str]) {
        *self.devices.lock().unwrap() = devices.iter().map(|d| d.to_string()).collect();
    }

    pub fn submitted(&self) -> Vec<SubmittedJob> {
        self.calls.lock().unwrap().submitted.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.calls.lock().unwrap().cancelled.clone()
    }

    pub fn enabled(&self) -> Vec<String> {
        self.calls.lock().unwrap().enabled.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.calls.lock().unwrap().events.clone()
    }

    fn check_broken(&self, device: &str, op: &str) -> Result<()> {
        if self.broken.lock().unwrap().contains(device) {
            return Err(PressgateError::Spooler(format!("{op} {device}: device unreachable")));
        }
        Ok(())
    }
}

#[async_trait]
impl PrintSpooler for MockSpooler {
    async fn list_devices(&self) -> Result<Vec<String>> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn submit_job(
        &self,
        path: &Path,
        device: &str,
        options: &PrintOptions,
        title: &str,
    ) -> Result<String> {
        let behaviour = self.behaviour.lock().unwrap().clone();
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.submitted.push(SubmittedJob {
                path: path.to_path_buf(),
                device: device.to_string(),
                options: options.clone(),
                title: title.to_string(),
            });
            calls.events.push(format!("submit {device}"));
            calls.submitted.len()
        };
        match behaviour {
            SubmitBehaviour::Accept => Ok(format!("{device}-{count}")),
            SubmitBehaviour::Reject(reason) => Err(PressgateError::Spooler(reason)),
            SubmitBehaviour::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(format!("{device}-{count}"))
            }
        }
    }

    async fn cancel_all(&self, device: &str) -> Result<()> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.cancelled.push(device.to_string());
            calls.events.push(format!("cancel {device}"));
        }
        self.check_broken(device, "cancel")
    }

    async fn enable(&self, device: &str) -> Result<()> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.enabled.push(device.to_string());
            calls.events.push(format!("enable {device}"));
        }
        self.check_broken(device, "enable")
    }
}
