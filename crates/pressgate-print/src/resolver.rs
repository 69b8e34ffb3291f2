// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device resolution: pick one reported device and the options to use for it.
//
// Rules, first match wins:
//   1. the configured default, if the OS reports it and it has a profile;
//   2. the first reported device (OS order) that has a profile;
//   3. the first reported device with the "default"/"generic" profile's
//      options, or no options;
//   4. nothing, when the OS reports no devices.

use serde::Serialize;
use tracing::debug;

use pressgate_core::types::{FALLBACK_PROFILE_NAMES, PrintOptions, RegistryState};

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionRule {
    ConfiguredDefault,
    ExactProfile,
    GenericFallback,
}

/// The device chosen for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub device_name: String,
    pub options: PrintOptions,
    pub rule: ResolutionRule,
}

/// Resolve a device from the OS-reported `available` names.
///
/// Returns `None` only when `available` is empty.
pub fn resolve(available: &[String], state: &RegistryState) -> Option<Resolution> {
    if let Some(default) = state.default_device_name.as_deref()
        && available.iter().any(|name| name == default)
        && let Some(profile) = state.profile(default)
    {
        debug!(device = default, "resolved configured default");
        return Some(Resolution {
            device_name: profile.name.clone(),
            options: profile.options.clone(),
            rule: ResolutionRule::ConfiguredDefault,
        });
    }

    if let Some(profile) = available.iter().find_map(|name| state.profile(name)) {
        debug!(device = %profile.name, "resolved exact profile match");
        return Some(Resolution {
            device_name: profile.name.clone(),
            options: profile.options.clone(),
            rule: ResolutionRule::ExactProfile,
        });
    }

    let first = available.first()?;
    let options = FALLBACK_PROFILE_NAMES
        .iter()
        .find_map(|name| state.profile(name))
        .map(|profile| profile.options.clone())
        .unwrap_or_default();
    debug!(device = %first, options = options.len(), "resolved generic fallback");
    Some(Resolution {
        device_name: first.clone(),
        options,
        rule: ResolutionRule::GenericFallback,
    })
}
