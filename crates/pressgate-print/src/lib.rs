// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgate Print: device registry and resolution, spooler dispatch, remote
// gateway client, and queue supervision. `PrintEngine` ties them together.

pub mod dispatch;
pub mod engine;
pub mod fetch;
pub mod gateway_client;
pub mod ledger;
pub mod registry;
pub mod resolver;
pub mod spooler;
pub mod supervisor;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dispatch::LocalExecutor;
pub use engine::PrintEngine;
pub use fetch::SourceFetcher;
pub use gateway_client::GatewayClient;
pub use ledger::SubmissionLedger;
pub use registry::DeviceRegistry;
pub use resolver::{Resolution, ResolutionRule, resolve};
pub use spooler::{CupsSpooler, PrintSpooler};
pub use supervisor::{QueueSupervisor, ReconcileOutcome};
