// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print engine: one entry point from "print this image" to a job outcome.
//
// Local mode:  fetch -> render -> list devices -> resolve -> submit -> cleanup
// Remote mode: forward the request to a gateway, which resolves on its side.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use pressgate_core::config::EngineConfig;
use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::{
    DeviceProfile, DispatchMode, ImageSource, JobResult, PrintRequest, RegistryState,
    SubmissionKey, SubmissionRequest,
};
use pressgate_document::FormatRenderer;

use crate::dispatch::LocalExecutor;
use crate::fetch::SourceFetcher;
use crate::gateway_client::GatewayClient;
use crate::ledger::SubmissionLedger;
use crate::registry::DeviceRegistry;
use crate::resolver::{Resolution, resolve};
use crate::spooler::PrintSpooler;
use crate::supervisor::{QueueSupervisor, ReconcileOutcome};

enum Transport {
    Local {
        executor: LocalExecutor,
        fetcher: SourceFetcher,
    },
    Remote(GatewayClient),
}

/// Entry point for printing: replays known submissions, renders, resolves a
/// device and submits, either locally or through a remote gateway.
///
/// Device administration (listing, profiles, reconciliation) always acts on
/// this host, whatever the dispatch mode.
pub struct PrintEngine {
    mode: DispatchMode,
    /// Where `print` sends work.
    transport: Transport,
    /// Durable profile and default-device store.
    registry: DeviceRegistry,
    /// Shared with blocking render tasks.
    renderer: Arc<FormatRenderer>,
    /// Host spooler used for device listing and reconciliation.
    spooler: Arc<dyn PrintSpooler>,
    /// Shares its per-device locks with the local executor.
    supervisor: Arc<QueueSupervisor>,
    /// Settled results keyed by submission key.
    ledger: SubmissionLedger,
    /// Run a reconcile pass over every device in `startup`.
    reconcile_on_start: bool,
}

impl PrintEngine {
    /// Build an engine for `config.mode`, using `spooler` for local devices.
    pub fn from_config(config: &EngineConfig, spooler: Arc<dyn PrintSpooler>) -> Result<Self> {
        config.validate()?;
        let supervisor = Arc::new(QueueSupervisor::new(Arc::clone(&spooler)));

        let transport = match config.mode {
            DispatchMode::Local => Transport::Local {
                executor: LocalExecutor::new(
                    Arc::clone(&spooler),
                    Arc::clone(&supervisor),
                    config.submit_timeout(),
                ),
                fetcher: SourceFetcher::new(config.http_timeout(), config.max_source_bytes)?,
            },
            DispatchMode::Remote => {
                let base_url = config.gateway.base_url.clone().ok_or_else(|| {
                    PressgateError::InvalidConfig("remote mode requires gateway.base_url".into())
                })?;
                Transport::Remote(GatewayClient::new(
                    base_url,
                    config.gateway.token.clone(),
                    config.http_timeout(),
                )?)
            }
        };

        info!(mode = %config.mode, registry = %config.registry_path.display(), "print engine ready");
        Ok(Self {
            mode: config.mode,
            transport,
            registry: DeviceRegistry::new(&config.registry_path),
            renderer: Arc::new(FormatRenderer::new(&config.render_dir)),
            spooler,
            supervisor,
            ledger: SubmissionLedger::default(),
            reconcile_on_start: config.reconcile_on_start,
        })
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn supervisor(&self) -> &QueueSupervisor {
        &self.supervisor
    }

    /// Start-up reconciliation of every reported device (local mode only).
    pub async fn startup(&self) -> Vec<ReconcileOutcome> {
        if self.mode != DispatchMode::Local || !self.reconcile_on_start {
            return Vec::new();
        }
        match self.supervisor.reconcile_all().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "start-up reconciliation skipped");
                Vec::new()
            }
        }
    }

    /// Print one image. A repeated submission key whose earlier attempt
    /// succeeded or timed out returns the recorded result.
    #[instrument(skip(self, request), fields(mode = %self.mode, hf = request.prefer_high_fidelity))]
    pub async fn print(&self, request: PrintRequest) -> JobResult {
        let key = request.submission_key.clone().unwrap_or_default();
        if let Some(previous) = self.ledger.lookup(&key) {
            info!(%key, "repeated submission key, returning recorded result");
            return previous;
        }

        let result = match &self.transport {
            Transport::Local { executor, fetcher } => {
                self.print_local(executor, fetcher, request, key).await
            }
            Transport::Remote(client) => client.submit(&request, &key).await,
        };

        if result.success {
            info!(device = ?result.device_name, job_id = ?result.job_id, "print accepted");
        } else {
            warn!(device = ?result.device_name, error = ?result.error_message, "print failed");
        }
        self.ledger.record(&result);
        result
    }

    async fn print_local(
        &self,
        executor: &LocalExecutor,
        fetcher: &SourceFetcher,
        request: PrintRequest,
        key: SubmissionKey,
    ) -> JobResult {
        let hf = request.prefer_high_fidelity;
        let fail = |device: Option<String>, err: PressgateError, key: SubmissionKey| {
            JobResult::failed(device, &err, hf, key)
        };

        let bytes = match request.source {
            ImageSource::Bytes(bytes) => bytes,
            ImageSource::Url(url) => match fetcher.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(e) => return fail(None, e, key),
            },
        };

        let renderer = Arc::clone(&self.renderer);
        let renditions = match tokio::task::spawn_blocking(move || renderer.render(&bytes)).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return fail(None, e, key),
            Err(e) => return fail(None, PressgateError::RenderFailure(e.to_string()), key),
        };

        let resolution = match self.preview_resolution().await {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                renditions.cleanup();
                return fail(None, PressgateError::NoDeviceAvailable, key);
            }
            Err(e) => {
                renditions.cleanup();
                return fail(None, e, key);
            }
        };
        info!(device = %resolution.device_name, rule = ?resolution.rule, "device resolved");

        let submission = SubmissionRequest {
            device_name: resolution.device_name,
            options: resolution.options,
            renditions: renditions.clone(),
            prefer_high_fidelity: hf,
            submission_key: key,
        };
        let result = executor.submit(submission).await;
        renditions.cleanup();
        result
    }

    /// Devices the local spooler currently reports.
    pub async fn available_devices(&self) -> Result<Vec<String>> {
        self.spooler.list_devices().await
    }

    /// What resolution would pick right now, without printing.
    pub async fn preview_resolution(&self) -> Result<Option<Resolution>> {
        let available = self.available_devices().await?;
        let state = self.registry_state().await;
        Ok(resolve(&available, &state))
    }

    /// Current registry contents.
    pub async fn registry_state(&self) -> RegistryState {
        let registry = self.registry.clone();
        match tokio::task::spawn_blocking(move || registry.load()).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "registry load task failed, using built-in default");
                RegistryState::builtin_default()
            }
        }
    }

    pub async fn upsert_profile(&self, profile: DeviceProfile) -> Result<RegistryState> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.upsert(profile))
            .await
            .map_err(|e| PressgateError::ConfigUnavailable(e.to_string()))?
    }

    pub async fn set_default_device(&self, name: String) -> Result<RegistryState> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.set_default(&name))
            .await
            .map_err(|e| PressgateError::ConfigUnavailable(e.to_string()))?
    }

    /// Reconcile `devices`, or every reported device when empty.
    pub async fn reconcile(&self, devices: &[String]) -> Result<Vec<ReconcileOutcome>> {
        if devices.is_empty() {
            self.supervisor.reconcile_all().await
        } else {
            Ok(self.supervisor.reconcile(devices).await)
        }
    }
}
