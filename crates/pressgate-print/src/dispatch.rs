// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local dispatch: hand a rendition to the OS spooler, bounded by a timeout.
//
// The spooler call runs as its own task and is raced against the submission
// timeout. When the timer wins the task is detached, not aborted: the job may
// still be accepted (and printed) later, which is why a timeout is reported as
// an uncertain failure and followed by a reconciliation pass on the device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use pressgate_core::error::PressgateError;
use pressgate_core::types::{JobResult, SubmissionRequest};

use crate::spooler::PrintSpooler;
use crate::supervisor::QueueSupervisor;

/// Submits jobs to the local spooler.
pub struct LocalExecutor {
    /// Spooler the jobs are handed to.
    spooler: Arc<dyn PrintSpooler>,
    /// Owns the per-device locks and runs the cleanup after a failure.
    supervisor: Arc<QueueSupervisor>,
    /// Total budget per submission, including the wait for the device lock.
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new(
        spooler: Arc<dyn PrintSpooler>,
        supervisor: Arc<QueueSupervisor>,
        timeout: Duration,
    ) -> Self {
        Self {
            spooler,
            supervisor,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit one job.
    ///
    /// The caller waits at most the submission timeout plus, on failure, one
    /// reconciliation pass. That pass runs while the device lock is still
    /// held, so no queued submission reaches the device before the flush.
    #[instrument(skip(self, request), fields(device = %request.device_name, key = %request.submission_key))]
    pub async fn submit(&self, request: SubmissionRequest) -> JobResult {
        let deadline = Instant::now() + self.timeout;
        let (path, high_fidelity_used) = request.source_path();
        let path = path.to_path_buf();
        if request.prefer_high_fidelity && !high_fidelity_used {
            info!("archival rendition missing, submitting fast rendition");
        }
        let device = request.device_name.clone();

        // Waits out any submission or reconciliation in flight on the device.
        let lock = self.supervisor.device_lock(&device);
        let guard = match tokio::time::timeout_at(deadline, lock.lock_owned()).await {
            Ok(guard) if Instant::now() < deadline => guard,
            // Nothing reached the spooler; whoever held the lock cleans up.
            _ => {
                let err = PressgateError::Spooler(format!(
                    "'{device}' stayed busy for {}s, job not submitted",
                    self.timeout.as_secs()
                ));
                warn!(error = %err, "device lock not acquired in time");
                return JobResult::failed(
                    Some(device),
                    &err,
                    request.prefer_high_fidelity,
                    request.submission_key,
                );
            }
        };

        let abandoned = Arc::new(AtomicBool::new(false));
        let task = {
            let spooler = Arc::clone(&self.spooler);
            let abandoned = Arc::clone(&abandoned);
            let device = device.clone();
            let options = request.options.clone();
            let title = request.job_title();
            tokio::spawn(async move {
                let result = spooler.submit_job(&path, &device, &options, &title).await;
                if abandoned.load(Ordering::Acquire) {
                    match &result {
                        Ok(job_id) => warn!(%device, %job_id, "spooler acknowledged after timeout"),
                        Err(e) => warn!(%device, error = %e, "spooler failed after timeout"),
                    }
                }
                result
            })
        };

        let outcome = match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(PressgateError::Spooler(format!(
                "submission task failed: {join_err}"
            ))),
            Err(_) => {
                abandoned.store(true, Ordering::Release);
                Err(PressgateError::SubmissionTimeout {
                    device: device.clone(),
                    after_secs: self.timeout.as_secs(),
                })
            }
        };

        match outcome {
            Ok(job_id) => {
                drop(guard);
                JobResult::accepted(
                    device,
                    job_id,
                    high_fidelity_used,
                    request.prefer_high_fidelity,
                    request.submission_key,
                )
            }
            Err(err) => {
                warn!(error = %err, "local submission failed, reconciling device");
                self.supervisor.reconcile_device_locked(&device).await;
                drop(guard);
                JobResult::failed(
                    Some(device),
                    &err,
                    request.prefer_high_fidelity,
                    request.submission_key,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pressgate_core::types::{
        FailureKind, PrintOptions, RenditionPair, SubmissionKey,
    };

    use super::*;
    use crate::testing::{MockSpooler, SubmitBehaviour};

    fn renditions(dir: &Path, with_archival: bool) -> RenditionPair {
        let pair = RenditionPair {
            token: "tok".into(),
            fast_path: dir.join("tok-fast.jpg"),
            archival_path: dir.join("tok-archival.png"),
        };
        std::fs::write(&pair.fast_path, b"jpeg").unwrap();
        if with_archival {
            std::fs::write(&pair.archival_path, b"png").unwrap();
        }
        pair
    }

    fn request(pair: RenditionPair, prefer_high_fidelity: bool) -> SubmissionRequest {
        let mut options = PrintOptions::new();
        options.insert("media".into(), "Postcard".into());
        SubmissionRequest {
            device_name: "Canon_A".into(),
            options,
            renditions: pair,
            prefer_high_fidelity,
            submission_key: SubmissionKey("k-1".into()),
        }
    }

    fn executor(spooler: Arc<MockSpooler>, timeout: Duration) -> LocalExecutor {
        let supervisor = Arc::new(QueueSupervisor::new(spooler.clone()));
        LocalExecutor::new(spooler, supervisor, timeout)
    }

    #[tokio::test]
    async fn accepted_job_uses_archival_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), true);
        let spooler = Arc::new(MockSpooler::new(&["Canon_A"]));
        let exec = executor(spooler.clone(), Duration::from_secs(5));

        let result = exec.submit(request(pair.clone(), true)).await;

        assert!(result.success);
        assert!(result.high_fidelity_used);
        assert_eq!(result.device_name.as_deref(), Some("Canon_A"));
        assert_eq!(result.job_id.as_deref(), Some("Canon_A-1"));
        let jobs = spooler.submitted();
        assert_eq!(jobs[0].path, pair.archival_path);
        assert_eq!(jobs[0].title, "pressgate-k-1");
        assert_eq!(jobs[0].options.get("media").map(String::as_str), Some("Postcard"));
        assert!(spooler.cancelled().is_empty());
    }

    #[tokio::test]
    async fn missing_archival_downgrades_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), false);
        let spooler = Arc::new(MockSpooler::new(&["Canon_A"]));
        let exec = executor(spooler.clone(), Duration::from_secs(5));

        let result = exec.submit(request(pair.clone(), true)).await;

        assert!(result.success);
        assert!(!result.high_fidelity_used);
        assert!(result.high_fidelity_requested);
        assert_eq!(spooler.submitted()[0].path, pair.fast_path);
    }

    #[tokio::test]
    async fn timeout_reports_uncertain_failure_and_reconciles_once() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), true);
        let spooler = Arc::new(
            MockSpooler::new(&["Canon_A"]).with_behaviour(SubmitBehaviour::Stall(Duration::from_secs(10))),
        );
        let exec = executor(spooler.clone(), Duration::from_millis(50));

        let result = exec.submit(request(pair, false)).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::SubmissionTimeout));
        assert_eq!(result.device_name.as_deref(), Some("Canon_A"));
        assert!(result.job_id.is_none());
        assert_eq!(spooler.cancelled(), vec!["Canon_A".to_string()]);
        assert_eq!(spooler.enabled(), vec!["Canon_A".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_stalled_submissions_each_return_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), true);
        let spooler = Arc::new(
            MockSpooler::new(&["Canon_A"]).with_behaviour(SubmitBehaviour::Stall(Duration::from_secs(10))),
        );
        let timeout = Duration::from_millis(300);
        let exec = executor(spooler.clone(), timeout);

        let attempts = (0..3).map(|_| {
            let req = request(pair.clone(), false);
            let exec = &exec;
            async move {
                let started = std::time::Instant::now();
                let result = exec.submit(req).await;
                (result, started.elapsed())
            }
        });
        let results = futures::future::join_all(attempts).await;

        for (result, elapsed) in &results {
            assert!(!result.success);
            assert!(
                *elapsed < timeout + Duration::from_millis(250),
                "caller waited {elapsed:?} with a {timeout:?} budget"
            );
        }
        // Every job that reached the device was flushed before the next one.
        let events = spooler.events();
        for pair in events.windows(2) {
            assert!(!(pair[0].starts_with("submit") && pair[1].starts_with("submit")), "{events:?}");
        }
        assert!(events.last().unwrap().starts_with("enable"));
    }

    #[tokio::test]
    async fn queued_submission_runs_after_the_flush() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), true);
        let spooler = Arc::new(
            MockSpooler::new(&["Canon_A"]).with_behaviour(SubmitBehaviour::Stall(Duration::from_secs(10))),
        );
        let exec = Arc::new(executor(spooler.clone(), Duration::from_millis(500)));

        let stalled = {
            let exec = Arc::clone(&exec);
            let req = request(pair.clone(), false);
            tokio::spawn(async move { exec.submit(req).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        spooler.set_behaviour(SubmitBehaviour::Accept);

        let queued = exec.submit(request(pair, false)).await;
        let stalled = stalled.await.unwrap();

        assert_eq!(stalled.failure, Some(FailureKind::SubmissionTimeout));
        assert!(queued.success, "{queued:?}");
        assert_eq!(
            spooler.events(),
            vec!["submit Canon_A", "cancel Canon_A", "enable Canon_A", "submit Canon_A"]
        );
    }

    #[tokio::test]
    async fn rejection_is_surfaced_with_device() {
        let dir = tempfile::tempdir().unwrap();
        let pair = renditions(dir.path(), true);
        let spooler = Arc::new(
            MockSpooler::new(&["Canon_A"])
                .with_behaviour(SubmitBehaviour::Reject("printer is disabled".into())),
        );
        let exec = executor(spooler.clone(), Duration::from_secs(5));

        let result = exec.submit(request(pair, true)).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::SubmissionFailed));
        assert!(result.error_message.unwrap().contains("printer is disabled"));
        assert!(result.high_fidelity_requested);
        assert_eq!(spooler.cancelled().len(), 1);
    }
}
