// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS print-spooler binding.
//
// `PrintSpooler` is the seam between the engine and the host's spooler. The
// production implementation drives CUPS through its command-line tools:
//   - lpstat -e            list destinations
//   - lp -d <dev> ...      submit a file
//   - cancel -a <dev>      drop every queued job on a destination
//   - cupsenable <dev>     clear a "stopped after error" state

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::PrintOptions;

/// Default bound on a single spooler command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Operations the engine needs from the host print spooler.
#[async_trait]
pub trait PrintSpooler: Send + Sync {
    /// Names of the devices the spooler currently reports, in its order.
    async fn list_devices(&self) -> Result<Vec<String>>;

    /// Queue `path` on `device`. Returns the spooler-assigned job id.
    async fn submit_job(
        &self,
        path: &Path,
        device: &str,
        options: &PrintOptions,
        title: &str,
    ) -> Result<String>;

    /// Cancel every job queued on `device`.
    async fn cancel_all(&self, device: &str) -> Result<()>;

    /// Re-enable `device`.
    async fn enable(&self, device: &str) -> Result<()>;
}

/// CUPS binding using the standard client tools.
#[derive(Debug, Clone)]
pub struct CupsSpooler {
    command_timeout: Duration,
}

impl Default for CupsSpooler {
    fn default() -> Self {
        Self::new()
    }
}

impl CupsSpooler {
    pub fn new() -> Self {
        Self {
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run `program` with `args`, returning stdout on a zero exit status.
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, ?args, "running spooler command");
        let output = tokio::time::timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| {
                PressgateError::Spooler(format!(
                    "{program} did not finish within {}s",
                    self.command_timeout.as_secs()
                ))
            })?
            .map_err(|e| PressgateError::Spooler(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PressgateError::Spooler(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PrintSpooler for CupsSpooler {
    #[instrument(skip(self))]
    async fn list_devices(&self) -> Result<Vec<String>> {
        let stdout = self.run("lpstat", &["-e".to_string()]).await?;
        let devices = parse_device_list(&stdout);
        debug!(count = devices.len(), "devices reported");
        Ok(devices)
    }

    #[instrument(skip(self, options), fields(path = %path.display()))]
    async fn submit_job(
        &self,
        path: &Path,
        device: &str,
        options: &PrintOptions,
        title: &str,
    ) -> Result<String> {
        let mut args = vec![
            "-d".to_string(),
            device.to_string(),
            "-t".to_string(),
            title.to_string(),
        ];
        args.extend(option_args(options));
        args.push(path.display().to_string());

        let stdout = self.run("lp", &args).await?;
        match parse_job_id(&stdout) {
            Some(job_id) => {
                info!(job_id = %job_id, "job accepted by spooler");
                Ok(job_id)
            }
            None => {
                // lp exited cleanly, so the job is queued even without an id.
                warn!(output = stdout.trim(), "spooler printed no request id");
                Ok(format!("{device}-unknown"))
            }
        }
    }

    #[instrument(skip(self))]
    async fn cancel_all(&self, device: &str) -> Result<()> {
        self.run("cancel", &["-a".to_string(), device.to_string()])
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn enable(&self, device: &str) -> Result<()> {
        self.run("cupsenable", &[device.to_string()]).await.map(|_| ())
    }
}

/// `lpstat -e` prints one destination per line. Instances (`name/instance`)
/// are kept as-is because `lp -d` accepts them.
pub fn parse_device_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Extract `<id>` from `request id is <id> (1 file(s))`.
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let rest = stdout.split("request id is ").nth(1)?;
    rest.split_whitespace().next().map(String::from)
}

/// `-o key=value` pairs; empty values become bare `-o key` flags.
pub fn option_args(options: &PrintOptions) -> Vec<String> {
    options
        .iter()
        .flat_map(|(key, value)| {
            let opt = if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            };
            ["-o".to_string(), opt]
        })
        .collect()
}
