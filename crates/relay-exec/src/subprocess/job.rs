use std::{
    os::unix::process::ExitStatusExt,
    path::Path,
    process::{ExitStatus, Stdio},
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use relay_core::{
    job::{Job, JobContext, JobError},
    process::ProcessGroup,
};
use relay_model::{JobLimits, JobResult};
use tokio::{fs::File, process::Command};
use tracing::{debug, info, warn};

use crate::limits::attach_limits;
use crate::subprocess::{
    RETURN_CODE_SPAWN_FAILED, RETURN_CODE_TRANSFER_FAILED, STDERR_LOG, STDOUT_LOG,
    SUBPROCESS_JOB_TYPE, SubprocessSpec,
};

/// One external program run.
pub struct SubprocessJob {
    spec: SubprocessSpec,
    limits: JobLimits,
    /// Set once `run` starts; `terminate` signals it.
    group: Mutex<Option<ProcessGroup>>,
}

impl SubprocessJob {
    pub fn new(spec: SubprocessSpec, limits: JobLimits) -> Self {
        Self {
            spec,
            limits,
            group: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &SubprocessSpec {
        &self.spec
    }

    async fn fetch_inputs(&self, ctx: &JobContext) -> Result<(), String> {
        let downloader = ctx.downloader();
        for input in &self.spec.inputs {
            let local = ctx.workdir().join(&input.path);
            debug!(key = %input.key, path = %local.display(), "downloading input");
            downloader
                .download(&input.key, &local)
                .await
                .map_err(|e| format!("download of '{}' failed: {e}", input.key))?;
        }
        Ok(())
    }

    async fn store_outputs(&self, ctx: &JobContext, uploaded: &mut Vec<String>) -> Result<(), String> {
        let uploader = ctx.uploader();
        for output in &self.spec.outputs {
            let local = ctx.workdir().join(&output.path);
            debug!(key = %output.key, path = %local.display(), "uploading output");
            uploader
                .upload(&local, &output.key)
                .await
                .map_err(|e| format!("upload of {} failed: {e}", output.path.display()))?;
            uploaded.push(output.key.clone());
        }
        Ok(())
    }

    async fn command(&self, workdir: &Path) -> std::io::Result<Command> {
        let stdout = File::create(workdir.join(STDOUT_LOG)).await?.into_std().await;
        let stderr = File::create(workdir.join(STDERR_LOG)).await?.into_std().await;

        let mut cmd = Command::new(&self.spec.command);
        cmd.args(&self.spec.args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        for var in self.spec.env.iter() {
            cmd.env(&var.key, &var.value);
        }
        attach_limits(&mut cmd, &self.limits);
        Ok(cmd)
    }
}

#[async_trait]
impl Job for SubprocessJob {
    fn name(&self) -> &str {
        SUBPROCESS_JOB_TYPE
    }

    async fn run(&self, ctx: JobContext) -> Result<JobResult, JobError> {
        *self.group.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx.process_group().clone());

        if ctx.cancel_token().is_cancelled() {
            info!(command = %self.spec.command, "termination requested before start; program not started");
            return Ok(JobResult::terminated());
        }

        if let Err(reason) = self.fetch_inputs(&ctx).await {
            warn!(%reason, "input transfer failed; program not started");
            return Ok(failure(RETURN_CODE_TRANSFER_FAILED, reason));
        }
        if ctx.cancel_token().is_cancelled() {
            info!(command = %self.spec.command, "termination requested during input transfer; program not started");
            return Ok(JobResult::terminated());
        }

        let mut cmd = self.command(ctx.workdir()).await?;
        let mut child = match ctx.process_group().spawn(&mut cmd) {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %self.spec.command, error = %e, "spawn failed");
                return Ok(failure(
                    RETURN_CODE_SPAWN_FAILED,
                    format!("spawn of '{}' failed: {e}", self.spec.command),
                ));
            }
        };
        info!(
            command = %self.spec.command,
            args = ?self.spec.args,
            pid = ?child.id(),
            "subprocess started"
        );

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = ctx.cancel_token().cancelled() => None,
        };
        let status = match exited {
            Some(status) => status?,
            None => {
                // The group may not have been signalled yet when the token fired first.
                self.terminate();
                child.wait().await?
            }
        };
        let code = exit_code(status);
        info!(command = %self.spec.command, return_code = code, %status, "subprocess exited");

        let mut uploaded = Vec::new();
        if code == 0 {
            if let Err(reason) = self.store_outputs(&ctx, &mut uploaded).await {
                warn!(%reason, "output transfer failed");
                return Ok(failure(RETURN_CODE_TRANSFER_FAILED, reason).with_field("uploaded", uploaded));
            }
        }
        Ok(JobResult::with_return_code(code).with_field("uploaded", uploaded))
    }

    fn terminate(&self) {
        let group = self.group.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(group) = group else {
            debug!("terminate before start; nothing to signal");
            return;
        };
        match group.terminate() {
            Ok(true) => info!(pgid = ?group.id(), "sent SIGTERM to subprocess group"),
            Ok(false) => debug!("subprocess group already gone"),
            Err(e) => warn!(pgid = ?group.id(), error = %e, "failed to signal subprocess group"),
        }
    }
}

fn failure(code: i32, reason: String) -> JobResult {
    JobResult::with_return_code(code).with_field("error", reason)
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(relay_model::RETURN_CODE_INTERNAL_FAULT)
}
