use std::process::Stdio;
use std::time::Duration;

use report_export_core::collaborators::ProcessExecutor;
use report_export_core::contract::{ExecutionFailure, ProcessInvocation};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Runs the report tool as a child process.
///
/// The invocation's environment entries are set on the child only; the
/// Lambda process environment is never modified.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandExecutor;

impl ProcessExecutor for CommandExecutor {
    fn run(&self, invocation: &ProcessInvocation) -> Result<Vec<u8>, ExecutionFailure> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (name, value) in &invocation.env {
            command.env(name, value.expose());
        }
        let program = invocation.program.display().to_string();
        let timeout = invocation.timeout;

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(run_command(command, program, timeout))
        })
    }
}

async fn run_command(
    mut command: Command,
    program: String,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, ExecutionFailure> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|error| {
        ExecutionFailure::new(format!("failed to start {program}: {error}"), Vec::new())
    })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // Buffers fill chunk by chunk, so an abandoned wait keeps what was read.
    let finished = async {
        let (status, _, _) = tokio::join!(
            child.wait(),
            drain(stdout_pipe, &mut stdout),
            drain(stderr_pipe, &mut stderr),
        );
        status
    };
    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, finished).await.ok(),
        None => Some(finished.await),
    };

    let Some(status) = waited else {
        // Already exited is fine; kill_on_drop covers the rest.
        let _ = child.kill().await;
        let limit_ms = timeout.map(|limit| limit.as_millis()).unwrap_or_default();
        return Err(ExecutionFailure::new(
            format!("{program} timed out after {limit_ms}ms"),
            combine(stdout, stderr),
        ));
    };

    let combined = combine(stdout, stderr);
    match status {
        Ok(status) if status.success() => Ok(combined),
        Ok(status) => Err(ExecutionFailure::new(status.to_string(), combined)),
        Err(error) => Err(ExecutionFailure::new(
            format!("failed to wait for {program}: {error}"),
            combined,
        )),
    }
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>, sink: &mut Vec<u8>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 8192];
    while let Ok(read) = pipe.read(&mut chunk).await {
        if read == 0 {
            break;
        }
        sink.extend_from_slice(&chunk[..read]);
    }
}

fn combine(mut stdout: Vec<u8>, stderr: Vec<u8>) -> Vec<u8> {
    stdout.extend_from_slice(&stderr);
    stdout
}
