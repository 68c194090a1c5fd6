use std::{
    ffi::OsStr,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::process::{Child, Command};

use crate::{error_code::ErrorCode, future::WithTimeout};

struct MetricsGuard {
    start: Instant,
    armed: bool,
    command: Arc<str>,
}

impl MetricsGuard {
    fn guard(command: Arc<str>) -> Self {
        metrics::counter!(crate::init_metrics::PROCESS_START, "command" => command.to_string())
            .increment(1);

        Self {
            start: Instant::now(),
            armed: true,
            command,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        metrics::histogram!(
            crate::init_metrics::PROCESS_DURATION,
            "command" => self.command.to_string(),
            "completed" => (!self.armed).to_string(),
        )
        .record(self.start.elapsed().as_secs_f64());

        metrics::counter!(
            crate::init_metrics::PROCESS_END,
            "completed" => (!self.armed).to_string(),
            "command" => self.command.to_string(),
        )
        .increment(1);
    }
}

pub(crate) struct Process {
    command: Arc<str>,
    child: Child,
    guard: MetricsGuard,
    timeout: Duration,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("command", &self.command)
            .field("child", &"Child")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessError {
    #[error("Required command {0} not found, make sure it exists in tubely's $PATH")]
    NotFound(String),

    #[error("Cannot run command {0} due to invalid permissions on binary, make sure the tubely user has permission to run it")]
    PermissionDenied(String),

    #[error("Reached process spawn limit")]
    LimitReached,

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0} Failed with {1}")]
    Status(String, ExitStatus),

    #[error("Unknown process error")]
    Other(#[source] std::io::Error),
}

impl ProcessError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::COMMAND_NOT_FOUND,
            Self::PermissionDenied(_) => ErrorCode::COMMAND_PERMISSION_DENIED,
            Self::LimitReached | Self::Other(_) => ErrorCode::COMMAND_ERROR,
            Self::Timeout(_) => ErrorCode::COMMAND_TIMEOUT,
            Self::Status(_, _) => ErrorCode::COMMAND_FAILURE,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        // the tool ran and rejected the input
        matches!(self, Self::Status(_, _))
    }
}

impl Process {
    pub(crate) fn run<T>(command: &str, args: &[T], timeout: u64) -> Result<Self, ProcessError>
    where
        T: AsRef<OsStr>,
    {
        let res = tracing::trace_span!(parent: None, "Create command", %command)
            .in_scope(|| Self::spawn(command, Command::new(command).args(args), timeout));

        match res {
            Ok(this) => Ok(this),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Err(ProcessError::NotFound(command.to_string())),
                std::io::ErrorKind::PermissionDenied => {
                    Err(ProcessError::PermissionDenied(command.to_string()))
                }
                std::io::ErrorKind::WouldBlock => Err(ProcessError::LimitReached),
                _ => Err(ProcessError::Other(e)),
            },
        }
    }

    fn spawn(command: &str, cmd: &mut Command, timeout: u64) -> std::io::Result<Self> {
        tracing::trace_span!(parent: None, "Spawn command", %command).in_scope(|| {
            let command: Arc<str> = Arc::from(command);
            let guard = MetricsGuard::guard(command.clone());

            let cmd = cmd
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            cmd.spawn().map(|child| Process {
                command,
                child,
                guard,
                timeout: Duration::from_secs(timeout),
            })
        })
    }

    #[tracing::instrument(skip(self), fields(command = %self.command))]
    pub(crate) async fn wait(self) -> Result<(), ProcessError> {
        self.output().await.map(|_| ())
    }

    /// Wait for the process to exit and collect everything it wrote to stdout
    ///
    /// The child is killed if it outlives the configured timeout
    #[tracing::instrument(skip(self), fields(command = %self.command))]
    pub(crate) async fn output(self) -> Result<Vec<u8>, ProcessError> {
        let Process {
            command,
            child,
            guard,
            timeout,
        } = self;

        match child.wait_with_output().with_timeout(timeout).await {
            Ok(Ok(output)) if output.status.success() => {
                guard.disarm();

                Ok(output.stdout)
            }
            Ok(Ok(output)) => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "{command} exited with {}",
                    output.status
                );

                Err(ProcessError::Status(command.to_string(), output.status))
            }
            Ok(Err(e)) => Err(ProcessError::Other(e)),
            // dropping the wait future drops the child, which kills it
            Err(_) => Err(ProcessError::Timeout(command.to_string())),
        }
    }
}
