
use std::path::Path;

use crate::{
    error_code::ErrorCode,
    process::{Process, ProcessError},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("Invalid file path")]
    Path,
}

impl From<ProcessError> for FfMpegError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Path => ErrorCode::INVALID_FILE_PATH,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        // ffmpeg bailing on the input probably means a bad upload
        matches!(self, Self::Process(e) if e.is_client_error())
    }
}

fn fast_start_args<'a>(input: &'a str, output: &'a str) -> [&'a str; 13] {
    [
        "-hide_banner",
        "-v",
        "warning",
        "-i",
        input,
        "-c",
        "copy",
        "-movflags",
        "faststart",
        "-f",
        "mp4",
        "-y",
        output,
    ]
}

/// Rewrite `input` into `output` with the moov atom ahead of the sample data
///
/// Streams are copied as-is, only the container layout changes
#[tracing::instrument(level = "debug", skip_all)]
pub(crate) async fn fast_start(
    input: &Path,
    output: &Path,
    timeout: u64,
) -> Result<(), FfMpegError> {
    let input = input.to_str().ok_or(FfMpegError::Path)?;
    let output = output.to_str().ok_or(FfMpegError::Path)?;

    Process::run("ffmpeg", &fast_start_args(input, output), timeout)?
        .wait()
        .await?;

    Ok(())
}
