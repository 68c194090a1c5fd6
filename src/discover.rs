mod ffmpeg;

use std::path::Path;

use crate::{error_code::ErrorCode, process::ProcessError};

/// Frame size of the first video stream in a container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dimensions {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("Error in ffprobe process")]
    Process(#[source] ProcessError),

    #[error("Invalid ffprobe output")]
    Json(#[source] serde_json::Error),

    #[error("No video stream in uploaded media")]
    NoVideoStream,

    #[error("Video stream reports invalid dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },

    #[error("Invalid file path")]
    Path,
}

impl From<ProcessError> for ProbeError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl ProbeError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) => ErrorCode::PROBE_OUTPUT,
            Self::NoVideoStream => ErrorCode::NO_VIDEO_STREAM,
            Self::Dimensions { .. } => ErrorCode::INVALID_DIMENSIONS,
            Self::Path => ErrorCode::INVALID_FILE_PATH,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        match self {
            Self::Process(e) => e.is_client_error(),
            Self::Json(_) | Self::Path => false,
            Self::NoVideoStream | Self::Dimensions { .. } => true,
        }
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub(crate) async fn probe(path: &Path, timeout: u64) -> Result<Dimensions, ProbeError> {
    ffmpeg::probe_file(path, timeout).await
}
