use std::{path::Path, sync::Arc};

use crate::{
    discover::{Dimensions, ProbeError},
    ffmpeg::FfMpegError,
};

pub(crate) type ArcMediaTools = Arc<dyn MediaTools>;

/// External media tooling the ingest pipeline shells out to
#[async_trait::async_trait(?Send)]
pub(crate) trait MediaTools: std::fmt::Debug + Send + Sync {
    /// Write a copy of `input` to `output` with index metadata moved ahead of the samples
    async fn fast_start(&self, input: &Path, output: &Path) -> Result<(), FfMpegError>;

    /// Read the frame size of the first video stream in `path`
    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

/// ffmpeg and ffprobe from `$PATH`, each invocation bounded by `timeout` seconds
#[derive(Clone, Copy, Debug)]
pub(crate) struct FfMpeg {
    timeout: u64,
}

impl FfMpeg {
    pub(crate) const fn new(timeout: u64) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait(?Send)]
impl MediaTools for FfMpeg {
    async fn fast_start(&self, input: &Path, output: &Path) -> Result<(), FfMpegError> {
        crate::ffmpeg::fast_start(input, output, self.timeout).await
    }

    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        crate::discover::probe(path, self.timeout).await
    }
}

/// Treats file contents as `<width>x<height>` text
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FakeTools {
    /// Written in place of the input when remuxing
    pub(crate) remuxed: Option<&'static str>,
    pub(crate) fail_remux: bool,
}

#[cfg(test)]
#[async_trait::async_trait(?Send)]
impl MediaTools for FakeTools {
    async fn fast_start(&self, input: &Path, output: &Path) -> Result<(), FfMpegError> {
        if self.fail_remux {
            return Err(FfMpegError::Process(crate::process::ProcessError::Status(
                String::from("ffmpeg"),
                std::process::ExitStatus::default(),
            )));
        }

        let contents = match self.remuxed {
            Some(remuxed) => remuxed.as_bytes().to_vec(),
            None => tokio::fs::read(input).await.map_err(|_| FfMpegError::Path)?,
        };

        tokio::fs::write(output, contents)
            .await
            .map_err(|_| FfMpegError::Path)
    }

    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ProbeError::Path)?;

        let (width, height) = contents
            .trim()
            .split_once('x')
            .ok_or(ProbeError::NoVideoStream)?;

        Ok(Dimensions {
            width: width.parse().map_err(|_| ProbeError::NoVideoStream)?,
            height: height.parse().map_err(|_| ProbeError::NoVideoStream)?,
        })
    }
}
