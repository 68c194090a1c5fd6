
use std::path::Path;

use crate::process::Process;

use super::{Dimensions, ProbeError};

#[derive(Debug, serde::Deserialize)]
struct FfMpegDiscovery {
    #[serde(default)]
    streams: Vec<FfMpegStream>,
}

#[derive(Debug, serde::Deserialize)]
struct FfMpegStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: FfMpegDisposition,
}

#[derive(Debug, Default, serde::Deserialize)]
struct FfMpegDisposition {
    #[serde(default)]
    attached_pic: u8,
}

impl FfMpegStream {
    // cover art is muxed as a single-frame video stream
    fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video") && self.disposition.attached_pic == 0
    }
}

const PROBE_ARGS: [&str; 8] = [
    "-v",
    "error",
    "-select_streams",
    "V",
    "-show_entries",
    "stream=codec_type,width,height:stream_disposition=attached_pic",
    "-print_format",
    "json",
];

pub(super) async fn probe_file(path: &Path, timeout: u64) -> Result<Dimensions, ProbeError> {
    let path = path.to_str().ok_or(ProbeError::Path)?;

    let mut args = PROBE_ARGS.to_vec();
    args.push(path);

    let output = Process::run("ffprobe", &args, timeout)?
    .output()
    .await?;

    let discovery: FfMpegDiscovery = serde_json::from_slice(&output).map_err(ProbeError::Json)?;

    parse_discovery(discovery)
}

fn parse_discovery(discovery: FfMpegDiscovery) -> Result<Dimensions, ProbeError> {
    let stream = discovery
        .streams
        .into_iter()
        .find(FfMpegStream::is_video)
        .ok_or(ProbeError::NoVideoStream)?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);

    if width == 0 || height == 0 {
        return Err(ProbeError::Dimensions { width, height });
    }

    Ok(Dimensions { width, height })
}
