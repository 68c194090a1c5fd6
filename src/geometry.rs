use std::path::Path;

use crate::{
    discover::{Dimensions, ProbeError},
    media::MediaTools,
};

const LANDSCAPE: f64 = 16.0 / 9.0;
const PORTRAIT: f64 = 9.0 / 16.0;
const TOLERANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Geometry {
    Landscape,
    Portrait,
    Other,
}

impl Geometry {
    pub(crate) fn from_ratio(ratio: f64) -> Self {
        // landscape wins when both windows match
        if (ratio - LANDSCAPE).abs() < TOLERANCE {
            Self::Landscape
        } else if (ratio - PORTRAIT).abs() < TOLERANCE {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    pub(crate) fn from_dimensions(Dimensions { width, height }: Dimensions) -> Self {
        Self::from_ratio(f64::from(width) / f64::from(height))
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe the file at `path` and classify its first video stream
#[tracing::instrument(level = "debug", skip(tools))]
pub(crate) async fn classify<T>(tools: &T, path: &Path) -> Result<Geometry, ProbeError>
where
    T: MediaTools + ?Sized,
{
    let dimensions = tools.probe(path).await?;

    let geometry = Geometry::from_dimensions(dimensions);

    tracing::debug!(?dimensions, %geometry, "Classified video");

    Ok(geometry)
}
