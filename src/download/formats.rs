//! Format catalog resolver.
//!
//! Turns the backend's raw format list into the small descriptors the quality
//! keyboard is built from.

use url::Url;

use crate::download::error::ExtractionError;
use crate::download::source::{Extractor, ProbedFormat};

/// yt-dlp's resolution value for audio-only streams
const AUDIO_ONLY_MARKER: &str = "audio only";

/// One selectable encoding of a piece of media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Opaque identifier assigned by the backend
    pub id: String,
    /// e.g. "1280x720"; always present for descriptors returned by `resolve`
    pub resolution: Option<String>,
    /// Container extension, e.g. "mp4"
    pub ext: String,
}

impl FormatDescriptor {
    /// Button label: "1280x720 - mp4"
    pub fn label(&self) -> String {
        match &self.resolution {
            Some(res) => format!("{} - {}", res, self.ext),
            None => self.ext.clone(),
        }
    }

    /// Normalizes a probed entry; `None` for non-selectable entries
    /// (no resolution, audio-only streams, storyboards without one).
    pub fn from_probed(raw: &ProbedFormat) -> Option<Self> {
        let resolution = raw
            .resolution
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty() && !r.eq_ignore_ascii_case(AUDIO_ONLY_MARKER))?;
        Some(Self {
            id: raw.format_id.clone(),
            resolution: Some(resolution.to_string()),
            ext: raw.ext.clone().unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

/// Ordered list of selectable formats, in the backend's reported order.
///
/// Duplicates are kept: the backend does not guarantee uniqueness and the
/// keyboard shows what it reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub formats: Vec<FormatDescriptor>,
}

impl Catalog {
    pub fn from_probed(raw: &[ProbedFormat]) -> Self {
        Self {
            formats: raw.iter().filter_map(FormatDescriptor::from_probed).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// True when the user has to pick (two or more selectable formats).
    pub fn needs_choice(&self) -> bool {
        self.formats.len() >= 2
    }
}

/// Resolves the selectable formats of `url` without downloading anything.
pub async fn resolve(extractor: &dyn Extractor, url: &Url) -> Result<Catalog, ExtractionError> {
    log::info!("Resolving formats via {} for {}", extractor.name(), url);
    let info = extractor.probe(url).await?;
    let catalog = Catalog::from_probed(&info.formats);
    log::info!(
        "Resolved {} selectable of {} reported formats for {}",
        catalog.len(),
        info.formats.len(),
        url
    );
    Ok(catalog)
}
