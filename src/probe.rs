//! Media probe for the Streams tab: asks yt-dlp for the JSON description of a
//! URL and turns its format list into selectable streams.

use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::ProbeError;
use crate::model::{MediaInfo, StreamInfo, StreamKind};

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    fps: Option<f64>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    format_note: Option<String>,
}

impl RawFormat {
    fn kind(&self) -> Option<StreamKind> {
        let no_video = self.vcodec.as_deref() == Some("none");
        let no_audio = self.acodec.as_deref() == Some("none");
        match (no_video, no_audio) {
            (true, true) => None,
            (true, false) => Some(StreamKind::Audio),
            (false, true) => Some(StreamKind::Video),
            (false, false) => Some(StreamKind::Progressive),
        }
    }

    fn into_stream(self) -> Option<StreamInfo> {
        let kind = self.kind()?;
        let ext = self.ext.unwrap_or_else(|| "?".to_string());

        let mut parts = vec![self.format_id.clone(), ext.clone()];
        match kind {
            StreamKind::Audio => {
                if let Some(abr) = self.abr {
                    parts.push(format!("{abr:.0}kbps"));
                }
            }
            StreamKind::Video | StreamKind::Progressive => {
                if let Some(height) = self.height {
                    parts.push(format!("{height}p"));
                }
                if let Some(fps) = self.fps {
                    parts.push(format!("{fps:.0}fps"));
                }
                if kind == StreamKind::Progressive {
                    parts.push("progressive".to_string());
                }
            }
        }
        if let Some(note) = self.format_note.filter(|n| !n.is_empty()) {
            parts.push(note);
        }

        Some(StreamInfo {
            tag: self.format_id,
            kind,
            ext,
            label: parts.join(" | "),
        })
    }
}

/// Parses the output of `yt-dlp -J`.
pub fn parse_media_info(json: &str) -> Result<MediaInfo, ProbeError> {
    let raw: RawInfo = serde_json::from_str(json)?;
    Ok(MediaInfo {
        title: raw.title.unwrap_or_default(),
        thumbnail: raw.thumbnail,
        streams: raw.formats.into_iter().filter_map(RawFormat::into_stream).collect(),
    })
}

/// Runs yt-dlp in JSON dump mode for a single video.
pub async fn probe_media(binary: PathBuf, url: String) -> Result<MediaInfo, ProbeError> {
    tracing::debug!(%url, "probing media");
    let output = Command::new(&binary)
        .args(["-J", "--no-playlist", "--", url.as_str()])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ProbeError::Spawn {
            binary: binary.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed(last_error_line(&output.stderr)));
    }
    parse_media_info(&String::from_utf8_lossy(&output.stdout))
}

fn last_error_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.strip_prefix("ERROR:").unwrap_or(l).trim().to_string())
        .unwrap_or_else(|| "yt-dlp returned no details".to_string())
}
