//! Parses yt-dlp progress reports and turns them into status lines.
//!
//! yt-dlp is started with the two templates below, so each progress report
//! arrives on stdout as one `|`-separated line. Missing fields are printed
//! by yt-dlp as `NA`.

use std::path::Path;

pub const DOWNLOAD_TEMPLATE: &str = "download:@dl|%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress.filename)s";
pub const POSTPROCESS_TEMPLATE: &str =
    "postprocess:@pp|%(progress.status)s|%(progress.postprocessor)s";

const DOWNLOAD_PREFIX: &str = "@dl|";
const POSTPROCESS_PREFIX: &str = "@pp|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloading,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessStatus {
    Started,
    Processing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub status: DownloadStatus,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessProgress {
    pub status: PostProcessStatus,
    pub postprocessor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Download(DownloadProgress),
    PostProcess(PostProcessProgress),
}

/// Parses one stdout line; `None` for anything that is not a template line
/// or carries a status the relay does not handle (e.g. `error`).
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = strip_ansi(line);
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(DOWNLOAD_PREFIX) {
        let mut fields = rest.splitn(5, '|');
        let status = match fields.next()?.trim() {
            "downloading" => DownloadStatus::Downloading,
            "finished" => DownloadStatus::Finished,
            _ => return None,
        };
        return Some(ProgressEvent::Download(DownloadProgress {
            status,
            percent: field(fields.next()),
            speed: field(fields.next()),
            eta: field(fields.next()),
            filename: field(fields.next()),
        }));
    }

    if let Some(rest) = line.strip_prefix(POSTPROCESS_PREFIX) {
        let mut fields = rest.splitn(2, '|');
        let status = match fields.next()?.trim() {
            "started" => PostProcessStatus::Started,
            "processing" => PostProcessStatus::Processing,
            "finished" => PostProcessStatus::Finished,
            _ => return None,
        };
        return Some(ProgressEvent::PostProcess(PostProcessProgress {
            status,
            postprocessor: field(fields.next()),
        }));
    }

    None
}

fn field(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    (!value.is_empty() && value != "NA").then(|| value.to_string())
}

/// Removes CSI escape sequences yt-dlp may add around percent/speed strings.
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Converts progress events into log lines for one request.
#[derive(Debug, Default)]
pub struct ProgressRelay {
    /// Last percent string logged; unset at request start
    last_percent: Option<String>,
}

impl ProgressRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: &ProgressEvent) -> Option<String> {
        match event {
            ProgressEvent::Download(p) => self.on_download(p),
            ProgressEvent::PostProcess(p) => self.on_postprocess(p),
        }
    }

    /// Raw download hook. Repeated percent values are dropped.
    pub fn on_download(&mut self, progress: &DownloadProgress) -> Option<String> {
        match progress.status {
            DownloadStatus::Finished => {
                let name = progress
                    .filename
                    .as_deref()
                    .map(|f| {
                        Path::new(f)
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| f.to_string())
                    })
                    .unwrap_or_default();
                Some(format!("Done downloading {name}"))
            }
            DownloadStatus::Downloading => {
                let percent = progress.percent.clone().unwrap_or_default();
                if self.last_percent.as_ref() == Some(&percent) {
                    return None;
                }
                let line = format!(
                    "Downloading: {} | {} | ETA {}",
                    percent,
                    progress.speed.as_deref().unwrap_or("?"),
                    progress.eta.as_deref().unwrap_or("?"),
                );
                self.last_percent = Some(percent);
                Some(line)
            }
        }
    }

    /// Post-processing hook.
    pub fn on_postprocess(&mut self, progress: &PostProcessProgress) -> Option<String> {
        let pp = progress.postprocessor.as_deref().unwrap_or("?");
        Some(match progress.status {
            PostProcessStatus::Started => format!("Post-processing started: {pp}"),
            PostProcessStatus::Processing => format!("Post-processing: {pp}"),
            PostProcessStatus::Finished => "Post-processing finished".to_string(),
        })
    }
}
