use std::path::PathBuf;

/// What the quick download produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// Best audio stream, extracted to MP3
    AudioOnly,
    /// Best video and best audio merged into an MP4 container
    #[default]
    VideoAudio,
}

/// Explicit stream choice made on the Streams tab
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSelection {
    /// Format id of the chosen video (or progressive) stream
    pub video: Option<String>,
    /// Format id of the chosen audio stream
    pub audio: Option<String>,
}

impl StreamSelection {
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// One user click worth of input; consumed when the worker is dispatched
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Media page URL as typed by the user
    pub url: String,
    /// Directory the media file is written to
    pub output_dir: PathBuf,
    /// Quick-mode selection
    pub mode: DownloadMode,
    /// Stream tags picked on the Streams tab, if any
    pub streams: Option<StreamSelection>,
}

/// Kind of a selectable stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Audio only, no picture
    Audio,
    /// Picture only, needs an audio stream merged in
    Video,
    /// Audio and video in one stream
    Progressive,
}

/// A stream offered by the source platform
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Opaque format id understood by yt-dlp
    pub tag: String,
    pub kind: StreamKind,
    /// Container extension (mp4, webm, m4a, ...)
    pub ext: String,
    /// Human-readable description shown in the combo boxes
    pub label: String,
}

/// Result of probing a URL
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: Option<String>,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// Streams that can fill the video slot (video-only and progressive)
    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.kind != StreamKind::Audio)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Audio)
    }

    /// Looks up a stream by its format id
    pub fn stream(&self, tag: &str) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.tag == tag)
    }

    /// Pre-selects the best video and audio stream; yt-dlp lists formats worst first.
    pub fn default_selection(&self) -> StreamSelection {
        StreamSelection {
            video: self.video_streams().last().map(|s| s.tag.clone()),
            audio: self.audio_streams().last().map(|s| s.tag.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(tag: &str, kind: StreamKind) -> StreamInfo {
        StreamInfo {
            tag: tag.into(),
            kind,
            ext: "mp4".into(),
            label: tag.into(),
        }
    }

    #[test]
    fn default_selection_picks_last_listed_streams() {
        let info = MediaInfo {
            title: "t".into(),
            thumbnail: None,
            streams: vec![
                stream("139", StreamKind::Audio),
                stream("18", StreamKind::Progressive),
                stream("140", StreamKind::Audio),
                stream("137", StreamKind::Video),
            ],
        };
        let selection = info.default_selection();
        assert_eq!(selection.video.as_deref(), Some("137"));
        assert_eq!(selection.audio.as_deref(), Some("140"));

        assert!(MediaInfo::default().default_selection().is_empty());
    }
}
