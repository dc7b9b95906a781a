//! Assembly of the yt-dlp configuration for one download request.

use std::path::{Path, PathBuf};

use crate::model::{DownloadMode, DownloadRequest, StreamSelection};
use crate::progress::{DOWNLOAD_TEMPLATE, POSTPROCESS_TEMPLATE};

pub const AUDIO_FORMAT: &str = "bestaudio/best";
pub const VIDEO_FORMAT: &str = "bestvideo+bestaudio/best";
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
pub const MERGE_CONTAINER: &str = "mp4";

/// Post-processing steps yt-dlp runs once the raw download is done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Extract the audio track with ffmpeg
    ExtractAudio { codec: String, quality: String },
    /// Convert the merged file to another container
    VideoConvertor { format: String },
}

impl PostProcessor {
    /// Key yt-dlp uses to address this step in `--postprocessor-args`
    pub fn key(&self) -> &'static str {
        match self {
            PostProcessor::ExtractAudio { .. } => "ExtractAudio",
            PostProcessor::VideoConvertor { .. } => "VideoConvertor",
        }
    }
}

/// Everything yt-dlp needs for a single download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Format selector (`-f`)
    pub format: String,
    /// Output path template, already rooted at the output directory
    pub output_template: String,
    /// Container used when separate streams are merged
    pub merge_output_format: Option<String>,
    pub postprocessors: Vec<PostProcessor>,
    /// Extra ffmpeg arguments for the video convertor
    pub postprocessor_args: Vec<String>,
    /// Only download the single video, not the whole playlist
    pub no_playlist: bool,
    pub ffmpeg_location: Option<PathBuf>,
}

impl DownloadOptions {
    /// Best audio, extracted to MP3 at the highest quality.
    pub fn audio_only(output_dir: &Path) -> Self {
        Self {
            format: AUDIO_FORMAT.to_string(),
            output_template: output_template(output_dir),
            merge_output_format: None,
            postprocessors: vec![PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "0".to_string(),
            }],
            postprocessor_args: Vec::new(),
            no_playlist: true,
            ffmpeg_location: None,
        }
    }

    /// Best video and audio merged into MP4; video is copied, audio re-encoded to AAC.
    pub fn video_audio(output_dir: &Path) -> Self {
        Self {
            format: VIDEO_FORMAT.to_string(),
            output_template: output_template(output_dir),
            merge_output_format: Some(MERGE_CONTAINER.to_string()),
            postprocessors: vec![PostProcessor::VideoConvertor {
                format: MERGE_CONTAINER.to_string(),
            }],
            postprocessor_args: ["-c:v", "copy", "-c:a", "aac", "-b:a", "192k"]
                .into_iter()
                .map(String::from)
                .collect(),
            no_playlist: true,
            ffmpeg_location: None,
        }
    }

    pub fn for_request(request: &DownloadRequest) -> Self {
        let mut options = match request.mode {
            DownloadMode::AudioOnly => Self::audio_only(&request.output_dir),
            DownloadMode::VideoAudio => Self::video_audio(&request.output_dir),
        };
        if let Some(format) = request.streams.as_ref().and_then(selection_format) {
            options.format = format;
        }
        options
    }

    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    /// Renders the options as yt-dlp command-line arguments, `url` last.
    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--progress-template".into(),
            DOWNLOAD_TEMPLATE.into(),
            "--progress-template".into(),
            POSTPROCESS_TEMPLATE.into(),
        ];

        if self.no_playlist {
            args.push("--no-playlist".into());
        }
        args.extend(["-f".into(), self.format.clone()]);
        args.extend(["-o".into(), self.output_template.clone()]);

        if let Some(container) = &self.merge_output_format {
            args.extend(["--merge-output-format".into(), container.clone()]);
        }

        for pp in &self.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.extend([
                        "-x".into(),
                        "--audio-format".into(),
                        codec.clone(),
                        "--audio-quality".into(),
                        quality.clone(),
                    ]);
                }
                PostProcessor::VideoConvertor { format } => {
                    args.extend(["--recode-video".into(), format.clone()]);
                    if !self.postprocessor_args.is_empty() {
                        args.extend([
                            "--postprocessor-args".into(),
                            format!("{}:{}", pp.key(), self.postprocessor_args.join(" ")),
                        ]);
                    }
                }
            }
        }

        if let Some(location) = &self.ffmpeg_location {
            args.extend([
                "--ffmpeg-location".into(),
                location.to_string_lossy().into_owned(),
            ]);
        }

        args.push("--".into());
        args.push(url.to_string());
        args
    }
}

fn output_template(output_dir: &Path) -> String {
    output_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}

/// Format selector for an explicit stream choice: `video+audio` when both are set.
fn selection_format(selection: &StreamSelection) -> Option<String> {
    match (&selection.video, &selection.audio) {
        (Some(video), Some(audio)) => Some(format!("{video}+{audio}")),
        (Some(tag), None) | (None, Some(tag)) => Some(tag.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: DownloadMode, streams: Option<StreamSelection>) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            output_dir: PathBuf::from("/tmp/out"),
            mode,
            streams,
        }
    }

    #[test]
    fn audio_only_requests_best_audio_as_mp3() {
        let options = DownloadOptions::for_request(&request(DownloadMode::AudioOnly, None));

        assert_eq!(options.format, "bestaudio/best");
        assert_eq!(
            options.postprocessors,
            vec![PostProcessor::ExtractAudio {
                codec: "mp3".into(),
                quality: "0".into()
            }]
        );
        assert!(options.no_playlist);
        assert_eq!(options.merge_output_format, None);
    }

    #[test]
    fn video_audio_merges_to_mp4_in_output_dir() {
        let options = DownloadOptions::for_request(&request(DownloadMode::VideoAudio, None));

        assert_eq!(options.format, "bestvideo+bestaudio/best");
        assert_eq!(options.merge_output_format.as_deref(), Some("mp4"));
        assert_eq!(
            PathBuf::from(&options.output_template),
            PathBuf::from("/tmp/out").join("%(title)s.%(ext)s")
        );
        assert_eq!(
            options.postprocessors,
            vec![PostProcessor::VideoConvertor { format: "mp4".into() }]
        );
        assert_eq!(options.postprocessor_args.join(" "), "-c:v copy -c:a aac -b:a 192k");
    }

    #[test]
    fn stream_selection_overrides_format() {
        let both = StreamSelection {
            video: Some("137".into()),
            audio: Some("140".into()),
        };
        let options = DownloadOptions::for_request(&request(DownloadMode::VideoAudio, Some(both)));
        assert_eq!(options.format, "137+140");

        let progressive = StreamSelection {
            video: Some("18".into()),
            audio: None,
        };
        let options =
            DownloadOptions::for_request(&request(DownloadMode::VideoAudio, Some(progressive)));
        assert_eq!(options.format, "18");

        let audio_tag = StreamSelection {
            video: None,
            audio: Some("140".into()),
        };
        let options =
            DownloadOptions::for_request(&request(DownloadMode::AudioOnly, Some(audio_tag)));
        assert_eq!(options.format, "140");
        assert!(matches!(
            options.postprocessors.as_slice(),
            [PostProcessor::ExtractAudio { codec, .. }] if codec == "mp3"
        ));

        let empty = StreamSelection::default();
        let options = DownloadOptions::for_request(&request(DownloadMode::AudioOnly, Some(empty)));
        assert_eq!(options.format, "bestaudio/best");
    }

    #[test]
    fn args_carry_templates_and_end_with_url() {
        let url = "https://youtu.be/abc";
        let args = DownloadOptions::audio_only(Path::new("out"))
            .with_ffmpeg_location(Some(PathBuf::from("/usr/bin/ffmpeg")))
            .to_args(url);

        assert_eq!(args.first().map(String::as_str), Some("--newline"));
        assert!(args.iter().any(|a| a == DOWNLOAD_TEMPLATE));
        assert!(args.iter().any(|a| a == POSTPROCESS_TEMPLATE));
        assert!(args.windows(2).any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--ffmpeg-location" && w[1] == "/usr/bin/ffmpeg"));
        assert_eq!(&args[args.len() - 2..], ["--", url]);
    }

    #[test]
    fn video_args_scope_ffmpeg_flags_to_convertor() {
        let args = DownloadOptions::video_audio(Path::new("out")).to_args("u");
        assert!(args.windows(2).any(|w| w[0] == "--recode-video" && w[1] == "mp4"));
        assert!(args.windows(2).any(|w| {
            w[0] == "--postprocessor-args" && w[1] == "VideoConvertor:-c:v copy -c:a aac -b:a 192k"
        }));
    }
}
