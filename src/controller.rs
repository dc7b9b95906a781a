//! Download trigger: validates the form, assembles the options and hands the
//! job to a worker. Only one download may be in flight at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel};

use crate::downloader::{DownloadJob, WorkerEvent, run_download};
use crate::log_sink::AppLogger;
use crate::model::{DownloadMode, DownloadRequest, StreamSelection};
use crate::options::DownloadOptions;

/// Form state of the main window
#[derive(Debug, Clone, Default)]
pub struct FormView {
    url: String,
    output_path: String,
    audio_only: bool,
    /// Stream tags chosen on the Streams tab; `None` on the Quick tab
    streams: Option<StreamSelection>,
}

impl FormView {
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut String {
        &mut self.url
    }

    #[cfg(test)]
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn output_path_mut(&mut self) -> &mut String {
        &mut self.output_path
    }

    pub fn set_output_path(&mut self, path: impl Into<String>) {
        self.output_path = path.into();
    }

    pub fn audio_only_mut(&mut self) -> &mut bool {
        &mut self.audio_only
    }

    pub fn mode(&self) -> DownloadMode {
        if self.audio_only {
            DownloadMode::AudioOnly
        } else {
            DownloadMode::VideoAudio
        }
    }

    pub fn set_streams(&mut self, streams: Option<StreamSelection>) {
        self.streams = streams;
    }

    pub fn clear(&mut self) {
        self.url.clear();
        self.output_path.clear();
    }

    /// A stream selection overrides the checkbox: an audio tag alone means
    /// audio-only (MP3 extraction), anything with a video tag is merged to MP4.
    fn request(&self) -> DownloadRequest {
        let streams = self.streams.clone().filter(|s| !s.is_empty());
        let mode = match &streams {
            Some(s) if s.video.is_none() => DownloadMode::AudioOnly,
            Some(_) => DownloadMode::VideoAudio,
            None => self.mode(),
        };
        DownloadRequest {
            url: self.url.trim().to_string(),
            output_dir: PathBuf::from(self.output_path.trim()),
            mode,
            streams,
        }
    }
}

/// Where dispatched jobs run
pub trait Launcher {
    fn launch(&self, job: DownloadJob, events: UnboundedSender<WorkerEvent>);
}

/// Runs jobs as tasks on the shared tokio runtime
pub struct RuntimeLauncher {
    runtime: Arc<Runtime>,
    binary: PathBuf,
}

impl RuntimeLauncher {
    pub fn new(runtime: Arc<Runtime>, binary: PathBuf) -> Self {
        Self { runtime, binary }
    }
}

impl Launcher for RuntimeLauncher {
    fn launch(&self, job: DownloadJob, events: UnboundedSender<WorkerEvent>) {
        self.runtime.spawn(run_download(self.binary.clone(), job, events));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Dispatched,
    /// Invalid input or unusable output directory
    Rejected,
    /// Another download is still running
    Busy,
}

pub struct DownloadController<L> {
    launcher: L,
    ffmpeg_location: Option<PathBuf>,
    /// Event stream of the in-flight job; `Some` while the slot is taken
    in_flight: Option<UnboundedReceiver<WorkerEvent>>,
}

impl<L: Launcher> DownloadController<L> {
    pub fn new(launcher: L, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            launcher,
            ffmpeg_location,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn trigger(&mut self, form: &FormView, logger: &mut AppLogger) -> TriggerOutcome {
        logger.info(format!("downloading: {}", form.url()));

        let request = form.request();
        if request.url.is_empty() {
            logger.error("no url provided - Aborting...");
            return TriggerOutcome::Rejected;
        }
        if request.output_dir.as_os_str().is_empty() {
            logger.error("no save location provided - Aborting...");
            return TriggerOutcome::Rejected;
        }
        if self.is_busy() {
            logger.warning("a download is already running - request ignored");
            return TriggerOutcome::Busy;
        }
        if let Err(e) = ensure_dir(&request.output_dir) {
            logger.error(format!(
                "cannot create {}: {e} - Aborting...",
                request.output_dir.display()
            ));
            return TriggerOutcome::Rejected;
        }

        let options = DownloadOptions::for_request(&request)
            .with_ffmpeg_location(self.ffmpeg_location.clone());
        tracing::debug!(
            format = %options.format,
            template = %options.output_template,
            "dispatching download"
        );

        let (tx, rx) = unbounded_channel();
        self.in_flight = Some(rx);
        self.launcher.launch(
            DownloadJob {
                url: request.url,
                options,
            },
            tx,
        );
        TriggerOutcome::Dispatched
    }

    /// Drains worker events into the log; frees the slot after `Finished`.
    pub fn poll(&mut self, logger: &mut AppLogger) {
        let Some(rx) = self.in_flight.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(WorkerEvent::Log { severity, message }) => logger.log(severity, message),
                Ok(WorkerEvent::Failed(message)) => logger.error(message),
                Ok(WorkerEvent::Finished) => {
                    logger.info("finished");
                    self.in_flight = None;
                    return;
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    logger.error("download worker stopped unexpectedly");
                    self.in_flight = None;
                    return;
                }
            }
        }
    }

    pub fn reset(&self, form: &mut FormView, logger: &mut AppLogger) {
        form.clear();
        logger.info("--RESET--");
    }

    pub fn choose_output_path(&self, form: &mut FormView, path: &Path, logger: &mut AppLogger) {
        form.set_output_path(path.display().to_string());
        logger.info(form.output_path().to_string());
    }
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::{LogSink, Severity};
    use crate::options::PostProcessor;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLauncher {
        jobs: RefCell<Vec<(DownloadJob, UnboundedSender<WorkerEvent>)>>,
    }

    impl Launcher for &RecordingLauncher {
        fn launch(&self, job: DownloadJob, events: UnboundedSender<WorkerEvent>) {
            self.jobs.borrow_mut().push((job, events));
        }
    }

    fn count(sink: &LogSink, marker: &str) -> usize {
        sink.lines().iter().filter(|l| l.text.contains(marker)).count()
    }

    fn form(url: &str, dir: &Path) -> FormView {
        let mut form = FormView::new(dir.display().to_string());
        form.set_url(url);
        form
    }

    #[test]
    fn empty_url_is_rejected_without_dispatch() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();

        let outcome = controller.trigger(&form("   ", dir.path()), &mut logger);

        assert_eq!(outcome, TriggerOutcome::Rejected);
        assert!(launcher.jobs.borrow().is_empty());
        assert!(!controller.is_busy());
        assert_eq!(count(logger.sink(), "| ERROR |"), 1);
        assert_eq!(count(logger.sink(), "no url provided - Aborting..."), 1);
    }

    #[test]
    fn empty_output_path_is_rejected() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let mut f = FormView::default();
        f.set_url("https://youtu.be/abc");

        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Rejected);
        assert!(launcher.jobs.borrow().is_empty());
        assert_eq!(count(logger.sink(), "no save location provided"), 1);
    }

    #[test]
    fn dispatch_creates_dir_and_builds_audio_options() {
        let launcher = RecordingLauncher::default();
        let mut controller =
            DownloadController::new(&launcher, Some(PathBuf::from("/usr/bin/ffmpeg")));
        let mut logger = AppLogger::new("test");
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("nested").join("music");
        let mut f = form("https://youtu.be/abc", &out);
        *f.audio_only_mut() = true;

        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Dispatched);
        assert!(out.is_dir());
        assert!(controller.is_busy());

        let jobs = launcher.jobs.borrow();
        let (job, _) = &jobs[0];
        assert_eq!(job.url, "https://youtu.be/abc");
        assert_eq!(job.options.format, "bestaudio/best");
        assert_eq!(job.options.ffmpeg_location, Some(PathBuf::from("/usr/bin/ffmpeg")));
        assert_eq!(PathBuf::from(&job.options.output_template), out.join("%(title)s.%(ext)s"));
    }

    fn dispatched_options(launcher: &RecordingLauncher) -> DownloadOptions {
        let jobs = launcher.jobs.borrow();
        jobs.last().map(|(job, _)| job.options.clone()).unwrap()
    }

    #[test]
    fn audio_tag_alone_extracts_mp3() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        let mut f = form("https://youtu.be/abc", dir.path());
        f.set_streams(Some(StreamSelection {
            video: None,
            audio: Some("140".into()),
        }));

        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Dispatched);

        let options = dispatched_options(&launcher);
        assert_eq!(options.format, "140");
        assert_eq!(
            options.postprocessors,
            vec![PostProcessor::ExtractAudio {
                codec: "mp3".into(),
                quality: "0".into()
            }]
        );
        assert_eq!(options.merge_output_format, None);
    }

    #[test]
    fn video_tag_merges_to_mp4_even_with_audio_checkbox() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();

        for (video, audio, format) in [("137", Some("140"), "137+140"), ("18", None, "18")] {
            let mut f = form("https://youtu.be/abc", dir.path());
            *f.audio_only_mut() = true;
            f.set_streams(Some(StreamSelection {
                video: Some(video.into()),
                audio: audio.map(String::from),
            }));

            assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Dispatched);

            let options = dispatched_options(&launcher);
            assert_eq!(options.format, format);
            assert_eq!(options.merge_output_format.as_deref(), Some("mp4"));
            assert_eq!(
                options.postprocessors,
                vec![PostProcessor::VideoConvertor { format: "mp4".into() }]
            );

            // free the slot for the next case
            launcher.jobs.borrow()[0].1.send(WorkerEvent::Finished).unwrap();
            controller.poll(&mut logger);
            launcher.jobs.borrow_mut().clear();
        }
    }

    #[test]
    fn second_request_is_rejected_while_busy() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        let f = form("https://youtu.be/abc", dir.path());

        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Dispatched);
        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Busy);
        assert_eq!(launcher.jobs.borrow().len(), 1);
        assert_eq!(count(logger.sink(), "| WARNING |"), 1);
    }

    #[test]
    fn poll_logs_events_and_frees_slot_after_finish() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        let f = form("https://youtu.be/abc", dir.path());
        controller.trigger(&f, &mut logger);

        {
            let jobs = launcher.jobs.borrow();
            let tx = &jobs[0].1;
            tx.send(WorkerEvent::Log {
                severity: Severity::Info,
                message: "Downloading: 5.0% | 1MiB/s | ETA 00:10".into(),
            })
            .unwrap();
            tx.send(WorkerEvent::Failed("Video unavailable".into())).unwrap();
            tx.send(WorkerEvent::Finished).unwrap();
        }

        controller.poll(&mut logger);

        assert!(!controller.is_busy());
        assert_eq!(count(logger.sink(), "| INFO | Downloading: 5.0%"), 1);
        assert_eq!(count(logger.sink(), "| ERROR | Video unavailable"), 1);
        assert_eq!(count(logger.sink(), "| INFO | finished"), 1);

        // a new request can be dispatched afterwards
        assert_eq!(controller.trigger(&f, &mut logger), TriggerOutcome::Dispatched);
    }

    #[test]
    fn vanished_worker_frees_slot() {
        let launcher = RecordingLauncher::default();
        let mut controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        controller.trigger(&form("https://youtu.be/abc", dir.path()), &mut logger);

        launcher.jobs.borrow_mut().clear();
        controller.poll(&mut logger);

        assert!(!controller.is_busy());
        assert_eq!(count(logger.sink(), "stopped unexpectedly"), 1);
    }

    #[test]
    fn reset_clears_form() {
        let launcher = RecordingLauncher::default();
        let controller = DownloadController::new(&launcher, None);
        let mut logger = AppLogger::new("test");
        let mut f = form("https://youtu.be/abc", Path::new("out"));

        controller.reset(&mut f, &mut logger);

        assert_eq!(f.url(), "");
        assert_eq!(f.output_path(), "");
        assert_eq!(count(logger.sink(), "--RESET--"), 1);
    }
}
