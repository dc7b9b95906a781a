//! Youtube Downloader Helper: a small egui front-end for yt-dlp

// Environment-driven settings
mod config;
// Download trigger and single-slot guard
mod controller;
// External downloader spawning logic (yt-dlp)
mod downloader;
// Error types
mod error;
// Styled, read-only status log
mod log_sink;
// Data models for requests and streams
mod model;
// yt-dlp option assembly
mod options;
// URL probing for the stream picker
mod probe;
// Progress parsing and relay
mod progress;
// Thumbnail fetching module
mod thumbnail;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use config::AppConfig;
use controller::{DownloadController, FormView, RuntimeLauncher};
use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureHandle, TextureOptions};
use log_sink::AppLogger;
use model::{MediaInfo, StreamSelection};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, error::TryRecvError, unbounded_channel},
};
use tracing_subscriber::EnvFilter;

pub const PROGRAM_NAME: &str = "Youtube Downloader Helper";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ytdl_helper=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    let runtime = RUNTIME
        .get_or_try_init(|| Runtime::new().map(Arc::new))
        .context("failed to start the async runtime")?
        .clone();

    let title = format!("{PROGRAM_NAME} {VERSION}");
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title.clone())
            .with_inner_size([720.0, 640.0]),
        ..Default::default()
    };

    let app_title = title.clone();
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            // Light visuals so the colored log lines stay readable
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Box::new(HelperApp::new(config, runtime, app_title))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI exited with an error: {e}"))
}

/// Which way the user picks what to download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    /// Audio-only checkbox, best quality otherwise
    Quick,
    /// Explicit video/audio stream selection
    Streams,
}

/// Results of a probe delivered back to the UI thread
enum ProbeEvent {
    Loaded(MediaInfo),
    Failed(String),
    Thumbnail(ColorImage),
}

/// Application state for the GUI
struct HelperApp {
    /// Heading shown above the form
    title: String,
    /// URL, output path and options typed by the user
    form: FormView,
    /// Status log with its display sink
    logger: AppLogger,
    controller: DownloadController<RuntimeLauncher>,
    runtime: Arc<Runtime>,
    /// yt-dlp executable used for probing
    binary: PathBuf,
    tab: Tab,
    /// Last probe result for the Streams tab
    media: Option<MediaInfo>,
    selection: StreamSelection,
    thumbnail: Option<TextureHandle>,
    /// Incoming probe results; `Some` while a probe runs
    probe_rx: Option<UnboundedReceiver<ProbeEvent>>,
}

impl HelperApp {
    fn new(config: AppConfig, runtime: Arc<Runtime>, title: String) -> Self {
        let binary = downloader::resolve_binary(config.ytdlp_path.as_deref());
        let launcher = RuntimeLauncher::new(Arc::clone(&runtime), binary.clone());
        let mut logger = AppLogger::new(config.logger_name.clone());
        logger.debug(title.clone());

        Self {
            title,
            form: FormView::new(config.default_output_dir.display().to_string()),
            logger,
            controller: DownloadController::new(launcher, config.ffmpeg_location.clone()),
            runtime,
            binary,
            tab: Tab::Quick,
            media: None,
            selection: StreamSelection::default(),
            thumbnail: None,
            probe_rx: None,
        }
    }

    fn action_download(&mut self) {
        let mut form = self.form.clone();
        match self.tab {
            Tab::Quick => form.set_streams(None),
            Tab::Streams => form.set_streams(Some(self.selection.clone())),
        }
        self.controller.trigger(&form, &mut self.logger);
    }

    fn action_output_path(&mut self) {
        let start = match self.form.output_path().trim() {
            "" => PathBuf::from("."),
            path => PathBuf::from(path),
        };
        if let Some(folder) = FileDialog::new().set_directory(&start).pick_folder() {
            self.controller
                .choose_output_path(&mut self.form, &folder, &mut self.logger);
        }
    }

    fn action_probe(&mut self, ctx: &egui::Context) {
        let url = self.form.url().trim().to_string();
        if url.is_empty() {
            self.logger.error("no url provided - Aborting...");
            return;
        }
        self.logger.info(format!("loading streams: {url}"));
        self.media = None;
        self.thumbnail = None;
        self.selection = StreamSelection::default();

        let (tx, rx) = unbounded_channel();
        self.probe_rx = Some(rx);
        let binary = self.binary.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            match probe::probe_media(binary, url).await {
                Ok(info) => {
                    let thumb_url = info.thumbnail.clone();
                    let _ = tx.send(ProbeEvent::Loaded(info));
                    ctx.request_repaint();
                    if let Some(thumb_url) = thumb_url {
                        // Blocking HTTP fetch kept off the async workers
                        let fetched = tokio::task::spawn_blocking(move || {
                            thumbnail::fetch_thumbnail(&thumb_url)
                        })
                        .await;
                        match fetched {
                            Ok(Ok(img)) => {
                                let _ = tx.send(ProbeEvent::Thumbnail(img));
                            }
                            Ok(Err(e)) => tracing::debug!(error = %e, "no thumbnail"),
                            Err(e) => tracing::debug!(error = %e, "thumbnail task failed"),
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(ProbeEvent::Failed(e.to_string()));
                }
            }
            ctx.request_repaint();
        });
    }

    fn poll_probe(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.probe_rx.as_mut() else {
            return;
        };
        let mut events = Vec::new();
        let mut done = false;
        loop {
            match rx.try_recv() {
                Ok(ev) => events.push(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    done = true;
                    break;
                }
            }
        }
        if done {
            self.probe_rx = None;
        }

        for ev in events {
            match ev {
                ProbeEvent::Loaded(info) => {
                    self.logger.info(format!(
                        "found {} streams for \"{}\"",
                        info.streams.len(),
                        info.title
                    ));
                    self.selection = info.default_selection();
                    self.media = Some(info);
                }
                ProbeEvent::Failed(message) => {
                    self.logger.warning(format!("could not load streams: {message}"));
                }
                ProbeEvent::Thumbnail(img) => {
                    let tex = ctx.load_texture("thumbnail", img, TextureOptions::default());
                    self.thumbnail = Some(tex);
                }
            }
        }
    }

    fn streams_tab(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            let probing = self.probe_rx.is_some() && self.media.is_none();
            if ui.add_enabled(!probing, egui::Button::new("Load streams")).clicked() {
                self.action_probe(ctx);
            }
            if probing {
                ui.spinner();
            }
        });

        let Some(media) = &self.media else {
            ui.label("Load a URL to list its streams.");
            return;
        };

        ui.horizontal(|ui| {
            if let Some(tex) = &self.thumbnail {
                ui.add(egui::Image::new(tex).max_width(200.0));
            }
            ui.vertical(|ui| {
                ui.strong(media.title.as_str());

                let label_for = |tag: &Option<String>| {
                    tag.as_deref()
                        .and_then(|t| media.stream(t))
                        .map(|s| s.label.clone())
                        .unwrap_or_else(|| "none".to_string())
                };

                ui.label("Video stream:");
                egui::ComboBox::from_id_source("video_stream")
                    .width(320.0)
                    .selected_text(label_for(&self.selection.video))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.selection.video, None, "none");
                        for s in media.video_streams() {
                            let tag = Some(s.tag.clone());
                            ui.selectable_value(&mut self.selection.video, tag, s.label.as_str());
                        }
                    });

                ui.label("Audio stream:");
                egui::ComboBox::from_id_source("audio_stream")
                    .width(320.0)
                    .selected_text(label_for(&self.selection.audio))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.selection.audio, None, "none");
                        for s in media.audio_streams() {
                            let tag = Some(s.tag.clone());
                            ui.selectable_value(&mut self.selection.audio, tag, s.label.as_str());
                        }
                    });

                if self.selection.video.is_none() {
                    let source = self.selection.audio.as_deref().and_then(|t| media.stream(t));
                    if let Some(s) = source {
                        ui.small(format!("Audio will be extracted to MP3 from {}", s.ext));
                    }
                }
            });
        });
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for HelperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Drain worker and probe events into the log
        self.controller.poll(&mut self.logger);
        self.poll_probe(ctx);

        // 2️⃣ Header
        egui::TopBottomPanel::top("title_panel").show(ctx, |ui| {
            ui.heading(self.title.as_str());
        });

        // 3️⃣ Main panel: inputs, buttons and the status log
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Quick, "Quick");
                ui.selectable_value(&mut self.tab, Tab::Streams, "Streams");
            });
            ui.separator();

            // URL input field
            ui.label("Paste YouTube video URL:");
            ui.text_edit_singleline(self.form.url_mut());

            // Folder selection
            ui.horizontal(|ui| {
                ui.label("Output folder:");
                ui.text_edit_singleline(self.form.output_path_mut());
                if ui.button("Browse…").clicked() {
                    self.action_output_path();
                }
            });

            match self.tab {
                Tab::Quick => {
                    ui.checkbox(self.form.audio_only_mut(), "Audio only (MP3)");
                }
                Tab::Streams => self.streams_tab(ui, ctx),
            }

            ui.horizontal(|ui| {
                let busy = self.controller.is_busy();
                if ui.add_enabled(!busy, egui::Button::new("Download")).clicked() {
                    self.action_download();
                }
                if ui.button("Reset").clicked() {
                    self.controller.reset(&mut self.form, &mut self.logger);
                }
                if busy {
                    ui.spinner();
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Status:");
                let has_lines = !self.logger.sink().lines().is_empty();
                if ui.add_enabled(has_lines, egui::Button::new("Copy log").small()).clicked() {
                    let markup = self.logger.sink().markup();
                    ui.output_mut(|o| o.copied_text = markup);
                }
            });
            self.logger.sink_mut().show(ui);
        });

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
