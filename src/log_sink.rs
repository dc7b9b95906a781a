//! Read-only status log shown in the main window.
//!
//! Records are formatted as `time | logger | LEVEL | message` and colored by
//! the level marker found in the formatted text.

use std::fmt;

use chrono::Local;
use eframe::egui::{self, Color32, RichText};

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log entry before formatting
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: String,
    pub logger: String,
    pub severity: Severity,
    pub message: String,
}

impl LogRecord {
    pub fn now(logger: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string(),
            logger: logger.to_string(),
            severity,
            message: message.into(),
        }
    }

    pub fn format(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.timestamp, self.logger, self.severity, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColor {
    Black,
    Green,
    Red,
}

impl LogColor {
    pub fn css(self) -> &'static str {
        match self {
            LogColor::Black => "black",
            LogColor::Green => "green",
            LogColor::Red => "red",
        }
    }

    pub fn color32(self) -> Color32 {
        match self {
            LogColor::Black => Color32::BLACK,
            LogColor::Green => Color32::from_rgb(0, 128, 0),
            LogColor::Red => Color32::RED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    pub color: LogColor,
    pub bold: bool,
}

impl LineStyle {
    /// Picks the style from the `| LEVEL |` marker; unknown levels get bold black.
    pub fn classify(formatted: &str) -> Self {
        let (color, bold) = if formatted.contains("| INFO |") {
            (LogColor::Black, false)
        } else if formatted.contains("| DEBUG |") {
            (LogColor::Green, false)
        } else if formatted.contains("| WARNING |") {
            (LogColor::Red, false)
        } else if formatted.contains("| ERROR |") {
            (LogColor::Red, true)
        } else {
            (LogColor::Black, true)
        };
        Self { color, bold }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledLine {
    pub text: String,
    pub style: LineStyle,
}

impl StyledLine {
    pub fn markup(&self) -> String {
        let text = escape_html(&self.text);
        let body = if self.style.bold {
            format!("<strong>{text}</strong>")
        } else {
            text
        };
        format!(
            "<span style=\"color:{}\">{}</span><br>",
            self.style.color.css(),
            body
        )
    }

    fn rich_text(&self) -> RichText {
        let text = RichText::new(&self.text)
            .monospace()
            .color(self.style.color.color32());
        if self.style.bold { text.strong() } else { text }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Append-only, styled log scrollback
#[derive(Debug, Default)]
pub struct LogSink {
    lines: Vec<StyledLine>,
    /// Set on every append; cleared once the view has scrolled to the end
    scroll_pending: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, formatted: &str) {
        self.lines.push(StyledLine {
            text: formatted.trim_end().to_string(),
            style: LineStyle::classify(formatted),
        });
        self.scroll_pending = true;
    }

    pub fn lines(&self) -> &[StyledLine] {
        &self.lines
    }

    #[cfg(test)]
    pub fn scroll_pending(&self) -> bool {
        self.scroll_pending
    }

    /// Whole scrollback as markup
    pub fn markup(&self) -> String {
        self.lines.iter().map(StyledLine::markup).collect()
    }

    /// Draws the log on a light-gray, non-editable panel.
    pub fn show(&mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(Color32::LIGHT_GRAY)
            .inner_margin(6.0)
            .show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.lines {
                            ui.label(line.rich_text());
                        }
                        if self.scroll_pending {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                            self.scroll_pending = false;
                        }
                    });
            });
    }
}

/// Named logger feeding the sink; every line is mirrored to `tracing`.
#[derive(Debug)]
pub struct AppLogger {
    name: String,
    sink: LogSink,
}

impl AppLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: LogSink::new(),
        }
    }

    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let record = LogRecord::now(&self.name, severity, message);
        match severity {
            Severity::Debug => tracing::debug!(logger = %record.logger, "{}", record.message),
            Severity::Info => tracing::info!(logger = %record.logger, "{}", record.message),
            Severity::Warning => tracing::warn!(logger = %record.logger, "{}", record.message),
            Severity::Error => tracing::error!(logger = %record.logger, "{}", record.message),
        }
        self.sink.append(&record.format());
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut LogSink {
        &mut self.sink
    }
}
