use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};
use rust_embed::RustEmbed;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};
use crate::{
    error::WorkerError,
    log_sink::Severity,
    options::DownloadOptions,
    progress::{ProgressRelay, parse_line},
};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// Name of the yt-dlp executable on this platform
pub const YTDLP_BIN: &str = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

/// Messages a worker sends back to the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A status line to append to the log
    Log { severity: Severity, message: String },
    /// The download failed; carries the error text
    Failed(String),
    /// Always the last event of a job
    Finished,
}

/// A dispatched download: target URL plus its assembled options
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub options: DownloadOptions,
}

/// Picks the yt-dlp executable: explicit path, then the bundled asset, then `PATH`.
pub fn resolve_binary(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    match extract_embedded() {
        Ok(Some(path)) => path,
        Ok(None) => PathBuf::from(YTDLP_BIN),
        Err(e) => {
            tracing::warn!(error = %e, "could not unpack bundled yt-dlp, using PATH");
            PathBuf::from(YTDLP_BIN)
        }
    }
}

/// Writes the bundled yt-dlp to the temp dir once; `None` when nothing is bundled.
fn extract_embedded() -> std::io::Result<Option<PathBuf>> {
    let Some(data) = Asset::get(YTDLP_BIN) else {
        return Ok(None);
    };
    let tmp = std::env::temp_dir().join(YTDLP_BIN);
    if !tmp.exists() {
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(Some(tmp))
}

/// Runs one download to completion. Sends at most one `Failed` and exactly
/// one `Finished`, in that order.
pub async fn run_download(binary: PathBuf, job: DownloadJob, events: UnboundedSender<WorkerEvent>) {
    tracing::info!(url = %job.url, binary = %binary.display(), "starting download");
    if let Err(e) = execute(&binary, &job, &events).await {
        tracing::warn!(
            url = %job.url,
            error = %e,
            exit_code = ?e.exit_code(),
            "download failed"
        );
        let _ = events.send(WorkerEvent::Failed(e.to_string()));
    }
    let _ = events.send(WorkerEvent::Finished);
}

async fn execute(
    binary: &Path,
    job: &DownloadJob,
    events: &UnboundedSender<WorkerEvent>,
) -> Result<(), WorkerError> {
    let mut child = Command::new(binary)
        .args(job.options.to_args(&job.url))
        // yt-dlp otherwise prints titles in the console codepage
        .env("PYTHONIOENCODING", "UTF-8")
        .env("PYTHONUTF8", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| WorkerError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or(WorkerError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(WorkerError::MissingPipe("stderr"))?;

    let stderr_task = tokio::spawn(collect_errors(BufReader::new(stderr), events.clone()));

    let mut relay = ProgressRelay::new();
    if let Err(e) = relay_output(BufReader::new(stdout), &mut relay, events).await {
        // the slot is only released once yt-dlp is gone
        let _ = child.kill().await;
        let _ = stderr_task.await;
        return Err(e);
    }

    let status = child.wait().await?;
    let last_error = stderr_task.await.unwrap_or(None);

    if status.success() {
        Ok(())
    } else {
        Err(WorkerError::exited(status.code(), last_error))
    }
}

/// Feeds stdout through the relay; other non-empty lines become debug events.
pub async fn relay_output<R>(
    reader: R,
    relay: &mut ProgressRelay,
    events: &UnboundedSender<WorkerEvent>,
) -> Result<(), WorkerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = reader;
    let mut buf = Vec::new();
    while let Some(line) = read_lossy_line(&mut reader, &mut buf).await? {
        let message = match parse_line(&line) {
            Some(event) => match relay.handle(&event) {
                Some(message) => message,
                None => continue,
            },
            None if line.trim().is_empty() => continue,
            None => {
                let _ = events.send(WorkerEvent::Log {
                    severity: Severity::Debug,
                    message: line.trim().to_string(),
                });
                continue;
            }
        };
        let _ = events.send(WorkerEvent::Log {
            severity: Severity::Info,
            message,
        });
    }
    Ok(())
}

/// Reads one `\n`-terminated line, replacing invalid UTF-8 instead of failing.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf[..]);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Forwards yt-dlp warnings and returns the last `ERROR:` message, if any.
pub async fn collect_errors<R>(reader: R, events: UnboundedSender<WorkerEvent>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut last_error = None;
    let mut reader = reader;
    let mut buf = Vec::new();
    loop {
        let line = match read_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "stopped reading yt-dlp stderr");
                break;
            }
        };
        let line = line.trim();
        if let Some(msg) = line.strip_prefix("ERROR:") {
            last_error = Some(msg.trim().to_string());
        } else if let Some(msg) = line.strip_prefix("WARNING:") {
            let _ = events.send(WorkerEvent::Log {
                severity: Severity::Warning,
                message: msg.trim().to_string(),
            });
        } else if !line.is_empty() {
            tracing::debug!(target: "ytdl_helper::yt_dlp", "{line}");
        }
    }
    last_error
}
