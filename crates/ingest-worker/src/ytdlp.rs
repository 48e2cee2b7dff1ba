//! yt-dlp as the orchestrator's action.
//!
//! One [`YtDlpAction::run`] call is one attempt: it shapes the invocation
//! for the given client identity and tokens, runs yt-dlp once under a
//! deadline, and reports failures as an [`ActionFailure`] for the
//! classifier. It never retries by itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use ingest_models::{ActionFailure, ClientIdentity, OperationKind, TokenSet};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

static HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HTTP Error (\d{3})").expect("HTTP status pattern is valid")
});

/// What a successful invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedMedia {
    /// Downloaded audio file.
    Audio(PathBuf),
    /// Parsed `--dump-json` output.
    Metadata(serde_json::Value),
    /// Caption files, sorted by path.
    Captions(Vec<PathBuf>),
}

impl FetchedMedia {
    pub fn summary(&self) -> String {
        match self {
            FetchedMedia::Audio(path) => format!("audio at {}", path.display()),
            FetchedMedia::Metadata(value) => format!(
                "metadata for '{}'",
                value.get("title").and_then(|t| t.as_str()).unwrap_or("untitled")
            ),
            FetchedMedia::Captions(files) => format!("{} caption file(s)", files.len()),
        }
    }
}

/// Runs yt-dlp for one identity and token set.
#[derive(Debug, Clone)]
pub struct YtDlpAction {
    binary: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl YtDlpAction {
    pub fn new(binary: impl Into<String>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.ytdlp_binary.clone(),
            config.work_dir.clone(),
            config.ytdlp_timeout,
        )
    }

    /// Resolve the yt-dlp binary on `PATH`.
    pub fn check_binary(&self) -> WorkerResult<PathBuf> {
        which::which(&self.binary).map_err(|_| WorkerError::YtDlpNotFound(self.binary.clone()))
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Full argument list for one invocation.
    pub fn build_args(
        &self,
        kind: OperationKind,
        url: &str,
        video_id: &str,
        identity: &ClientIdentity,
        tokens: &TokenSet,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--extractor-args".into(),
            extractor_args(identity, tokens),
        ];

        for (key, value) in &identity.extra_request_args {
            if key.starts_with("--") {
                args.push(key.clone());
                if !value.is_empty() {
                    args.push(value.clone());
                }
            }
        }

        let template = self
            .work_dir
            .join(format!("{}.%(ext)s", video_id))
            .to_string_lossy()
            .into_owned();

        match kind {
            OperationKind::Download => {
                args.extend([
                    "-f".into(),
                    "bestaudio".into(),
                    "--print".into(),
                    "after_move:filepath".into(),
                    "--no-simulate".into(),
                    "-o".into(),
                    template,
                ]);
            }
            OperationKind::Metadata => {
                args.extend(["--dump-json".into(), "--skip-download".into()]);
            }
            OperationKind::Captions => {
                args.extend([
                    "--write-auto-sub".into(),
                    "--skip-download".into(),
                    "--sub-format".into(),
                    "vtt".into(),
                    "-o".into(),
                    template,
                ]);
            }
        }

        args.push(url.to_string());
        args
    }

    /// Run one attempt.
    pub async fn run(
        &self,
        kind: OperationKind,
        url: &str,
        video_id: &str,
        identity: &ClientIdentity,
        tokens: &TokenSet,
    ) -> Result<FetchedMedia, ActionFailure> {
        let args = self.build_args(kind, url, video_id, identity, tokens);
        debug!(
            client = %identity.name,
            operation = %kind,
            tokens = tokens.len(),
            "Running yt-dlp"
        );

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ActionFailure::from_io(&e)),
            Err(_) => {
                return Err(ActionFailure::timeout(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(failure_from_stderr(&stderr, output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let fetched = match kind {
            OperationKind::Download => {
                let path = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .last()
                    .map(PathBuf::from)
                    .ok_or_else(|| ActionFailure::new("yt-dlp did not report an output file"))?;
                FetchedMedia::Audio(path)
            }
            OperationKind::Metadata => {
                let value = serde_json::from_str(stdout.trim())
                    .map_err(|e| ActionFailure::new(format!("invalid metadata JSON: {}", e)))?;
                FetchedMedia::Metadata(value)
            }
            OperationKind::Captions => {
                let files = collect_caption_files(&self.work_dir, video_id)
                    .await
                    .map_err(|e| ActionFailure::from_io(&e))?;
                if files.is_empty() {
                    // Terminal: the platform has no captions for this item.
                    return Err(ActionFailure::new(format!(
                        "captions unavailable for {}",
                        video_id
                    )));
                }
                FetchedMedia::Captions(files)
            }
        };

        info!(client = %identity.name, operation = %kind, "yt-dlp finished: {}", fetched.summary());
        Ok(fetched)
    }
}

/// `youtube:` extractor argument for an identity and its tokens.
///
/// Extra request args whose key does not start with `--` are appended as
/// `key=value` fragments.
pub fn extractor_args(identity: &ClientIdentity, tokens: &TokenSet) -> String {
    let mut fragments = vec![format!("player_client={}", identity.name)];

    if !tokens.is_empty() {
        let po_tokens: Vec<String> = tokens
            .iter()
            .map(|(token_type, value)| format!("{}.{}+{}", identity.name, token_type, value))
            .collect();
        fragments.push(format!("po_token={}", po_tokens.join(",")));
    }

    fragments.extend(
        identity
            .extra_request_args
            .iter()
            .filter(|(key, _)| !key.starts_with("--"))
            .map(|(key, value)| format!("{}={}", key, value)),
    );

    format!("youtube:{}", fragments.join(";"))
}

/// HTTP status mentioned in yt-dlp output (`HTTP Error 403: Forbidden`).
pub fn parse_status_code(stderr: &str) -> Option<u16> {
    HTTP_STATUS
        .captures_iter(stderr)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn failure_from_stderr(stderr: &str, exit_code: Option<i32>) -> ActionFailure {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp terminated by signal".to_string(),
        });

    match parse_status_code(stderr) {
        Some(status) => ActionFailure::http(status, message),
        None => ActionFailure::new(message),
    }
}

/// Caption files written for `video_id` (`<id>.<lang>.vtt`).
async fn collect_caption_files(dir: &Path, video_id: &str) -> std::io::Result<Vec<PathBuf>> {
    let prefix = format!("{}.", video_id);
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".vtt") {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
