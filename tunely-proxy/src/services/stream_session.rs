//! Streaming session manager
//!
//! One [`StreamSession`] binds one client response to one extraction
//! subprocess. The session owns the child process and tears it down exactly
//! once, whichever of these happens first:
//! - the subprocess exits (normally or not),
//! - the sink stops accepting bytes (`pump`),
//! - the session is dropped, which is what happens when an HTTP client
//!   disconnects and hyper drops the response body.
//!
//! Response headers are committed only after the first chunk of audio is in
//! hand. Until then every failure is still reportable as a structured error;
//! after that the only way to signal failure is to cut the transfer short.

use axum::body::Bytes;
use futures::Stream;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::ExtractorConfig;

/// Longest accepted track id
const MAX_TRACK_ID_LEN: usize = 128;

/// Diagnostic lines containing this marker are logged as warnings
const FATAL_MARKER: &str = "ERROR";

/// Diagnostic lines containing this marker are logged at debug level
const WARNING_MARKER: &str = "WARNING";

/// How long to wait for the diagnostic reader after the subprocess exits
const DIAGNOSTIC_GRACE: Duration = Duration::from_millis(500);

/// Streaming path errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid track id: {0:?}")]
    InvalidTrackId(String),

    /// The extraction tool binary could not be started
    #[error("Extraction tool not found: {0}")]
    ExtractorNotFound(String),

    /// The subprocess failed before any audio was produced
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The subprocess failed after audio was handed to the client
    #[error("Stream failed after {bytes_sent} bytes: {reason}")]
    MidStreamFailure { bytes_sent: u64, reason: String },

    /// The sink stopped accepting bytes
    #[error("Client disconnected after {bytes_sent} bytes")]
    Disconnected { bytes_sent: u64 },

    /// Admission limit reached
    #[error("Too many concurrent streams")]
    Busy,
}

/// Accept non-empty ids of at most 128 characters from `[A-Za-z0-9_-]`
pub fn validate_track_id(id: &str) -> Result<(), StreamError> {
    let well_formed = !id.is_empty()
        && id.len() <= MAX_TRACK_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if well_formed {
        Ok(())
    } else {
        Err(StreamError::InvalidTrackId(id.to_string()))
    }
}

/// Content-Type for the audio container that starts with `chunk`
pub fn sniff_content_type(chunk: &[u8], fallback: &str) -> String {
    let Some(kind) = infer::get(chunk) else {
        return fallback.to_string();
    };

    match kind.mime_type() {
        "video/webm" | "video/x-matroska" => "audio/webm".to_string(),
        "video/mp4" | "audio/m4a" | "audio/x-m4a" => "audio/mp4".to_string(),
        mime if mime.starts_with("audio/") => mime.to_string(),
        _ => fallback.to_string(),
    }
}

/// How a session ended, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

/// Spawns and supervises extraction subprocesses
pub struct StreamManager {
    config: Arc<ExtractorConfig>,
    admission: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
}

impl StreamManager {
    pub fn new(config: ExtractorConfig) -> Self {
        let admission = (config.max_concurrent_streams > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_streams)));

        if admission.is_none() {
            warn!("No cap on concurrent extraction subprocesses (max_concurrent_streams = 0)");
        }

        Self {
            config: Arc::new(config),
            admission,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Number of sessions whose subprocess has not been torn down yet
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate, admit, spawn, and wait for the first chunk of audio.
    ///
    /// On success the returned session has either a first chunk pending or
    /// an extractor that already exited cleanly with no output.
    pub async fn open(&self, track_id: &str) -> Result<StreamSession, StreamError> {
        validate_track_id(track_id)?;

        let permit = match &self.admission {
            Some(semaphore) => Some(semaphore.clone().try_acquire_owned().map_err(|_| {
                warn!(
                    track_id = %track_id,
                    limit = self.config.max_concurrent_streams,
                    "Rejecting stream: concurrent extraction limit reached"
                );
                StreamError::Busy
            })?),
            None => None,
        };

        let session_id = Uuid::new_v4();
        let source_url = self.config.source_url(track_id);

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.program_args)
            .arg("-f")
            .arg(&self.config.format)
            .arg("-o")
            .arg("-")
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-progress")
            .args(&self.config.extra_args)
            .arg(&source_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                error!(
                    program = %self.config.program_name(),
                    "Extraction tool not found: {}", e
                );
                StreamError::ExtractorNotFound(self.config.program_name())
            } else {
                error!(
                    program = %self.config.program_name(),
                    "Failed to start extraction tool: {}", e
                );
                StreamError::ExtractionFailed(format!(
                    "failed to start {}: {}",
                    self.config.program_name(),
                    e
                ))
            }
        })?;

        let pid = child.id();

        // kill_on_drop reaps the child if we bail out here
        let stdout = child.stdout.take().ok_or_else(|| {
            StreamError::ExtractionFailed("extractor stdout was not captured".to_string())
        })?;

        let diagnostics = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_diagnostics(session_id, track_id.to_string(), stderr)));

        self.active.fetch_add(1, Ordering::SeqCst);

        info!(
            session_id = %session_id,
            track_id = %track_id,
            pid = ?pid,
            source = %source_url,
            "Extraction started"
        );

        let mut session = StreamSession {
            session_id,
            track_id: track_id.to_string(),
            child,
            pid,
            stdout,
            diagnostics,
            pending: None,
            content_type: self.config.default_content_type.clone(),
            chunk_size: self.config.chunk_size.max(1),
            bytes_sent: 0,
            started: Instant::now(),
            exited: false,
            closed: false,
            permit,
            active: Arc::clone(&self.active),
        };

        session
            .await_first_chunk(self.config.first_byte_timeout())
            .await?;

        Ok(session)
    }
}

/// Request-scoped binding between one client and one extraction subprocess
pub struct StreamSession {
    session_id: Uuid,
    track_id: String,
    child: Child,
    pid: Option<u32>,
    stdout: ChildStdout,
    /// Resolves to the last fatal-looking diagnostic line
    diagnostics: Option<JoinHandle<Option<String>>>,
    /// First chunk, read before headers were committed
    pending: Option<Bytes>,
    content_type: String,
    chunk_size: usize,
    bytes_sent: u64,
    started: Instant,
    /// Exit status has been collected
    exited: bool,
    /// Teardown has run
    closed: bool,
    permit: Option<OwnedSemaphorePermit>,
    active: Arc<AtomicUsize>,
}

impl StreamSession {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Content-Type for the response, sniffed from the first chunk
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// OS process id of the extraction subprocess
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Bytes handed out so far
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Next chunk of audio in production order; `Ok(None)` after a clean exit
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        if let Some(chunk) = self.pending.take() {
            self.bytes_sent += chunk.len() as u64;
            return Ok(Some(chunk));
        }

        if self.exited {
            self.teardown(Outcome::Completed);
            return Ok(None);
        }

        if self.closed {
            return Ok(None);
        }

        match self.read_chunk().await {
            Ok(Some(chunk)) => {
                self.bytes_sent += chunk.len() as u64;
                Ok(Some(chunk))
            }
            Ok(None) => self.finish().await.map(|()| None),
            Err(e) => {
                self.terminate(Outcome::Failed).await;
                Err(StreamError::MidStreamFailure {
                    bytes_sent: self.bytes_sent,
                    reason: format!("reading extractor output failed: {}", e),
                })
            }
        }
    }

    /// Forward all audio to `sink`, returning the number of bytes forwarded.
    ///
    /// A write failure is treated as a client disconnect: the subprocess is
    /// killed and reaped before this returns.
    pub async fn pump<W>(mut self, mut sink: W) -> Result<u64, StreamError>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(chunk) = self.next_chunk().await? {
            let written = async {
                sink.write_all(&chunk).await?;
                sink.flush().await
            }
            .await;

            if let Err(e) = written {
                debug!(
                    session_id = %self.session_id,
                    error = %e,
                    "Sink closed"
                );
                self.terminate(Outcome::Cancelled).await;
                return Err(StreamError::Disconnected {
                    bytes_sent: self.bytes_sent,
                });
            }
        }

        Ok(self.bytes_sent)
    }

    /// Response body stream owning this session.
    ///
    /// Dropping the stream (client disconnect) drops the session, which
    /// kills the subprocess. A failure after the first byte yields an I/O
    /// error so the transport aborts the response instead of ending it
    /// cleanly.
    pub fn into_body_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        async_stream::stream! {
            let mut session = self;
            loop {
                match session.next_chunk().await {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => break,
                    Err(e) => {
                        error!(
                            session_id = %session.session_id,
                            track_id = %session.track_id,
                            error = %e,
                            "Stream truncated"
                        );
                        yield Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    /// Everything up to the first chunk, or up to a clean exit without
    /// output, must happen within `timeout`.
    async fn await_first_chunk(&mut self, timeout: Duration) -> Result<(), StreamError> {
        let deadline = tokio::time::Instant::now() + timeout;

        let first = match tokio::time::timeout_at(deadline, self.read_chunk()).await {
            Ok(first) => first,
            Err(_) => return Err(self.first_byte_timed_out(timeout).await),
        };

        match first {
            Ok(Some(chunk)) => {
                self.content_type = sniff_content_type(&chunk, &self.content_type);
                debug!(
                    session_id = %self.session_id,
                    first_byte_ms = self.started.elapsed().as_millis() as u64,
                    content_type = %self.content_type,
                    "First audio chunk received"
                );
                self.pending = Some(chunk);
                Ok(())
            }
            // Output closed; the exit status decides, still within the deadline
            Ok(None) => match tokio::time::timeout_at(deadline, self.wait_for_exit()).await {
                Err(_) => Err(self.first_byte_timed_out(timeout).await),
                Ok(Ok(status)) if status.success() => {
                    debug!(session_id = %self.session_id, "Extractor exited cleanly without output");
                    Ok(())
                }
                Ok(Ok(status)) => {
                    let detail = self.diagnostic_summary().await;
                    self.teardown(Outcome::Failed);
                    Err(StreamError::ExtractionFailed(format!(
                        "extractor exited with {}{}",
                        status, detail
                    )))
                }
                Ok(Err(e)) => {
                    self.terminate(Outcome::Failed).await;
                    Err(StreamError::ExtractionFailed(format!(
                        "waiting for extractor failed: {}",
                        e
                    )))
                }
            },
            Err(e) => {
                self.terminate(Outcome::Failed).await;
                Err(StreamError::ExtractionFailed(format!(
                    "reading extractor output failed: {}",
                    e
                )))
            }
        }
    }

    /// Kill and reap an extractor that missed the first-byte deadline
    async fn first_byte_timed_out(&mut self, timeout: Duration) -> StreamError {
        warn!(
            session_id = %self.session_id,
            track_id = %self.track_id,
            timeout_ms = timeout.as_millis() as u64,
            "Extractor produced no audio in time, killing it"
        );
        self.terminate(Outcome::Failed).await;
        let detail = self.diagnostic_summary().await;
        StreamError::ExtractionFailed(format!("no audio within {:?}{}", timeout, detail))
    }

    async fn read_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self.stdout.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    async fn wait_for_exit(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.exited = true;
        Ok(status)
    }

    /// Output closed: collect the exit status and end the session
    async fn finish(&mut self) -> Result<(), StreamError> {
        match self.wait_for_exit().await {
            Ok(status) if status.success() => {
                self.teardown(Outcome::Completed);
                Ok(())
            }
            Ok(status) => {
                let detail = self.diagnostic_summary().await;
                self.teardown(Outcome::Failed);
                Err(StreamError::MidStreamFailure {
                    bytes_sent: self.bytes_sent,
                    reason: format!("extractor exited with {}{}", status, detail),
                })
            }
            Err(e) => {
                self.teardown(Outcome::Failed);
                Err(StreamError::MidStreamFailure {
                    bytes_sent: self.bytes_sent,
                    reason: format!("waiting for extractor failed: {}", e),
                })
            }
        }
    }

    /// Tear down and reap the subprocess
    async fn terminate(&mut self, outcome: Outcome) {
        self.teardown(outcome);
        if !self.exited {
            match self.child.wait().await {
                Ok(_) => self.exited = true,
                Err(e) => warn!(session_id = %self.session_id, "Failed to reap extractor: {}", e),
            }
        }
    }

    /// Last fatal-looking diagnostic line, formatted for an error message
    async fn diagnostic_summary(&mut self) -> String {
        let Some(handle) = self.diagnostics.take() else {
            return String::new();
        };

        match tokio::time::timeout(DIAGNOSTIC_GRACE, handle).await {
            Ok(Ok(Some(line))) => format!(" ({})", line),
            _ => String::new(),
        }
    }

    /// Runs at most once per session
    fn teardown(&mut self, outcome: Outcome) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.exited {
            if let Err(e) = self.child.start_kill() {
                debug!(session_id = %self.session_id, "Kill skipped: {}", e);
            }
        }

        self.permit.take();
        self.active.fetch_sub(1, Ordering::SeqCst);

        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match outcome {
            Outcome::Completed => info!(
                session_id = %self.session_id,
                track_id = %self.track_id,
                bytes_sent = self.bytes_sent,
                elapsed_ms,
                "Stream completed"
            ),
            Outcome::Failed => warn!(
                session_id = %self.session_id,
                track_id = %self.track_id,
                bytes_sent = self.bytes_sent,
                elapsed_ms,
                "Stream failed, extractor stopped"
            ),
            Outcome::Cancelled => info!(
                session_id = %self.session_id,
                track_id = %self.track_id,
                bytes_sent = self.bytes_sent,
                elapsed_ms,
                "Client disconnected, extractor killed"
            ),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let was_open = !self.closed;
        self.teardown(Outcome::Cancelled);

        // A killed extractor may leave grandchildren holding stderr open
        if was_open {
            if let Some(handle) = self.diagnostics.take() {
                handle.abort();
            }
        }
    }
}

/// Drain the subprocess diagnostic stream so it never blocks on a full pipe
async fn drain_diagnostics(
    session_id: Uuid,
    track_id: String,
    stderr: ChildStderr,
) -> Option<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut last_fatal = None;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if line.contains(FATAL_MARKER) {
                    warn!(session_id = %session_id, track_id = %track_id, "extractor: {}", line);
                    last_fatal = Some(line.to_string());
                } else if line.contains(WARNING_MARKER) {
                    debug!(session_id = %session_id, track_id = %track_id, "extractor: {}", line);
                } else {
                    trace!(session_id = %session_id, "extractor: {}", line);
                }
            }
            Err(e) => {
                debug!(session_id = %session_id, "Diagnostic stream closed: {}", e);
                break;
            }
        }
    }

    last_fatal
}
