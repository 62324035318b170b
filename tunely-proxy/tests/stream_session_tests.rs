//! Streaming session lifecycle tests
//!
//! Fake extraction tools are small shell scripts; liveness is checked
//! through /proc.

#![cfg(unix)]

mod helpers;

use futures::StreamExt;
use helpers::*;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tunely_proxy::config::ExtractorConfig;
use tunely_proxy::services::stream_session::{StreamError, StreamManager};

fn manager_for(dir: &TempDir, body: &str) -> StreamManager {
    let script = write_script(dir, "extractor.sh", body);
    StreamManager::new(extractor_config(&script))
}

#[tokio::test]
async fn test_working_extractor_streams_to_completion() {
    // Given: an extractor that writes a short MP3-tagged payload and exits 0
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, FINITE_SCRIPT);

    // When: the session is pumped into a buffer
    let session = manager.open("dQw4w9WgXcQ").await.unwrap();
    assert_eq!(session.content_type(), "audio/mpeg");
    assert_eq!(manager.active_streams(), 1);

    let mut sink = Vec::new();
    let bytes = session.pump(&mut sink).await.unwrap();

    // Then: every byte arrives in order and the session is released
    assert_eq!(sink, b"ID3-tunely-audio");
    assert_eq!(bytes, sink.len() as u64);
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_unrecognized_container_uses_default_content_type() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, "printf 'no magic here'\nexit 0");

    let session = manager.open("abc").await.unwrap();

    assert_eq!(session.content_type(), "audio/mp4");
}

#[tokio::test]
async fn test_clean_exit_without_output_is_empty_stream() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, "exit 0");

    let mut session = manager.open("abc").await.unwrap();

    assert!(session.next_chunk().await.unwrap().is_none());
    assert_eq!(session.bytes_sent(), 0);
    drop(session);
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_missing_extractor() {
    let manager = StreamManager::new(missing_extractor_config());

    let result = manager.open("abc").await;

    assert!(matches!(result, Err(StreamError::ExtractorNotFound(_))));
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_invalid_id_never_spawns() {
    // A missing tool would report ExtractorNotFound if anything were spawned
    let manager = StreamManager::new(missing_extractor_config());

    for id in ["", "a b", "../../etc/passwd", "x;rm -rf /"] {
        assert!(matches!(
            manager.open(id).await,
            Err(StreamError::InvalidTrackId(_))
        ));
    }
}

#[tokio::test]
async fn test_failure_before_first_byte() {
    // Given: an extractor that reports an error and exits 1 without output
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, FAILING_SCRIPT);

    // When: a stream is opened
    let result = manager.open("unavailable1").await;

    // Then: the failure is reportable, with the diagnostic line attached
    match result {
        Err(StreamError::ExtractionFailed(message)) => {
            assert!(message.contains("Video unavailable"), "got: {message}");
        }
        Err(other) => panic!("expected ExtractionFailed, got {other:?}"),
        Ok(_) => panic!("expected ExtractionFailed, got a session"),
    }
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_failure_after_first_byte_is_mid_stream() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, TRUNCATING_SCRIPT);

    let mut session = manager.open("abc").await.unwrap();

    let mut received = Vec::new();
    let error = loop {
        match session.next_chunk().await {
            Ok(Some(chunk)) => received.extend_from_slice(&chunk),
            Ok(None) => panic!("expected a mid-stream failure"),
            Err(e) => break e,
        }
    };

    assert_eq!(received, b"partial-audio");
    match error {
        StreamError::MidStreamFailure { bytes_sent, .. } => assert_eq!(bytes_sent, 13),
        other => panic!("expected MidStreamFailure, got {other:?}"),
    }
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_first_byte_timeout_kills_extractor() {
    // Given: an extractor that never writes
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "silent.sh", SILENT_SCRIPT);
    let manager = StreamManager::new(ExtractorConfig {
        first_byte_timeout_ms: 200,
        ..extractor_config(&script)
    });

    // When: a stream is opened
    let started = Instant::now();
    let result = manager.open("abc").await;

    // Then: the open fails well before the extractor would have exited
    assert!(matches!(result, Err(StreamError::ExtractionFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_closed_output_then_hang_hits_first_byte_timeout() {
    // Given: an extractor that closes its output without writing, then lingers
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "closed.sh", "exec 1>&-\nsleep 3\nexit 0");
    let manager = StreamManager::new(ExtractorConfig {
        first_byte_timeout_ms: 200,
        ..extractor_config(&script)
    });

    // When: a stream is opened
    let started = Instant::now();
    let result = manager.open("abc").await;

    // Then: it is killed at the deadline instead of waiting for the exit
    assert!(matches!(result, Err(StreamError::ExtractionFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_extractor_command_line() {
    // Output only when the expected flags and source locator are present
    let dir = TempDir::new().unwrap();
    let manager = manager_for(
        &dir,
        r#"for arg in "$@"; do last="$arg"; done
case " $* " in
  *" -f bestaudio[ext=m4a]/bestaudio/best -o - --no-playlist --quiet --no-progress "*) ;;
  *) exit 9 ;;
esac
[ "$last" = "https://www.youtube.com/watch?v=dQw4w9WgXcQ" ] || exit 9
printf 'ID3-args-ok'"#,
    );

    let session = manager.open("dQw4w9WgXcQ").await.unwrap();
    let mut sink = Vec::new();
    session.pump(&mut sink).await.unwrap();

    assert_eq!(sink, b"ID3-args-ok");
}

#[tokio::test]
async fn test_sink_disconnect_kills_extractor() {
    // Given: an endless extractor pumping into an in-memory pipe
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, ENDLESS_SCRIPT);
    let session = manager.open("abc").await.unwrap();
    let pid = session.pid().unwrap();
    assert!(!process_gone(pid));

    let (writer, mut reader) = tokio::io::duplex(8 * 1024);
    let pump = tokio::spawn(session.pump(writer));

    // When: the client reads a little and goes away
    let mut buf = vec![0u8; 4096];
    let n = reader.read(&mut buf).await.unwrap();
    assert!(n > 0);
    drop(reader);

    // Then: the pump reports the disconnect and the child is reaped
    let result = tokio::time::timeout(Duration::from_secs(5), pump)
        .await
        .unwrap()
        .unwrap();
    match result {
        Err(StreamError::Disconnected { bytes_sent }) => assert!(bytes_sent > 0),
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert!(process_gone(pid));
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_dropping_body_stream_kills_extractor() {
    // Given: an endless extractor behind a response body stream
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, ENDLESS_SCRIPT);
    let session = manager.open("abc").await.unwrap();
    let pid = session.pid().unwrap();

    let mut body = Box::pin(session.into_body_stream());
    for _ in 0..3 {
        let chunk = body.next().await.unwrap().unwrap();
        assert!(!chunk.is_empty());
    }

    // When: the HTTP layer drops the body (client disconnect)
    drop(body);

    // Then: no extractor survives
    assert!(wait_until_gone(pid, Duration::from_secs(3)).await);
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_body_stream_yields_error_on_truncation() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, TRUNCATING_SCRIPT);
    let session = manager.open("abc").await.unwrap();

    let items: Vec<_> = session.into_body_stream().collect().await;

    assert!(items.first().unwrap().is_ok());
    assert!(items.last().unwrap().is_err());
}

#[tokio::test]
async fn test_admission_limit() {
    // Given: a cap of one concurrent extractor
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "endless.sh", ENDLESS_SCRIPT);
    let manager = StreamManager::new(ExtractorConfig {
        max_concurrent_streams: 1,
        ..extractor_config(&script)
    });

    let first = manager.open("first").await.unwrap();

    // When: a second stream is requested
    let second = manager.open("second").await;

    // Then: it is turned away until the first one ends
    assert!(matches!(second, Err(StreamError::Busy)));

    drop(first);
    let third = manager.open("third").await.unwrap();
    assert_eq!(manager.active_streams(), 1);
    drop(third);
    assert_eq!(manager.active_streams(), 0);
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&dir, ENDLESS_SCRIPT);

    let a = manager.open("aaa").await.unwrap();
    let b = manager.open("bbb").await.unwrap();
    let (pid_a, pid_b) = (a.pid().unwrap(), b.pid().unwrap());
    assert_ne!(pid_a, pid_b);
    assert_ne!(a.session_id(), b.session_id());

    drop(a);

    assert!(wait_until_gone(pid_a, Duration::from_secs(3)).await);
    assert!(!process_gone(pid_b));
    assert_eq!(manager.active_streams(), 1);
    drop(b);
}
