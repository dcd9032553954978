//! Integration tests for SSE snapshot streaming.

use bytes::Bytes;
use devguard_client::streaming::{SnapshotAccumulator, SnapshotEvent, SnapshotStream, StreamState};
use devguard_client::transport::{ByteStream, TransportError};
use devguard_client::DevGuardError;
use futures::stream;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn delta(content: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

fn body(chunks: Vec<Result<Vec<u8>, TransportError>>) -> ByteStream {
    Box::pin(stream::iter(
        chunks.into_iter().map(|c| c.map(Bytes::from)),
    ))
}

fn ok_chunks<S: AsRef<[u8]>>(chunks: &[S]) -> ByteStream {
    body(chunks.iter().map(|c| Ok(c.as_ref().to_vec())).collect())
}

async fn snapshots(stream: SnapshotStream) -> (Vec<String>, StreamState) {
    let mut seen = Vec::new();
    let outcome = stream.render_with(|s| seen.push(s.to_string())).await;
    assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
    (seen, outcome.state)
}

#[tokio::test]
async fn test_done_sentinel_ends_loop() {
    // Arrange
    let second = format!("{}data: [DONE]\n", delta("lo"));
    let stream = SnapshotStream::new(ok_chunks(&[delta("Hel"), second]));

    // Act
    let (seen, state) = snapshots(stream).await;

    // Assert
    assert_eq!(seen, vec!["Hel", "Hello"]);
    assert_eq!(state, StreamState::DoneSentinel);
}

#[tokio::test]
async fn test_line_split_across_chunks() {
    // Arrange
    let stream = SnapshotStream::new(ok_chunks(&[
        "data: {\"choi",
        "ces\":[{\"delta\":{\"content\":\"X\"}}]}\n",
    ]));

    // Act
    let (seen, state) = snapshots(stream).await;

    // Assert
    assert_eq!(seen, vec!["X"]);
    assert_eq!(state, StreamState::Completed);
}

#[tokio::test]
async fn test_comments_and_blank_lines_are_skipped() {
    let stream = SnapshotStream::new(ok_chunks(&[
        ": keep-alive\n".to_string(),
        "\n".to_string(),
        delta("Y"),
    ]));

    let (seen, _) = snapshots(stream).await;

    assert_eq!(seen, vec!["Y"]);
}

#[tokio::test]
async fn test_non_data_lines_are_skipped() {
    let stream = SnapshotStream::new(ok_chunks(&[
        "notadata: line\n".to_string(),
        "event: message\n".to_string(),
        delta("Z"),
    ]));

    let (seen, _) = snapshots(stream).await;

    assert_eq!(seen, vec!["Z"]);
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_last_snapshot() {
    // Arrange
    let stream = SnapshotStream::new(body(vec![
        Ok(delta("partial ").into_bytes()),
        Ok(delta("report").into_bytes()),
        Err(TransportError::InvalidResponse {
            message: "body closed".to_string(),
        }),
        Ok(delta(" never").into_bytes()),
    ]));

    // Act
    let mut seen = Vec::new();
    let outcome = stream.render_with(|s| seen.push(s.to_string())).await;

    // Assert
    assert_eq!(seen, vec!["partial ", "partial report"]);
    assert_eq!(outcome.state, StreamState::Errored);
    assert_eq!(outcome.content, "partial report");
    match outcome.error {
        Some(DevGuardError::Stream {
            partial_content, ..
        }) => assert_eq!(partial_content.as_deref(), Some("partial report")),
        other => panic!("expected stream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_snapshots_only_grow() {
    let pieces = ["## Summary\n", "SQL injection ", "in `db.ts`", "", " line 42."];
    let chunks: Vec<String> = pieces.iter().map(|p| delta(p)).collect();
    let stream = SnapshotStream::new(ok_chunks(&chunks));

    let (seen, _) = snapshots(stream).await;

    assert_eq!(seen.len(), 4);
    for pair in seen.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
        assert!(pair[1].len() > pair[0].len());
    }
    assert_eq!(seen.last().unwrap(), "## Summary\nSQL injection in `db.ts` line 42.");
}

#[tokio::test]
async fn test_every_split_offset_gives_same_content() {
    let line = delta("Hello, wörld ✓");
    let bytes = line.as_bytes();

    for offset in 0..=bytes.len() {
        let stream = SnapshotStream::new(ok_chunks(&[&bytes[..offset], &bytes[offset..]]));
        let content = stream.collect_content().await.unwrap();
        assert_eq!(content, "Hello, wörld ✓", "split at byte {offset}");
    }
}

#[test_case(&[10, 30] ; "three chunks")]
#[test_case(&[1, 2, 3, 4] ; "tiny leading chunks")]
#[test_case(&[43] ; "split inside multibyte char")]
#[tokio::test]
async fn test_multi_way_split(offsets: &[usize]) {
    let line = format!("{}{}", delta("café "), delta("ok"));
    let bytes = line.as_bytes();

    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets {
        let offset = offset.min(bytes.len());
        chunks.push(bytes[start..offset].to_vec());
        start = offset;
    }
    chunks.push(bytes[start..].to_vec());

    let stream = SnapshotStream::new(ok_chunks(&chunks));
    let (seen, _) = snapshots(stream).await;

    assert_eq!(seen, vec!["café ", "café ok"]);
}

#[tokio::test]
async fn test_lines_after_sentinel_are_ignored() {
    let first = format!("{}data: [DONE]\n{}", delta("kept"), delta(" same chunk"));
    let stream = SnapshotStream::new(ok_chunks(&[first, delta(" later chunk")]));

    let (seen, state) = snapshots(stream).await;

    assert_eq!(seen, vec!["kept"]);
    assert_eq!(state, StreamState::DoneSentinel);
}

#[tokio::test]
async fn test_multibyte_char_split_across_chunks() {
    let line = delta("naïve");
    let bytes = line.as_bytes();
    let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

    let stream = SnapshotStream::new(ok_chunks(&[&bytes[..split], &bytes[split..]]));
    let content = stream.collect_content().await.unwrap();

    assert_eq!(content, "naïve");
    assert!(!content.contains('\u{FFFD}'));
}

#[tokio::test]
async fn test_crlf_line_endings() {
    let line = delta("windows").replace('\n', "\r\n");
    let stream = SnapshotStream::new(ok_chunks(&[line, "data: [DONE]\r\n".to_string()]));

    let (seen, state) = snapshots(stream).await;

    assert_eq!(seen, vec!["windows"]);
    assert_eq!(state, StreamState::DoneSentinel);
}

#[tokio::test]
async fn test_unterminated_trailing_line_is_discarded() {
    let mut tail = delta("lost");
    tail.pop();
    let stream = SnapshotStream::new(ok_chunks(&[delta("kept"), tail]));

    let (seen, state) = snapshots(stream).await;

    assert_eq!(seen, vec!["kept"]);
    assert_eq!(state, StreamState::Completed);
}

#[tokio::test]
async fn test_malformed_line_holds_back_later_lines() {
    let stream = SnapshotStream::new(ok_chunks(&[
        "data: {not json}\n".to_string(),
        delta("after"),
    ]));

    let (seen, state) = snapshots(stream).await;

    assert!(seen.is_empty());
    assert_eq!(state, StreamState::Completed);
}

#[tokio::test]
async fn test_events_without_content_emit_nothing() {
    let stream = SnapshotStream::new(ok_chunks(&[
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n".to_string(),
        "data: {\"choices\":[]}\n".to_string(),
        delta(""),
        delta("text"),
    ]));

    let (seen, _) = snapshots(stream).await;

    assert_eq!(seen, vec!["text"]);
}

#[tokio::test]
async fn test_channel_consumer_receives_finished_last() {
    let stream = SnapshotStream::new(ok_chunks(&[delta("a"), delta("b")]));
    let mut rx = stream.into_channel(1);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(match event {
            SnapshotEvent::Snapshot(s) => s,
            SnapshotEvent::Failed(e) => format!("failed: {e}"),
            SnapshotEvent::Finished(state) => format!("finished: {state}"),
        });
    }

    assert_eq!(events, vec!["a", "ab", "finished: completed"]);
}

#[tokio::test]
async fn test_dropping_receiver_cancels_stream() {
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, TransportError>>();
    tx.unbounded_send(Ok(Bytes::from(delta("first")))).unwrap();
    let stream = SnapshotStream::new(Box::pin(rx));
    let mut events = stream.into_channel(1);

    match events.recv().await {
        Some(SnapshotEvent::Snapshot(s)) => assert_eq!(s, "first"),
        other => panic!("expected snapshot, got {other:?}"),
    }
    drop(events);

    tx.unbounded_send(Ok(Bytes::from(delta("second")))).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !tx.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_dropping_receiver_releases_idle_body() {
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, TransportError>>();
    tx.unbounded_send(Ok(Bytes::from(delta("only")))).unwrap();
    let stream = SnapshotStream::new(Box::pin(rx));
    let mut events = stream.into_channel(4);

    match events.recv().await {
        Some(SnapshotEvent::Snapshot(s)) => assert_eq!(s, "only"),
        other => panic!("expected snapshot, got {other:?}"),
    }
    drop(events);

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !tx.is_closed() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[test]
fn test_stream_on_blocking_executor() {
    let stream = SnapshotStream::new(ok_chunks(&[delta("sync "), delta("caller")]));

    let content = tokio_test::block_on(stream.collect_content()).unwrap();

    assert_eq!(content, "sync caller");
}

#[test]
fn test_accumulator_used_synchronously() {
    let mut accumulator = SnapshotAccumulator::new();

    assert_eq!(accumulator.state(), StreamState::Idle);
    assert_eq!(accumulator.feed(delta("one").as_bytes()), vec!["one"]);
    assert_eq!(accumulator.state(), StreamState::Streaming);
    assert_eq!(accumulator.feed(b"data: [DONE]\n"), Vec::<String>::new());
    assert_eq!(accumulator.state(), StreamState::DoneSentinel);
    assert!(accumulator.feed(delta("two").as_bytes()).is_empty());
    assert_eq!(accumulator.content(), "one");
}
