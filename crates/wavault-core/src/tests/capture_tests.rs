use super::*;
use tokio::sync::oneshot;
use wavault_api::types::{
    DeletionNotice, DeliveryMode, InboundMessage, MediaRef, MessageBatch, MessageEnvelope,
    SenderId, TransportEvent,
};

struct Running {
    ctx: TestContext,
    shutdown: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<Result<(), crate::CoreError>>,
}

impl Running {
    async fn start() -> Self {
        let ctx = TestContext::new();
        let manager = ctx.manager().await;
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(manager.run(shutdown_rx));
        let transport = ctx.transport.clone();
        wait_until("connect", || transport.connect_count() >= 1).await;
        Self {
            ctx,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.await.expect("join").expect("run");
    }
}

#[tokio::test]
async fn text_message_yields_one_message_log_line() {
    let run = Running::start().await;
    run.ctx
        .transport
        .emit(notify_batch(vec![text_message(SENDER, "hello")]))
        .await;
    wait_until("text line", || {
        run.ctx.read_log("messages.log").contains("hello")
    })
    .await;
    let log = run.ctx.read_log("messages.log");
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains(&format!(" | {SENDER} | text | hello")));
    run.stop().await;
}

#[tokio::test]
async fn image_message_yields_blob_and_media_log_line() {
    let run = Running::start().await;
    run.ctx
        .fetcher
        .insert(&MediaRef::new("ref-img"), vec![0xFFu8; 2048])
        .await;
    run.ctx
        .transport
        .emit(notify_batch(vec![image_message(SENDER, "ref-img")]))
        .await;
    wait_until("media line", || !run.ctx.read_log("media.log").is_empty()).await;

    let files = run.ctx.media_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".jpg"), "got {files:?}");
    assert!(files[0].starts_with("1234@s.whatsapp.net_"));
    let stored = std::fs::read(run.ctx.archive_path("media").join(&files[0])).unwrap();
    assert_eq!(stored.len(), 2048);

    let log = run.ctx.read_log("media.log");
    assert!(log.contains(&format!(" | {SENDER} | image | media/")));
    run.stop().await;
}

#[tokio::test]
async fn view_once_video_is_archived_as_ephemeral() {
    let run = Running::start().await;
    run.ctx
        .fetcher
        .insert(&MediaRef::new("ref-vo"), b"video-bytes".to_vec())
        .await;
    run.ctx
        .transport
        .emit(notify_batch(vec![view_once_video_message(SENDER, "ref-vo")]))
        .await;
    wait_until("media line", || !run.ctx.read_log("media.log").is_empty()).await;

    let files = run.ctx.media_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_ephemeral.mp4"), "got {files:?}");
    assert!(run.ctx.read_log("media.log").contains(" | video | "));
    run.stop().await;
}

#[tokio::test]
async fn media_log_line_appears_only_after_blob_is_complete() {
    let run = Running::start().await;
    let payload = vec![1u8; 1 << 16];
    run.ctx
        .fetcher
        .insert(&MediaRef::new("ref-big"), payload.clone())
        .await;
    run.ctx
        .transport
        .emit(notify_batch(vec![image_message(SENDER, "ref-big")]))
        .await;
    wait_until("media line", || !run.ctx.read_log("media.log").is_empty()).await;

    // The line's blob must already be fully on disk the moment the line
    // is readable.
    let log = run.ctx.read_log("media.log");
    let path = log
        .lines()
        .next()
        .and_then(|l| l.rsplit(" | ").next())
        .expect("payload column");
    let stored = std::fs::read(run.ctx.archive_path(path)).expect("blob exists");
    assert_eq!(stored.len(), payload.len());
    run.stop().await;
}

#[tokio::test]
async fn empty_envelope_is_skipped_without_records() {
    let run = Running::start().await;
    run.ctx
        .transport
        .emit(notify_batch(vec![
            InboundMessage {
                sender: SenderId::new(SENDER),
                timestamp_ms: 1,
                envelope: MessageEnvelope::default(),
            },
            text_message(SENDER, "sentinel"),
        ]))
        .await;
    wait_until("sentinel", || {
        run.ctx.read_log("messages.log").contains("sentinel")
    })
    .await;
    let log = run.ctx.read_log("messages.log");
    assert_eq!(log.lines().count(), 1, "only the sentinel: {log}");
    assert!(run.ctx.read_log("media.log").is_empty());
    run.stop().await;
}

#[tokio::test]
async fn broadcast_sender_is_not_archived() {
    let run = Running::start().await;
    run.ctx
        .transport
        .emit(notify_batch(vec![
            text_message("status@broadcast", "status post"),
            text_message(SENDER, "sentinel"),
        ]))
        .await;
    wait_until("sentinel", || {
        run.ctx.read_log("messages.log").contains("sentinel")
    })
    .await;
    assert!(!run.ctx.read_log("messages.log").contains("status post"));
    run.stop().await;
}

#[tokio::test]
async fn history_batches_are_ignored() {
    let run = Running::start().await;
    run.ctx
        .transport
        .emit(TransportEvent::MessagesUpsert(MessageBatch {
            delivery: DeliveryMode::Append,
            messages: vec![text_message(SENDER, "history")],
        }))
        .await;
    run.ctx
        .transport
        .emit(notify_batch(vec![text_message(SENDER, "sentinel")]))
        .await;
    wait_until("sentinel", || {
        run.ctx.read_log("messages.log").contains("sentinel")
    })
    .await;
    assert!(!run.ctx.read_log("messages.log").contains("history"));
    run.stop().await;
}

#[tokio::test]
async fn deletion_event_is_recorded_losslessly() {
    let run = Running::start().await;
    let detail = serde_json::json!({"keys": [{"remoteJid": SENDER, "id": "MSG1"}]});
    run.ctx
        .transport
        .emit(TransportEvent::MessagesDelete(DeletionNotice {
            sender: Some(SenderId::new(SENDER)),
            detail: detail.clone(),
        }))
        .await;
    wait_until("deletion line", || {
        run.ctx.read_log("messages.log").contains("deleted")
    })
    .await;
    let log = run.ctx.read_log("messages.log");
    let line = log.lines().next().unwrap();
    assert!(line.contains(&format!(" | {SENDER} | deleted | ")));
    let payload = line.rsplit(" | ").next().unwrap().replace("\\|", "|");
    let parsed: serde_json::Value = serde_json::from_str(&payload).expect("lossless json");
    assert_eq!(parsed, detail);
    run.stop().await;
}

#[tokio::test]
async fn caption_is_archived_alongside_the_blob() {
    let run = Running::start().await;
    run.ctx
        .fetcher
        .insert(&MediaRef::new("ref-cap"), b"img".to_vec())
        .await;
    let mut message = image_message(SENDER, "ref-cap");
    message.envelope.image.as_mut().unwrap().caption = Some("the caption".to_string());
    run.ctx.transport.emit(notify_batch(vec![message])).await;
    wait_until("caption line", || {
        run.ctx.read_log("messages.log").contains("the caption")
    })
    .await;
    wait_until("media line", || !run.ctx.read_log("media.log").is_empty()).await;
    assert!(run
        .ctx
        .read_log("messages.log")
        .contains(&format!(" | {SENDER} | text | the caption")));
    run.stop().await;
}

#[tokio::test]
async fn transient_retrieval_failure_logs_error_and_leaves_no_partial_blob() {
    let run = Running::start().await;
    run.ctx.fetcher.fail_network_times(1).await;
    run.ctx
        .fetcher
        .insert(&MediaRef::new("ref-flaky"), b"payload".to_vec())
        .await;
    run.ctx
        .transport
        .emit(notify_batch(vec![image_message(SENDER, "ref-flaky")]))
        .await;
    wait_until("error line", || {
        run.ctx.read_log("errors.log").contains("retrieval")
    })
    .await;
    assert!(run.ctx.media_files().is_empty());
    assert!(run.ctx.read_log("media.log").is_empty());

    // The next delivery of the same reference succeeds and archives.
    run.ctx
        .transport
        .emit(notify_batch(vec![image_message(SENDER, "ref-flaky")]))
        .await;
    wait_until("media line", || !run.ctx.read_log("media.log").is_empty()).await;
    assert_eq!(run.ctx.media_files().len(), 1);
    run.stop().await;
}
