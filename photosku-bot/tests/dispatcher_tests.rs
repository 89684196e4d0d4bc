//! Per-user dispatcher tests: ordering, parallelism, idle retirement, shutdown

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use helpers::{photo_event, text_event, RecordingOutbound, Sent, StaticMediaSource};
use photosku_bot::engine::Catalog;
use photosku_bot::session::{ConversationEngine, Dispatcher, DispatcherSettings};
use photosku_bot::store::{MemoryEntityStore, MemoryObjectStore};
use photosku_bot::transport::messages;
use photosku_bot::transport::{MediaRef, MediaSource};
use photosku_common::Result;
use tokio::sync::Semaphore;

const WAIT: Duration = Duration::from_secs(5);

/// Media source that holds fetches of `gated_file` until a permit is released
struct GatedMediaSource {
    gated_file: String,
    gate: Semaphore,
}

#[async_trait]
impl MediaSource for GatedMediaSource {
    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>> {
        if media.file_id == self.gated_file {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| photosku_common::Error::Internal(e.to_string()))?;
            permit.forget();
        }
        Ok(StaticMediaSource::bytes_for(&media.file_id))
    }
}

fn dispatcher_with(
    media: Arc<dyn MediaSource>,
    settings: DispatcherSettings,
) -> (Dispatcher, Arc<RecordingOutbound>) {
    let catalog = Catalog::new(
        Arc::new(MemoryEntityStore::new()),
        Arc::new(MemoryObjectStore::new()),
        media,
    );
    let engine = Arc::new(ConversationEngine::new(catalog, None));
    let outbound = Arc::new(RecordingOutbound::new());
    let dispatcher = Dispatcher::new(engine, outbound.clone(), settings);
    (dispatcher, outbound)
}

fn settings(worker_idle: Duration) -> DispatcherSettings {
    DispatcherSettings {
        queue_capacity: 4,
        worker_idle,
    }
}

#[tokio::test]
async fn test_events_of_one_user_are_handled_in_order() {
    let (dispatcher, outbound) =
        dispatcher_with(Arc::new(StaticMediaSource::new()), settings(Duration::from_secs(60)));

    dispatcher.dispatch(text_event(1, "/add")).await;
    for i in 0..6 {
        dispatcher
            .dispatch(photo_event(1, &format!("p{}", i), None))
            .await;
    }
    dispatcher.dispatch(text_event(1, "1.2345")).await;

    outbound.wait_for(8, WAIT).await;
    let texts = outbound.texts_for(1);
    assert_eq!(texts.first().map(String::as_str), Some(messages::UPLOAD_PROMPT));
    assert!(texts[1..7].iter().all(|t| t == messages::PHOTO_SAVED));
    assert_eq!(texts[7], messages::apply_summary(6, 6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_user_does_not_block_others() {
    let media = Arc::new(GatedMediaSource {
        gated_file: "slow".to_string(),
        gate: Semaphore::new(0),
    });
    let (dispatcher, outbound) = dispatcher_with(media.clone(), settings(Duration::from_secs(60)));

    dispatcher.dispatch(text_event(1, "/add")).await;
    outbound.wait_for(1, WAIT).await;
    dispatcher.dispatch(photo_event(1, "slow", None)).await;

    dispatcher.dispatch(text_event(2, "hello")).await;
    let sent = outbound.wait_for(2, WAIT).await;
    assert_eq!(sent[1].external_id(), 2);
    assert_eq!(outbound.texts_for(1), vec![messages::UPLOAD_PROMPT]);

    media.gate.add_permits(1);
    outbound.wait_for(3, WAIT).await;
    assert_eq!(
        outbound.texts_for(1),
        vec![messages::UPLOAD_PROMPT, messages::PHOTO_SAVED]
    );
}

#[tokio::test]
async fn test_idle_worker_retires_and_state_survives() {
    let (dispatcher, outbound) =
        dispatcher_with(Arc::new(StaticMediaSource::new()), settings(Duration::from_millis(50)));

    dispatcher.dispatch(text_event(1, "/add")).await;
    outbound.wait_for(1, WAIT).await;
    assert_eq!(dispatcher.active_workers(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dispatcher.active_workers(), 0);

    // A fresh worker picks up the persisted uploading state
    dispatcher.dispatch(photo_event(1, "p1", None)).await;
    outbound.wait_for(2, WAIT).await;
    assert_eq!(
        outbound.texts_for(1),
        vec![messages::UPLOAD_PROMPT, messages::PHOTO_SAVED]
    );
}

#[tokio::test]
async fn test_one_worker_per_active_user() {
    let (dispatcher, outbound) =
        dispatcher_with(Arc::new(StaticMediaSource::new()), settings(Duration::from_secs(60)));

    for user in 1..=3 {
        dispatcher.dispatch(text_event(user, "hi")).await;
        dispatcher.dispatch(text_event(user, "hi again")).await;
    }
    outbound.wait_for(6, WAIT).await;

    assert_eq!(dispatcher.active_workers(), 3);
}

#[tokio::test]
async fn test_shutdown_drains_queued_events() {
    let (dispatcher, outbound) =
        dispatcher_with(Arc::new(StaticMediaSource::new()), settings(Duration::from_secs(60)));

    dispatcher.dispatch(text_event(1, "/add")).await;
    for i in 0..3 {
        dispatcher
            .dispatch(photo_event(1, &format!("p{}", i), None))
            .await;
    }
    dispatcher.dispatch(text_event(2, "hello")).await;

    assert!(dispatcher.shutdown(WAIT).await);
    assert_eq!(dispatcher.active_workers(), 0);
    assert_eq!(outbound.sent().len(), 5);

    // Nothing is accepted after shutdown
    dispatcher.dispatch(text_event(3, "late")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(outbound
        .sent()
        .iter()
        .all(|sent: &Sent| sent.external_id() != 3));
}
