use etl::checkpoint::CheckpointStore;
use etl::checkpoint::file::FileCheckpointStore;
use etl::replication::apply::ApplyLoopResult;
use etl::sink::memory::MemorySink;
use etl::test_utils::event::{insert, rotation, row};
use etl::test_utils::notifying_store::NotifyingCheckpointStore;
use etl::test_utils::pipeline::create_pipeline;
use etl::test_utils::source::create_scripted_source;
use etl::test_utils::test_sink_wrapper::TestSinkWrapper;
use etl::types::{Cell, Checkpoint};
use telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn restarted_pipeline_resumes_from_file_checkpoint() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("checkpoint.yaml");

    // First run: rotate, stream a row and shut down.
    let store = NotifyingCheckpointStore::wrap(FileCheckpointStore::new(&path));
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let rotation_notify = store
        .notify_on_save(Checkpoint::new("mysql-bin.000009", 4))
        .await;
    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push(rotation("mysql-bin.000009", 4), None);
    rotation_notify.notified().await;

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(11))])]),
        "mysql-bin.000009",
        1_337,
    );
    events_notify.notified().await;

    let expected = Checkpoint::new("mysql-bin.000009", 1_337);
    let result = pipeline.shutdown_and_wait().await.unwrap();
    assert_eq!(
        result,
        Some(ApplyLoopResult::Shutdown {
            checkpoint: Some(expected.clone())
        })
    );

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(contents.contains("log_file: mysql-bin.000009"));
    assert!(contents.contains("log_position: 1337"));

    // Second run: a fresh store over the same file resumes where the first run stopped.
    let store = FileCheckpointStore::new(&path);
    assert_eq!(store.load().await.unwrap(), Some(expected.clone()));

    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store, source, sink.clone());

    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(12))])]),
        "mysql-bin.000009",
        1_600,
    );
    events_notify.notified().await;

    let requests = handle.requests().await;
    assert!(requests[0].resume);
    assert_eq!(requests[0].position, Some(expected));

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_checkpoint_file_starts_without_checkpoint() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoint.yaml");
    tokio::fs::write(&path, "log_file: [unterminated").await.unwrap();

    let store = FileCheckpointStore::new(&path);
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store, source, sink.clone());

    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "mysql-bin.000001",
        310,
    );
    events_notify.notified().await;

    let requests = handle.requests().await;
    assert!(!requests[0].resume);
    assert_eq!(requests[0].position, None);

    pipeline.shutdown_and_wait().await.unwrap();
}
