use etl::checkpoint::CheckpointStore;
use etl::checkpoint::memory::MemoryCheckpointStore;
use etl::error::ErrorKind;
use etl::replication::apply::{ApplyLoopResult, LoopPhase};
use etl::sink::memory::MemorySink;
use etl::test_utils::event::{commit, count_actions, delete, insert, rotation, row, update};
use etl::test_utils::notifying_store::NotifyingCheckpointStore;
use etl::test_utils::pipeline::{PipelineBuilder, create_pipeline};
use etl::test_utils::source::create_scripted_source;
use etl::test_utils::test_sink_wrapper::TestSinkWrapper;
use etl::types::{Cell, ChangeAction, Checkpoint};
use telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn change_events_are_forwarded_in_binlog_order() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let rows_count = 50;
    let events_notify = sink.wait_for_events_count(rows_count).await;

    pipeline.start().await.unwrap();

    handle.push(rotation("bin.000001", 4), None);
    for order_id in 0..rows_count as i64 {
        let position = 200 + order_id as u64 * 100;
        handle.push_at(
            insert(
                "orders",
                vec![row(&[
                    ("order_id", Cell::I64(order_id)),
                    ("status", Cell::from("new")),
                ])],
            ),
            "bin.000001",
            position,
        );
        handle.push_at(commit(order_id as u64), "bin.000001", position + 31);
    }

    events_notify.notified().await;

    pipeline.shutdown_and_wait().await.unwrap();

    let events = sink.get_events().await;
    assert_eq!(events.len(), rows_count);
    assert_eq!(count_actions(&events, ChangeAction::Create), rows_count);
    for (expected_id, event) in events.iter().enumerate() {
        assert_eq!(
            event.doc.get("order_id"),
            Some(&Cell::I64(expected_id as i64))
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rotation_saves_checkpoint() {
    init_test_tracing();

    let store = NotifyingCheckpointStore::wrap(MemoryCheckpointStore::new());
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let expected = Checkpoint::new("bin.000005", 1024);
    let save_notify = store.notify_on_save(expected.clone()).await;

    pipeline.start().await.unwrap();

    handle.push(rotation("bin.000005", 1024), None);

    save_notify.notified().await;

    assert_eq!(store.load().await.unwrap(), Some(expected.clone()));
    assert_eq!(store.saves().await, vec![expected]);

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_resumes_from_saved_checkpoint() {
    init_test_tracing();

    let checkpoint = Checkpoint::new("bin.000042", 7_777);
    let store = MemoryCheckpointStore::with_checkpoint(checkpoint.clone());
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "bin.000042",
        7_900,
    );

    events_notify.notified().await;

    let requests = handle.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].resume);
    assert_eq!(requests[0].position, Some(checkpoint));
    assert_eq!(requests[0].server_id, 1001);
    assert!(requests[0].tables.contains("orders"));
    assert!(requests[0].tables.contains("shipments"));

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_without_checkpoint_streams_from_oldest_binlog() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "bin.000001",
        310,
    );

    events_notify.notified().await;

    let requests = handle.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].resume);
    assert_eq!(requests[0].position, None);

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_flushes_current_position_and_shuts_sink_down() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let events_notify = sink.wait_for_events_count(2).await;

    pipeline.start().await.unwrap();

    handle.push(rotation("bin.000002", 4), None);
    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "bin.000002",
        512,
    );
    handle.push_at(
        update(
            "orders",
            vec![(
                row(&[("order_id", Cell::I64(1)), ("status", Cell::from("new"))]),
                row(&[("order_id", Cell::I64(1)), ("status", Cell::from("paid"))]),
            )],
        ),
        "bin.000002",
        900,
    );

    events_notify.notified().await;

    // Shutdown should not have been called yet.
    assert!(!sink.shutdown_called().await);

    let result = pipeline.shutdown_and_wait().await.unwrap();

    let expected = Checkpoint::new("bin.000002", 900);
    assert_eq!(
        result,
        Some(ApplyLoopResult::Shutdown {
            checkpoint: Some(expected.clone())
        })
    );
    assert_eq!(
        store.saves().await,
        vec![Checkpoint::new("bin.000002", 4), expected]
    );
    assert!(sink.shutdown_called().await);

    let events = sink.get_events().await;
    assert_eq!(events[1].action, ChangeAction::Update);
    assert_eq!(events[1].doc.get("status"), Some(&Cell::from("paid")));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_end_fails_pipeline() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, mut handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    pipeline.start().await.unwrap();
    let phase_rx = pipeline.phase_rx().unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "bin.000003",
        400,
    );
    handle.close();

    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);
    assert_eq!(*phase_rx.borrow(), LoopPhase::Failed);
    // Positions seen after the last rotation are not saved on failure.
    assert!(store.saves().await.is_empty());
    assert!(!sink.shutdown_called().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_error_fails_pipeline() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    pipeline.start().await.unwrap();

    handle.push_error(etl::etl_error!(
        ErrorKind::SourceConnectionFailed,
        "Binlog stream failed",
        "connection reset by peer"
    ));

    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_of_untracked_table_fail_pipeline() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    pipeline.start().await.unwrap();
    let phase_rx = pipeline.phase_rx().unwrap();

    handle.push_at(
        insert("customers", vec![row(&[("id", Cell::I64(1))])]),
        "bin.000001",
        310,
    );

    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert_eq!(*phase_rx.borrow(), LoopPhase::Failed);
    assert!(sink.get_events().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn commits_reach_sink_only_after_change_events() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let events_notify = sink.wait_for_events_count(2).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(1))])]),
        "bin.000001",
        310,
    );
    handle.push_at(commit(1), "bin.000001", 341);
    // A transaction on untracked tables only yields its commit.
    handle.push_at(commit(2), "bin.000001", 600);
    handle.push_at(
        insert("orders", vec![row(&[("order_id", Cell::I64(2))])]),
        "bin.000001",
        900,
    );

    events_notify.notified().await;

    assert_eq!(sink.commits().await, 1);

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn satellite_changes_become_master_updates() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store.clone(), source, sink.clone());

    let events_notify = sink.wait_for_events_count(4).await;

    pipeline.start().await.unwrap();

    let item = row(&[
        ("order_id", Cell::I64(7)),
        ("sku", Cell::from("A-1")),
        ("quantity", Cell::I64(3)),
    ]);
    handle.push_at(insert("order_items", vec![item.clone()]), "bin.000001", 310);
    handle.push_at(delete("order_items", vec![item]), "bin.000001", 620);
    handle.push_at(
        delete(
            "shipments",
            vec![row(&[
                ("order_id", Cell::I64(7)),
                ("carrier", Cell::Null),
            ])],
        ),
        "bin.000001",
        930,
    );
    handle.push_at(
        delete("orders", vec![row(&[("order_id", Cell::I64(7))])]),
        "bin.000001",
        1_240,
    );

    events_notify.notified().await;

    pipeline.shutdown_and_wait().await.unwrap();

    let events = sink.get_events().await;
    assert_eq!(count_actions(&events, ChangeAction::Update), 3);
    assert_eq!(count_actions(&events, ChangeAction::Delete), 1);

    // Satellite inserts carry the inserted row.
    assert_eq!(events[0].doc.get("sku"), Some(&Cell::from("A-1")));

    // Satellite deletes keep the identifier and null everything else.
    let nulled = &events[1].doc;
    assert_eq!(nulled.get("order_id"), Some(&Cell::I64(7)));
    assert_eq!(nulled.get("sku"), Some(&Cell::Null));
    assert_eq!(nulled.get("quantity"), Some(&Cell::Null));

    assert_eq!(events[3].action, ChangeAction::Delete);
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_identifier_column_is_preserved_on_satellite_delete() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let (source, handle) = create_scripted_source();

    let mut pipeline = PipelineBuilder::new(store.clone(), source, sink.clone())
        .with_tables(&["users", "addresses"])
        .with_identifier_column("user_id")
        .build();

    let events_notify = sink.wait_for_events_count(1).await;

    pipeline.start().await.unwrap();

    handle.push_at(
        delete(
            "addresses",
            vec![row(&[
                ("user_id", Cell::I64(3)),
                ("city", Cell::from("Lisbon")),
            ])],
        ),
        "bin.000001",
        310,
    );

    events_notify.notified().await;

    pipeline.shutdown_and_wait().await.unwrap();

    let events = sink.get_events().await;
    assert_eq!(events[0].action, ChangeAction::Update);
    assert_eq!(events[0].doc.get("user_id"), Some(&Cell::I64(3)));
    assert_eq!(events[0].doc.get("city"), Some(&Cell::Null));
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_cannot_be_started_twice() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = MemorySink::new();
    let (source, _handle) = create_scripted_source();

    let mut pipeline = create_pipeline(store, source, sink);

    pipeline.start().await.unwrap();
    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    pipeline.shutdown_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_with_invalid_config_does_not_start() {
    init_test_tracing();

    let store = MemoryCheckpointStore::new();
    let sink = MemorySink::new();
    let (source, handle) = create_scripted_source();

    let mut pipeline = PipelineBuilder::new(store, source, sink)
        .with_tables(&[])
        .build();

    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(pipeline.phase().is_none());
    assert!(handle.requests().await.is_empty());
}
