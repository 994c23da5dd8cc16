//! End-to-end tracker tests against a mock HTTP backend.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use scribe_client::{
    AudioFile, PollConfig, ScribeApi, SubmitError, TaskOutcome, Tracker, TrackerEvent,
};
use scribe_core::lifecycle::LifecycleState;
use scribe_core::results::{OutputKind, PLACEHOLDER_NAME};
use scribe_core::submission::SubmitOptions;
use scribe_core::types::TaskId;

const FAST_POLL: PollConfig = PollConfig {
    interval: Duration::from_millis(20),
};

fn tracker_for(url: String) -> Tracker {
    Tracker::new(Arc::new(ScribeApi::new(url)), FAST_POLL)
}

fn audio(name: &str) -> AudioFile {
    AudioFile::new(name, b"fake audio".to_vec())
}

async fn wait_idle(tracker: &Tracker) {
    tokio::time::timeout(Duration::from_secs(5), tracker.wait_idle())
        .await
        .expect("tasks should settle");
}

#[tokio::test]
async fn batch_is_tracked_to_completion() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"task_ids":["t1","t2","t3"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t1")
        .with_body(
            r#"{"status":"completed","progress":100,"original_file":"a.mp3",
                "num_segments":2,
                "output_files":["a_parte1.txt","a_parte2.txt","a_completo.txt"]}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/status/t2")
        .with_body(r#"{"status":"error","error":"Formato no soportado"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t3")
        .with_body(r#"{"status":"completed","output_files":["c.txt"]}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    let mut events = tracker.subscribe();

    let ids = tracker
        .submit(
            vec![audio("a.mp3"), audio("b.wav"), audio("c.flac")],
            &SubmitOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
    wait_idle(&tracker).await;

    let registry = tracker.registry();
    assert_eq!(registry.active_count().await, 0);

    let a = registry.snapshot(&TaskId::from("t1")).await.unwrap();
    assert_eq!(a.display_name, "a.mp3");
    assert_eq!(a.state, LifecycleState::Completed);
    let Some(TaskOutcome::Completed(result)) = a.outcome else {
        panic!("t1 should be completed");
    };
    assert_eq!(result.num_segments, 2);
    assert_eq!(result.files[0].filename, "a_completo.txt");
    assert_eq!(result.files[0].kind, OutputKind::Consolidated);
    let labels: Vec<_> = result.parts().map(|f| f.label()).collect();
    assert_eq!(labels, vec!["Parte 1", "Parte 2"]);

    let b = registry.snapshot(&TaskId::from("t2")).await.unwrap();
    assert_eq!(b.display_name, "b.wav");
    assert_eq!(b.state, LifecycleState::Errored);
    assert_matches!(b.outcome, Some(TaskOutcome::Failed(ref m)) if m == "Formato no soportado");

    let c = registry.snapshot(&TaskId::from("t3")).await.unwrap();
    assert_eq!(c.display_name, "c.flac");
    let Some(TaskOutcome::Completed(result)) = c.outcome else {
        panic!("t3 should be completed");
    };
    assert_eq!(result.original_file, PLACEHOLDER_NAME);
    assert_eq!(result.num_segments, 1);
    assert_eq!(result.split_message(), None);

    let mut finals = 0;
    while let Ok(event) = events.try_recv() {
        if event.is_final() {
            finals += 1;
        }
    }
    assert_eq!(finals, 3);
}

#[tokio::test]
async fn mistyped_terminal_payloads_still_settle() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_body(r#"{"task_ids":["t1","t2","t3"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t1")
        .with_body(r#"{"status":"error","error":{"detail":"CUDA OOM"}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t2")
        .with_body(r#"{"status":"completed","output_files":["b_completo.txt"],"original_file":42}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t3")
        .with_body(r#"{"status":"completed","output_files":["c_completo.txt",null]}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    tracker
        .submit(
            vec![audio("a.mp3"), audio("b.mp3"), audio("c.mp3")],
            &SubmitOptions::default(),
        )
        .await
        .unwrap();
    wait_idle(&tracker).await;

    let registry = tracker.registry();
    assert_eq!(registry.active_count().await, 0);

    let a = registry.snapshot(&TaskId::from("t1")).await.unwrap();
    assert_eq!(a.state, LifecycleState::Errored);
    assert_matches!(a.outcome, Some(TaskOutcome::Failed(ref m)) if m.contains("CUDA OOM"));

    let b = registry.snapshot(&TaskId::from("t2")).await.unwrap();
    let Some(TaskOutcome::Completed(result)) = b.outcome else {
        panic!("t2 should be completed");
    };
    assert_eq!(result.original_file, PLACEHOLDER_NAME);
    assert_eq!(result.files[0].filename, "b_completo.txt");

    let c = registry.snapshot(&TaskId::from("t3")).await.unwrap();
    let Some(TaskOutcome::Completed(result)) = c.outcome else {
        panic!("t3 should be completed");
    };
    assert_eq!(result.files.len(), 1);
}

#[tokio::test]
async fn failed_task_does_not_affect_siblings() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_body(r#"{"task_ids":["bad","good"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/bad")
        .with_body(r#"{"status":"error"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/good")
        .with_body(r#"{"status":"processing","progress":"55"}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    tracker
        .submit(vec![audio("x.mp3"), audio("y.mp3")], &SubmitOptions::default())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let registry = tracker.registry();
    let bad = registry.snapshot(&TaskId::from("bad")).await.unwrap();
    assert_matches!(bad.outcome, Some(TaskOutcome::Failed(ref m)) if m == "Error desconocido");

    let good = registry.snapshot(&TaskId::from("good")).await.unwrap();
    assert_eq!(good.state, LifecycleState::Processing);
    assert_eq!(good.progress, 55);
    assert!(!good.is_settled());

    tracker.shutdown().await;
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn retired_task_emits_no_completion() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_body(r#"{"task_ids":["t1"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status/t1")
        .with_body(r#"{"status":"queued"}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    let mut events = tracker.subscribe();
    tracker
        .submit(vec![audio("a.mp3")], &SubmitOptions::default())
        .await
        .unwrap();

    let id = TaskId::from("t1");
    assert!(tracker.retire(&id).await);
    assert!(!tracker.retire(&id).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_matches!(seen.first(), Some(TrackerEvent::TaskRegistered { .. }));
    assert_matches!(seen.last(), Some(TrackerEvent::TaskRetired { .. }));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, TrackerEvent::TaskCompleted { .. })));
}

#[tokio::test]
async fn surplus_and_blank_ids_are_not_registered() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_body(r#"{"task_ids":["t1", 7, "t3", "t4"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/status/".into()))
        .with_body(r#"{"status":"queued"}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    let ids = tracker
        .submit(
            vec![audio("a.mp3"), audio("b.mp3"), audio("c.mp3")],
            &SubmitOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(ids, vec![TaskId::from("t1"), TaskId::from("t3")]);
    let active = tracker.registry().active_tasks().await;
    let names: Vec<_> = active.iter().map(|t| t.display_name.as_str()).collect();
    assert!(names.contains(&"a.mp3"));
    assert!(names.contains(&"c.mp3"));
    assert_eq!(active.len(), 2);

    tracker.shutdown().await;
}

#[tokio::test]
async fn rejected_upload_registers_nothing() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/upload")
        .with_status(500)
        .with_body(r#"{"error":"Disco lleno"}"#)
        .create_async()
        .await;

    let tracker = tracker_for(server.url());
    let err = tracker
        .submit(vec![audio("a.mp3")], &SubmitOptions::default())
        .await
        .unwrap_err();

    assert_matches!(err, SubmitError::Rejected { status: 500, ref message } if message == "Disco lleno");
    assert_eq!(tracker.registry().active_count().await, 0);
}

#[tokio::test]
async fn unreachable_backend_is_reported() {
    let tracker = tracker_for("http://127.0.0.1:9".into());
    let err = tracker
        .submit(vec![audio("a.mp3")], &SubmitOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_unreachable());
    assert_eq!(tracker.registry().active_count().await, 0);
}
