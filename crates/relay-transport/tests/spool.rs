use std::{path::Path, sync::Arc, time::Duration};

use relay_core::prelude::*;
use relay_model::{BackendOptions, DeliveryToken};
use relay_transport::register_transport_backends;

fn spool(dir: &Path) -> Arc<dyn Queue> {
    let mut reg = BackendRegistry::new();
    register_transport_backends(&mut reg).unwrap();
    let opts = BackendOptions::new()
        .with("directory", dir.display().to_string())
        .with("scan_interval_ms", 10);
    reg.queues().create("spool", &opts, None).unwrap()
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

fn left(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn messages_are_taken_oldest_first_and_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let q = spool(tmp.path());

    write(tmp.path(), "zz-first.yaml", "version: 2\njob_type: build\ncommit: one\n");
    tokio::time::sleep(Duration::from_millis(50)).await;
    write(tmp.path(), "aa-second.json", r#"{"version": 2, "job_type": "build", "commit": "two"}"#);

    let first = q.poll(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(first.field("commit").and_then(|v| v.as_str()), Some("one"));
    assert_eq!(first.secret_key, Some(DeliveryToken::new("zz-first")));
    assert_eq!(left(tmp.path()), ["aa-second.json"]);

    let second = q.poll(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(second.field("commit").and_then(|v| v.as_str()), Some("two"));
    assert_eq!(second.effective_job_id().unwrap().as_str(), "aa-second");

    assert!(q.poll(Duration::ZERO).await.unwrap().is_none());
    assert!(left(tmp.path()).is_empty());
}

#[tokio::test]
async fn unsupported_messages_are_discarded_and_others_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let q = spool(tmp.path());

    write(tmp.path(), "old.yaml", "version: 1\njob_type: build\n");
    write(tmp.path(), "broken.json", "{not json");
    write(tmp.path(), "notes.txt", "version: 2\njob_type: build\n");
    write(tmp.path(), ".staging.yaml", "version: 2\njob_type: build\n");

    assert!(q.poll(Duration::from_millis(30)).await.unwrap().is_none());
    assert_eq!(left(tmp.path()), [".staging.yaml", "notes.txt"]);
}

#[tokio::test]
async fn poll_waits_for_a_message_to_arrive() {
    let tmp = tempfile::tempdir().unwrap();
    let q = spool(tmp.path());

    let dir = tmp.path().to_path_buf();
    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        write(&dir, ".job-7.yaml", "version: 2\njob_type: build\n");
        std::fs::rename(dir.join(".job-7.yaml"), dir.join("job-7.yaml")).unwrap();
    });

    let started = std::time::Instant::now();
    let got = q.poll(Duration::from_secs(10)).await.unwrap().unwrap();
    assert_eq!(got.secret_key, Some(DeliveryToken::new("job-7")));
    assert!(started.elapsed() < Duration::from_secs(5));
    producer.await.unwrap();
}

#[tokio::test]
async fn empty_poll_returns_after_idle_timeout() {
    let tmp = tempfile::tempdir().unwrap();
    let q = spool(tmp.path());

    let started = std::time::Instant::now();
    assert!(q.poll(Duration::from_millis(80)).await.unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[test]
fn factory_creates_the_directory_and_requires_it() {
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("spool/incoming");
    spool(&nested);
    assert!(nested.is_dir());

    let mut reg = BackendRegistry::new();
    register_transport_backends(&mut reg).unwrap();
    assert!(matches!(
        reg.queues().create("spool", &BackendOptions::new(), None),
        Err(BackendError::Options(_))
    ));
}

#[tokio::test]
async fn interrupted_polls_never_lose_a_message() {
    let tmp = tempfile::tempdir().unwrap();
    let q = spool(tmp.path());
    const TOTAL: usize = 30;
    for i in 0..TOTAL {
        write(tmp.path(), &format!("job-{i:02}.yaml"), "version: 2\njob_type: build\n");
    }

    let mut delivered = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(20);
    let mut attempt = 0u64;
    while delivered.len() < TOTAL {
        assert!(std::time::Instant::now() < deadline, "delivered only {delivered:?}");
        attempt += 1;
        let budget = Duration::from_micros(25 * (attempt % 40));
        if let Ok(polled) = tokio::time::timeout(budget, q.poll(Duration::ZERO)).await {
            if let Some(description) = polled.unwrap() {
                delivered.push(description.secret_key.unwrap().as_str().to_string());
            }
        }
        // Every file that is gone from the directory has been handed out.
        assert_eq!(delivered.len() + left(tmp.path()).len(), TOTAL);
    }

    delivered.sort();
    delivered.dedup();
    assert_eq!(delivered.len(), TOTAL);
}
