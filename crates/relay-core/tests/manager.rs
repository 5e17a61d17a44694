mod common;

use std::{
    io::Write,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use relay_core::backend::memory::{HeartbeatEvent, MemoryHeartbeater, MemoryQueue};
use relay_core::prelude::*;
use relay_model::{DurationSetting, JobId, WorkerId};
use serde_json::json;
use tokio::task::JoinHandle;

use common::*;

fn spawn(mut manager: Manager) -> (ControlHandle, JoinHandle<(Manager, Result<(), CoreError>)>) {
    let control = manager.control();
    let handle = tokio::spawn(async move {
        let res = manager.run().await;
        (manager, res)
    });
    (control, handle)
}

async fn finish(
    handle: JoinHandle<(Manager, Result<(), CoreError>)>,
) -> (Manager, Result<(), CoreError>) {
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("manager did not stop")
        .unwrap()
}

fn completions(events: &[HeartbeatEvent]) -> Vec<(JobId, relay_model::CompletionReport)> {
    events
        .iter()
        .filter_map(|e| match e {
            HeartbeatEvent::Completion(id, report) => Some((id.clone(), report.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn end_to_end_build_job() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(MemoryHeartbeater::default());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());

    let mut settings = fast_settings(tmp.path());
    preload(&mut settings, json!([{"job_type": "build", "commit": "abc123"}]));
    let config = store_with(settings, backends);

    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "build", Arc::new(BuildJob));

    let (control, handle) = spawn(Manager::new(config.clone(), Arc::new(jobs)));
    wait_until("completion signal", || !completions(&hb.events()).is_empty()).await;

    control.request_termination();
    let (manager, res) = finish(handle).await;
    res.unwrap();
    assert_eq!(manager.state(), ManagerState::Terminated);

    let events = hb.events();
    assert_eq!(events.first(), Some(&HeartbeatEvent::Register(WorkerId::new(1234))));
    assert_eq!(events.last(), Some(&HeartbeatEvent::Unregister(WorkerId::new(1234))));
    assert!(events.contains(&HeartbeatEvent::Start(JobId::new("memory-1"))));

    let done = completions(&events);
    assert_eq!(done.len(), 1);
    let (job_id, report) = &done[0];
    assert_eq!(job_id.as_str(), "memory-1");
    assert_eq!(report.return_code(), Some(0));
    assert_eq!(report.secret_key(), Some("memory-1"));
    assert_eq!(report.get("result_key"), Some(&json!("builds/abc123.jar")));
    assert!(report.get("started_at").and_then(|v| v.as_str()).is_some());
    assert!(report.get("runtime_seconds").and_then(|v| v.as_f64()).is_some());

    assert!(config.queue().poll(Duration::ZERO).await.unwrap().is_none());
    assert!(config.queue().poll(Duration::from_millis(20)).await.unwrap().is_none());
}

#[tokio::test]
async fn timeout_terminates_the_job_exactly_once() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(MemoryHeartbeater::default());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());

    let mut settings = fast_settings(tmp.path());
    settings.worker_timeout = DurationSetting::from_millis(50);
    preload(&mut settings, json!([{"job_type": "slow"}]));
    let config = store_with(settings, backends);

    // Keeps running for many ticks after the timeout fired.
    let slow = Arc::new(SlowToStopJob::new(Duration::from_millis(200)));
    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "slow", slow.clone());

    let (control, handle) = spawn(Manager::new(config, Arc::new(jobs)));
    wait_until("completion signal", || !completions(&hb.events()).is_empty()).await;
    control.request_termination();
    finish(handle).await.1.unwrap();

    assert_eq!(slow.terminations(), 1);
    let (_, report) = &completions(&hb.events())[0];
    assert_eq!(report.return_code(), Some(130));
}

#[tokio::test]
async fn registration_failure_skips_unregister() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(FlakyHeartbeater::new(true, false));
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());
    let config = store_with(fast_settings(tmp.path()), backends);

    let mut manager = Manager::new(config, Arc::new(JobRegistry::new()));
    let err = manager.run().await.unwrap_err();

    assert!(matches!(err, CoreError::Registration(_)));
    assert_eq!(manager.state(), ManagerState::Terminated);
    assert_eq!(hb.unregister_calls.load(Ordering::SeqCst), 0);
    assert_eq!(hb.heartbeat_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn heartbeat_failures_do_not_stop_the_manager() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(FlakyHeartbeater::new(false, true));
    let queue = Arc::new(MemoryQueue::new());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());
    share_queue(&mut backends, queue.clone());

    let mut settings = fast_settings(tmp.path());
    settings.heartbeat_period = DurationSetting::from_millis(1);
    let config = store_with(settings, backends);

    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "build", Arc::new(BuildJob));

    let (control, handle) = spawn(Manager::new(config, Arc::new(jobs)));
    wait_until("a few failed heartbeats", || {
        hb.heartbeat_attempts.load(Ordering::SeqCst) >= 3
    })
    .await;

    queue.enqueue(relay_model::JobDescription::new("build").with_field("commit", "def456"));
    wait_until("completion after failed heartbeats", || {
        !completions(&hb.inner.events()).is_empty()
    })
    .await;

    control.request_termination();
    finish(handle).await.1.unwrap();
    assert_eq!(hb.unregister_calls.load(Ordering::SeqCst), 1);
    let (_, report) = &completions(&hb.inner.events())[0];
    assert_eq!(report.get("result_key"), Some(&json!("builds/def456.jar")));
}

#[tokio::test]
async fn second_request_terminates_the_running_job() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(MemoryHeartbeater::default());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());

    let mut settings = fast_settings(tmp.path());
    preload(&mut settings, json!([{"job_type": "stuck"}, {"job_type": "stuck"}]));
    let config = store_with(settings, backends);

    let stuck = Arc::new(StuckJob::default());
    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "stuck", stuck.clone());

    let manager = Manager::new(config.clone(), Arc::new(jobs)).with_grace(Duration::from_millis(50));
    let (control, handle) = spawn(manager);
    wait_until("job start", || {
        hb.events().contains(&HeartbeatEvent::Start(JobId::new("memory-1")))
    })
    .await;

    assert_eq!(control.request_termination(), ShutdownLevel::Draining);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(completions(&hb.events()).is_empty(), "draining lets the job run");
    assert_eq!(stuck.terminations(), 0);

    assert_eq!(control.request_termination(), ShutdownLevel::ForceTerminate);
    let (manager, res) = finish(handle).await;
    res.unwrap();
    assert_eq!(manager.state(), ManagerState::Terminated);

    assert_eq!(stuck.terminations(), 1);
    let done = completions(&hb.events());
    assert_eq!(done.len(), 1, "no new job is taken while draining");
    assert_eq!(done[0].1.return_code(), Some(143));

    // The second description is still queued.
    assert!(config.queue().poll(Duration::ZERO).await.unwrap().is_some());
}

#[tokio::test]
async fn drain_wakes_a_blocked_poll() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = fast_settings(tmp.path());
    settings.idle_timeout = DurationSetting::from_secs(3600);
    let config = store_with(settings, memory_backends());

    let (control, handle) = spawn(Manager::new(config, Arc::new(JobRegistry::new())));
    tokio::time::sleep(Duration::from_millis(50)).await;

    control.request_termination();
    let started = std::time::Instant::now();
    finish(handle).await.1.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn reload_request_is_applied_and_bad_reload_is_survived() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    let doc = |period: &str, extra: &str| {
        format!(
            "queue_type: memory\nuploader_type: memory\ndownloader_type: memory\n\
             heartbeater_type: memory\nheartbeat_period: {period}\n\
             sleep_interval: {{milliseconds: 10}}\nidle_timeout: {{milliseconds: 20}}\n\
             tmp_dir: {}\n{extra}",
            tmp.path().display()
        )
    };
    let write = |text: String| {
        let mut f = std::fs::File::create(file.path()).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    };
    write(doc("300", ""));

    let config = Arc::new(
        ConfigStore::load(file.path(), Arc::new(memory_backends())).unwrap(),
    );
    let (control, handle) = spawn(Manager::new(config.clone(), Arc::new(JobRegistry::new())));

    write(doc("60", ""));
    control.request_reload();
    wait_until("reload", || config.version() == 2).await;
    assert_eq!(
        config.get(|c| c.settings().heartbeat_period()),
        Duration::from_secs(60)
    );
    assert_eq!(config.heartbeater().worker_id(), Some(WorkerId::new(1234)));

    write(doc("60", "surprise: true\n"));
    control.request_reload();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(config.version(), 2);

    control.request_termination();
    finish(handle).await.1.unwrap();
}

#[tokio::test]
async fn job_termination_applies_only_to_the_job_in_flight() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(MemoryHeartbeater::default());
    let queue = Arc::new(MemoryQueue::new());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());
    share_queue(&mut backends, queue.clone());
    let config = store_with(fast_settings(tmp.path()), backends);

    let slow = Arc::new(SlowToStopJob::new(Duration::from_millis(10)));
    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "slow", slow.clone());

    let (control, handle) = spawn(Manager::new(config, Arc::new(jobs)));

    // Nothing is running yet; this request has no job to act on.
    control.terminate_job();
    tokio::time::sleep(Duration::from_millis(100)).await;

    queue.enqueue(relay_model::JobDescription::new("slow"));
    wait_until("job start", || {
        hb.events().contains(&HeartbeatEvent::Start(JobId::new("memory-1")))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(completions(&hb.events()).is_empty(), "idle request must not stop a later job");
    assert_eq!(slow.terminations(), 0);

    control.terminate_job();
    wait_until("completion of the stopped job", || {
        !completions(&hb.events()).is_empty()
    })
    .await;
    assert_eq!(slow.terminations(), 1);
    let (_, report) = &completions(&hb.events())[0];
    assert_eq!(report.return_code(), Some(130));
    assert_eq!(report.get("stopped"), Some(&json!(true)));

    control.request_termination();
    finish(handle).await.1.unwrap();
}

#[tokio::test]
async fn queue_fault_still_unregisters() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(FlakyHeartbeater::new(false, false));
    let queue = Arc::new(BrokenQueue::default());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());
    break_queue(&mut backends, queue.clone());
    let config = store_with(fast_settings(tmp.path()), backends);

    let mut manager = Manager::new(config, Arc::new(JobRegistry::new()));
    let err = tokio::time::timeout(Duration::from_secs(10), manager.run())
        .await
        .expect("manager did not stop")
        .unwrap_err();

    assert!(matches!(err, CoreError::Queue(BackendError::Transport(_))), "{err}");
    assert_eq!(manager.state(), ManagerState::Terminated);
    assert_eq!(queue.polls.load(Ordering::SeqCst), 1);
    assert_eq!(hb.unregister_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hb.inner.worker_id(), None);
}

#[tokio::test]
async fn start_signal_fault_still_unregisters() {
    let tmp = tempfile::tempdir().unwrap();
    let hb = Arc::new(FlakyHeartbeater::failing_start());
    let mut backends = memory_backends();
    share_heartbeater(&mut backends, hb.clone());

    let mut settings = fast_settings(tmp.path());
    preload(&mut settings, json!([{"job_type": "build", "commit": "abc123"}]));
    let config = store_with(settings, backends);

    let mut jobs = JobRegistry::new();
    register_job(&mut jobs, "build", Arc::new(BuildJob));

    let mut manager = Manager::new(config, Arc::new(jobs));
    let err = tokio::time::timeout(Duration::from_secs(10), manager.run())
        .await
        .expect("manager did not stop")
        .unwrap_err();

    match &err {
        CoreError::Signal { phase, job_id, .. } => {
            assert_eq!(*phase, "start");
            assert_eq!(job_id, "memory-1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.state(), ManagerState::Terminated);
    assert_eq!(hb.unregister_calls.load(Ordering::SeqCst), 1);
    assert!(completions(&hb.inner.events()).is_empty());
}

#[tokio::test]
async fn slow_reload_does_not_block_the_runtime() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        format!(
            "queue_type: memory\nuploader_type: memory\ndownloader_type: memory\n\
             heartbeater_type: memory\nheartbeat_period: 300\n\
             sleep_interval: {{milliseconds: 10}}\nidle_timeout: {{milliseconds: 20}}\n\
             tmp_dir: {}\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let built = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut backends = memory_backends();
    backends.queues_mut().unregister("memory");
    let counter = built.clone();
    backends
        .queues_mut()
        .register_fn("memory", move |_opts, _prev| {
            if counter.fetch_add(1, Ordering::SeqCst) >= 1 {
                std::thread::sleep(Duration::from_millis(500));
            }
            let q: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
            Ok(q)
        })
        .unwrap();

    let config = Arc::new(ConfigStore::load(file.path(), Arc::new(backends)).unwrap());
    let (control, handle) = spawn(Manager::new(config.clone(), Arc::new(JobRegistry::new())));

    control.request_reload();
    wait_until("reload to reach the queue factory", || {
        built.load(Ordering::SeqCst) == 2
    })
    .await;
    assert_eq!(config.version(), 1, "the test task runs while the reload is still building");

    let ticked = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(
        ticked.elapsed() < Duration::from_millis(300),
        "runtime stalled for {:?}",
        ticked.elapsed()
    );

    wait_until("reload", || config.version() == 2).await;
    control.request_termination();
    finish(handle).await.1.unwrap();
}
