//! Worker-pool completeness, backpressure and drain properties.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use synckit_pool::{
    OverflowPolicy, PoolActivity, QueueCapacity, ShutdownOutcome, SubmitError, TaskError,
    WorkerPool,
};

const WORKERS: usize = 4;
const TASKS: usize = 200;

#[test]
#[ntest::timeout(60000)]
fn every_task_runs_exactly_once() {
    let pool = WorkerPool::new(WORKERS);
    let executions = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..TASKS)
        .map(|index| {
            let executions = Arc::clone(&executions);
            pool.submit(move || {
                executions.fetch_add(1, Ordering::SeqCst);
                index
            })
            .unwrap()
        })
        .collect();

    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
    assert_eq!(executions.load(Ordering::SeqCst), TASKS);

    // each handle carries its own task's value: nothing lost, nothing
    // duplicated, results routed to the right promise
    for (index, handle) in handles.into_iter().enumerate() {
        assert!(handle.is_finished());
        assert_eq!(handle.join().unwrap(), index);
    }
}

#[test]
fn submissions_after_drain_are_rejected() {
    let pool = WorkerPool::new(2);
    pool.shutdown(None);
    assert_eq!(
        pool.submit(|| ()).map(|handle| handle.id()),
        Err(SubmitError::ShuttingDown)
    );
}

#[test]
fn blocking_overflow_policy_parks_the_submitter() {
    let pool = Arc::new(
        WorkerPool::builder(1)
            .queue(QueueCapacity::Bounded(1))
            .overflow_policy(OverflowPolicy::Block)
            .build(),
    );

    let release = Arc::new(AtomicBool::new(false));
    let worker_release = Arc::clone(&release);
    pool.submit(move || {
        while !worker_release.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    })
    .unwrap();
    thread::sleep(Duration::from_millis(20));
    pool.submit(|| ()).unwrap(); // fills the single queue slot

    let blocked_since = Instant::now();
    let remote = Arc::clone(&pool);
    let submitter = thread::spawn(move || {
        remote.submit(|| ()).unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    assert!(!submitter.is_finished(), "submitter should be parked");

    release.store(true, Ordering::SeqCst);
    submitter.join().unwrap();
    assert!(blocked_since.elapsed() >= Duration::from_millis(50));

    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
}

#[test]
fn growing_overflow_policy_ignores_the_bound() {
    let pool = WorkerPool::builder(1)
        .queue(QueueCapacity::Bounded(1))
        .overflow_policy(OverflowPolicy::Grow)
        .build();

    let release = Arc::new(AtomicBool::new(false));
    let worker_release = Arc::clone(&release);
    pool.submit(move || {
        while !worker_release.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    })
    .unwrap();
    thread::sleep(Duration::from_millis(20));

    for _ in 0..5 {
        pool.submit(|| ()).unwrap();
    }
    assert!(pool.queued_tasks() > 1);

    release.store(true, Ordering::SeqCst);
    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
}

#[test]
fn task_panic_is_isolated_to_its_handle() {
    let sink_hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&sink_hits);
    let pool = WorkerPool::builder(2)
        .on_task_panic(move |_task, detail| {
            assert!(detail.contains("deliberate"));
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let failing = pool
        .submit(|| -> usize { panic!("deliberate failure") })
        .unwrap();
    let surviving: Vec<_> = (0..10).map(|n| pool.submit(move || n).unwrap()).collect();

    assert!(matches!(failing.join(), Err(TaskError::Panicked { .. })));
    for (n, handle) in surviving.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), n);
    }
    assert_eq!(sink_hits.load(Ordering::SeqCst), 1);
    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
}

#[test]
fn shutdown_does_not_wait_for_background_tasks() {
    let pool = WorkerPool::new(2);
    let background_running = Arc::new(AtomicBool::new(false));
    let background_done = Arc::new(AtomicBool::new(false));

    let running = Arc::clone(&background_running);
    let finished = Arc::clone(&background_done);
    pool.submit_background(move || {
        running.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(400));
        finished.store(true, Ordering::SeqCst);
    })
    .unwrap();
    let ordinary = pool.submit(|| 5).unwrap();

    // wait for the background task to be picked up
    while !background_running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    let started = Instant::now();
    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
    assert!(
        started.elapsed() < Duration::from_millis(300),
        "shutdown waited for a background task"
    );
    assert!(!background_done.load(Ordering::SeqCst));
    assert_eq!(ordinary.join().unwrap(), 5);
}

#[test]
fn timed_shutdown_reports_partial_completion() {
    let pool = WorkerPool::new(1);
    pool.submit(|| thread::sleep(Duration::from_millis(250))).unwrap();
    pool.submit(|| ()).unwrap();

    match pool.shutdown(Some(Duration::from_millis(30))) {
        ShutdownOutcome::TimedOut { unfinished } => assert!(unfinished >= 1),
        ShutdownOutcome::Completed => panic!("shutdown should have timed out"),
    }
    assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
}

#[test]
#[tracing_test::traced_test]
fn activity_channel_reports_the_lifecycle() {
    let pool = WorkerPool::builder(1).with_activity_channel().build();
    let events = pool.activity_events().unwrap();

    let handle = pool.submit(|| ()).unwrap();
    let id = handle.id();
    handle.join().unwrap();
    pool.shutdown(None);

    let seen: Vec<PoolActivity> = events.try_iter().collect();
    assert!(seen.contains(&PoolActivity::TaskQueued { task: id }));
    assert!(seen
        .iter()
        .any(|event| matches!(event, PoolActivity::TaskCompleted { task, .. } if *task == id)));
    assert!(seen.contains(&PoolActivity::DrainRequested));
    assert!(seen.contains(&PoolActivity::Terminated));
}
