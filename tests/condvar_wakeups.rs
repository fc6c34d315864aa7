//! Condition-variable wakeup discipline.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use synckit_primitives::{ConditionVariable, ExclusiveLock};

struct Fixture {
    lock: Arc<ExclusiveLock>,
    condvar: ConditionVariable,
    ready: AtomicBool,
    proceeded: AtomicUsize,
}

impl Fixture {
    fn new() -> Arc<Self> {
        let lock = Arc::new(ExclusiveLock::new());
        let condvar = ConditionVariable::for_lock(&lock);
        Arc::new(Self {
            lock,
            condvar,
            ready: AtomicBool::new(false),
            proceeded: AtomicUsize::new(0),
        })
    }

    /// Parks until `ready`, re-checking the predicate on every wakeup.
    fn wait_for_ready(&self) {
        self.lock.acquire().unwrap();
        while !self.ready.load(Ordering::Acquire) {
            self.condvar.wait().unwrap();
        }
        self.proceeded.fetch_add(1, Ordering::SeqCst);
        self.lock.release().unwrap();
    }
}

#[test]
fn waiter_stays_blocked_while_predicate_is_false() {
    let fixture = Fixture::new();
    let waiter_fixture = Arc::clone(&fixture);
    let waiter = thread::spawn(move || waiter_fixture.wait_for_ready());

    thread::sleep(Duration::from_millis(80));
    assert!(!waiter.is_finished());
    assert_eq!(fixture.proceeded.load(Ordering::SeqCst), 0);

    fixture.lock.acquire().unwrap();
    fixture.ready.store(true, Ordering::Release);
    fixture.condvar.signal_one();
    fixture.lock.release().unwrap();

    waiter.join().unwrap();
    assert_eq!(fixture.proceeded.load(Ordering::SeqCst), 1);
}

/// A signal while the predicate is still false is a spurious wakeup
/// from the waiter's point of view: the predicate loop re-blocks it.
#[test]
fn spurious_signal_does_not_release_the_waiter() {
    let fixture = Fixture::new();
    let waiter_fixture = Arc::clone(&fixture);
    let waiter = thread::spawn(move || waiter_fixture.wait_for_ready());

    thread::sleep(Duration::from_millis(50));
    // wake without making the predicate true
    fixture.lock.acquire().unwrap();
    fixture.condvar.signal_one();
    fixture.lock.release().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());
    assert_eq!(fixture.proceeded.load(Ordering::SeqCst), 0);

    fixture.lock.acquire().unwrap();
    fixture.ready.store(true, Ordering::Release);
    fixture.condvar.signal_all();
    fixture.lock.release().unwrap();
    waiter.join().unwrap();
}

#[test]
fn signal_all_releases_every_waiter_once_ready() {
    let fixture = Fixture::new();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let waiter_fixture = Arc::clone(&fixture);
            thread::spawn(move || waiter_fixture.wait_for_ready())
        })
        .collect();

    thread::sleep(Duration::from_millis(80));
    assert_eq!(fixture.proceeded.load(Ordering::SeqCst), 0);

    fixture.lock.acquire().unwrap();
    fixture.ready.store(true, Ordering::Release);
    fixture.condvar.signal_all();
    fixture.lock.release().unwrap();

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(fixture.proceeded.load(Ordering::SeqCst), 3);
}

#[test]
fn timed_wait_distinguishes_timeout_from_signal() {
    let lock = Arc::new(ExclusiveLock::new());
    let condvar = ConditionVariable::for_lock(&lock);

    lock.acquire().unwrap();
    let outcome = condvar.wait_timeout(Duration::from_millis(20)).unwrap();
    assert!(outcome.timed_out());
    lock.release().unwrap();
}
