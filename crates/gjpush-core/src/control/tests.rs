use super::*;
use crate::error::TransferError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn new_root_is_running() {
    let r = Resumable::new(false);
    assert!(r.is_running());
    assert!(!r.is_cancelled());
    assert!(!r.is_interruptible());
}

#[test]
fn ids_are_unique() {
    let a = Resumable::new(false);
    let b = Resumable::new(false);
    let c = a.child(false);
    assert_ne!(a.id(), b.id());
    assert_ne!(a.id(), c.id());
    assert_ne!(b.id(), c.id());
}

#[test]
fn pause_is_idempotent_and_resume_restores() {
    let r = Resumable::new(false);
    r.pause();
    r.pause();
    assert!(!r.is_running());
    r.resume();
    assert!(r.is_running());
    // Extra resume is a no-op.
    r.resume();
    assert!(r.is_running());
}

#[test]
fn running_iff_no_unmatched_pauses() {
    let root = Resumable::new(false);
    let mid = root.child(false);
    let leaf = mid.child(false);

    root.pause();
    mid.pause();
    leaf.pause();
    assert!(!leaf.is_running());

    leaf.resume();
    assert!(!leaf.is_running(), "still held by mid and root");
    mid.resume();
    assert!(!leaf.is_running(), "still held by root");
    assert!(!mid.is_running());
    root.resume();
    assert!(leaf.is_running());
    assert!(mid.is_running());
    assert!(root.is_running());
}

#[test]
fn cancel_is_terminal() {
    let r = Resumable::new(false);
    r.pause();
    r.cancel();
    r.resume();
    assert!(!r.is_running());
    assert!(r.is_cancelled());
    assert_eq!(r.wait_blocking(), Outcome::Cancel);
    r.cancel();
    assert_eq!(r.wait_blocking(), Outcome::Cancel);
}

#[test]
fn pause_after_cancel_is_noop() {
    let r = Resumable::new(false);
    r.cancel();
    r.pause();
    assert!(r.is_cancelled());
    assert_eq!(r.wait_blocking(), Outcome::Cancel);
}

#[test]
fn parent_pause_propagates_to_children() {
    let parent = Resumable::new(false);
    let a = parent.child(false);
    let b = parent.child(false);
    parent.pause();
    assert!(!a.is_running());
    assert!(!b.is_running());
    parent.resume();
    assert!(a.is_running());
    assert!(b.is_running());
}

#[test]
fn child_created_while_paused_starts_paused() {
    let parent = Resumable::new(false);
    parent.pause();
    let child = parent.child(false);
    assert!(!child.is_running());
    assert!(!child.is_cancelled());
    parent.resume();
    assert!(child.is_running());
}

#[test]
fn grandchild_inherits_full_depth() {
    let root = Resumable::new(false);
    let mid = root.child(false);
    root.pause();
    mid.pause();
    let leaf = mid.child(false);
    mid.resume();
    assert!(!leaf.is_running());
    root.resume();
    assert!(leaf.is_running());
}

#[test]
fn interruptible_child_created_while_paused_is_cancelled() {
    let parent = Resumable::new(false);
    parent.pause();
    let child = parent.child(true);
    assert!(child.is_cancelled());
    parent.resume();
    assert!(child.is_cancelled());
    assert!(!child.is_running());
    assert!(parent.is_running());
}

#[test]
fn pausing_interruptible_cancels_it() {
    let r = Resumable::new(true);
    r.pause();
    assert!(r.is_cancelled());
    r.resume();
    assert!(r.is_cancelled());
}

#[test]
fn parent_pause_cancels_interruptible_child_only() {
    let parent = Resumable::new(false);
    let resumable = parent.child(false);
    let interruptible = parent.child(true);
    parent.pause();
    assert!(interruptible.is_cancelled());
    assert!(!resumable.is_cancelled());
    parent.resume();
    assert!(resumable.is_running());
    assert!(!interruptible.is_running());
}

#[test]
fn cancel_reaches_descendants_not_ancestors() {
    let root = Resumable::new(false);
    let mid = root.child(false);
    let leaf = mid.child(false);
    mid.cancel();
    assert!(leaf.is_cancelled());
    assert!(!root.is_cancelled());

    root.cancel();
    let late = root.child(false);
    assert!(late.is_cancelled());
}

#[test]
fn external_token_scope() {
    let external = CancellationToken::new();
    let r = Resumable::with_token(&external, false);
    assert!(r.is_running());
    external.cancel();
    assert!(r.is_cancelled());

    let external = CancellationToken::new();
    let r = Resumable::with_token(&external, false);
    r.cancel();
    assert!(!external.is_cancelled());
}

#[test]
fn cancelled_children_are_pruned() {
    let parent = Resumable::new(false);
    let keep = parent.child(false);
    {
        let _dropped_handle = parent.child(false);
    }
    let cancelled = parent.child(false);
    cancelled.cancel();
    assert_eq!(parent.child_count(), 2);
    keep.cancel();
    assert_eq!(parent.child_count(), 1);
    parent.cancel();
    assert_eq!(parent.child_count(), 0);
}

#[test]
fn pause_reaches_grandchild_of_dropped_handle() {
    let root = Resumable::new(false);
    let leaf = root.child(false).child(false);
    root.pause();
    assert!(!leaf.is_running());
    root.resume();
    assert!(leaf.is_running());
    root.cancel();
    assert!(leaf.is_cancelled());
}

#[test]
fn wait_blocking_released_by_resume_from_other_thread() {
    let r = Resumable::new(false);
    r.pause();
    let remote = r.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        remote.resume();
    });
    assert_eq!(r.wait_blocking(), Outcome::Resume);
    handle.join().unwrap();
}

#[test]
fn wait_blocking_released_by_ancestor_cancel() {
    let root = Resumable::new(false);
    let child = root.child(false);
    child.pause();
    let remote = root.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        remote.cancel();
    });
    assert_eq!(child.wait_blocking(), Outcome::Cancel);
    handle.join().unwrap();
}

#[tokio::test]
async fn wait_is_immediate_when_running() {
    let r = Resumable::new(false);
    assert_eq!(r.wait().await, Outcome::Resume);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_waiters_all_see_resume() {
    let r = Resumable::new(false);
    r.pause();
    let released = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let r = r.clone();
        let released = Arc::clone(&released);
        handles.push(tokio::spawn(async move {
            let outcome = r.wait().await;
            released.fetch_add(1, Ordering::SeqCst);
            outcome
        }));
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(released.load(Ordering::SeqCst), 0);
    r.resume();
    for h in handles {
        assert_eq!(h.await.unwrap(), Outcome::Resume);
    }
    assert_eq!(released.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn second_pause_cycle_uses_fresh_signal() {
    let r = Resumable::new(false);
    r.pause();
    r.resume();
    r.pause();
    let waiter = {
        let r = r.clone();
        tokio::spawn(async move { r.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());
    r.cancel();
    assert_eq!(waiter.await.unwrap(), Outcome::Cancel);
}

#[tokio::test]
async fn done_completes_on_ancestor_cancel() {
    let root = Resumable::new(false);
    let child = root.child(true);
    let done = child.done();
    root.cancel();
    tokio::time::timeout(Duration::from_secs(1), done)
        .await
        .expect("done should complete");
}

#[test]
fn chain_runs_all_tasks_in_order() {
    let r = Resumable::new(false);
    let order = std::sync::Mutex::new(Vec::new());
    let tasks: Vec<Task<'_>> = vec![
        Box::new(|| {
            order.lock().unwrap().push(1);
            Ok(())
        }),
        Box::new(|| {
            order.lock().unwrap().push(2);
            Ok(())
        }),
    ];
    run_chain(&r, tasks).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[test]
fn chain_stops_on_first_error() {
    let r = Resumable::new(false);
    let ran = AtomicUsize::new(0);
    let tasks: Vec<Task<'_>> = vec![
        Box::new(|| Err(TransferError::stall(7, "boom"))),
        Box::new(|| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    ];
    let err = run_chain(&r, tasks).unwrap_err();
    assert!(matches!(err, TransferError::ProtocolStall { offset: 7, .. }));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn chain_cancelled_between_tasks() {
    let r = Resumable::new(false);
    let ran = AtomicUsize::new(0);
    let ctrl = r.clone();
    let tasks: Vec<Task<'_>> = vec![
        Box::new(move || {
            ctrl.cancel();
            Ok(())
        }),
        Box::new(|| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    ];
    let err = run_chain(&r, tasks).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn chain_waits_while_paused() {
    let r = Resumable::new(false);
    r.pause();
    let remote = r.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        remote.resume();
    });
    let ran = AtomicUsize::new(0);
    let tasks: Vec<Task<'_>> = vec![Box::new(|| {
        ran.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })];
    run_chain(&r, tasks).unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    handle.join().unwrap();
}
