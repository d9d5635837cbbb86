//! Resumable node: a cancel/pause/resume token that can be nested.
//!
//! Cancellation rides on `CancellationToken` child scopes, so cancelling an
//! ancestor reaches every descendant without touching their locks. Pause and
//! resume are propagated explicitly: the parent holds its own lock and takes
//! each child's lock in turn. A child never locks its parent, so the order is
//! always parent then child.
//!
//! A child's waiters may observe a pause/resume issued on an ancestor with a
//! small scheduling delay; callers must not rely on lock-step visibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Result of waiting on a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The node is running (again); continue with the next unit of work.
    Resume,
    /// The node was cancelled; stop.
    Cancel,
}

/// Handle to a node in the control tree. Cloning shares the node.
#[derive(Clone)]
pub struct Resumable {
    node: Arc<Node>,
}

struct Node {
    id: u64,
    interruptible: bool,
    token: CancellationToken,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    self_paused: bool,
    external_pauses: u32,
    /// Present only while paused; fired (not reused) when the node runs again.
    on_resume: Option<CancellationToken>,
    /// Held strongly so descendants of a dropped handle still see pauses.
    /// An entry leaves the map once its token is cancelled.
    children: HashMap<u64, Arc<Node>>,
}

impl NodeState {
    fn pause_depth(&self) -> u32 {
        self.external_pauses + u32::from(self.self_paused)
    }

    /// Attached children; cancelled entries are pruned.
    fn live_children(&mut self) -> Vec<Arc<Node>> {
        self.children.retain(|_, child| !child.token.is_cancelled());
        self.children.values().cloned().collect()
    }
}

impl Resumable {
    /// Root node with a fresh cancellation scope.
    pub fn new(interruptible: bool) -> Self {
        Self::with_token(&CancellationToken::new(), interruptible)
    }

    /// Root node whose scope derives from an externally supplied token.
    /// Cancelling `parent` cancels this node; cancelling this node leaves `parent` alone.
    pub fn with_token(parent: &CancellationToken, interruptible: bool) -> Self {
        Resumable {
            node: Arc::new(Node::new(parent.child_token(), interruptible, 0)),
        }
    }

    /// Creates a child of `self`.
    ///
    /// The child inherits the current pause depth: if `self` is paused the
    /// child starts paused, unless it is interruptible, in which case it is
    /// cancelled on the spot.
    pub fn child(&self, interruptible: bool) -> Resumable {
        let mut state = self.node.lock();
        let depth = state.pause_depth();
        let child = Arc::new(Node::new(
            self.node.token.child_token(),
            interruptible,
            depth,
        ));
        state.live_children();
        state.children.insert(child.id, Arc::clone(&child));
        drop(state);

        if interruptible && depth > 0 {
            tracing::debug!(
                node = child.id,
                parent = self.node.id,
                "interruptible child created while paused; cancelling"
            );
            child.token.cancel();
        }
        Resumable { node: child }
    }

    /// Pauses this node and, transitively, its children.
    /// On an interruptible node this is `cancel()`.
    pub fn pause(&self) {
        self.node.pause(true);
    }

    /// Resumes this node. Children are released once nothing else holds them paused.
    pub fn resume(&self) {
        self.node.resume(true);
    }

    /// Cancels this node and every descendant. Terminal and idempotent.
    pub fn cancel(&self) {
        self.node.token.cancel();
    }

    /// Waits until the node is running or cancelled.
    ///
    /// Returns immediately when the node is not paused. While paused, each
    /// call holds its own handle on the current resume signal, so every
    /// concurrent waiter is released by the same `resume()`.
    pub async fn wait(&self) -> Outcome {
        let on_resume = {
            let state = self.node.lock();
            if self.node.token.is_cancelled() {
                return Outcome::Cancel;
            }
            if state.pause_depth() == 0 {
                return Outcome::Resume;
            }
            state.on_resume.clone()
        };
        let Some(on_resume) = on_resume else {
            return Outcome::Resume;
        };

        tokio::select! {
            biased;
            _ = self.node.token.cancelled() => Outcome::Cancel,
            _ = on_resume.cancelled() => Outcome::Resume,
        }
    }

    /// Blocking form of [`wait`](Self::wait) for use on I/O threads.
    pub fn wait_blocking(&self) -> Outcome {
        if self.node.token.is_cancelled() {
            return Outcome::Cancel;
        }
        if self.is_running() {
            return Outcome::Resume;
        }
        futures::executor::block_on(self.wait())
    }

    /// True iff not cancelled and not paused by itself or an ancestor.
    pub fn is_running(&self) -> bool {
        let state = self.node.lock();
        !self.node.token.is_cancelled() && state.pause_depth() == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.token.is_cancelled()
    }

    pub fn is_interruptible(&self) -> bool {
        self.node.interruptible
    }

    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// Completes when this node is cancelled (directly or via an ancestor).
    pub fn done(&self) -> WaitForCancellationFutureOwned {
        self.node.token.clone().cancelled_owned()
    }

    /// The node's cancellation token, for deriving further scopes.
    pub fn token(&self) -> CancellationToken {
        self.node.token.clone()
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.node.lock().live_children().len()
    }
}

impl std::fmt::Debug for Resumable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.node.lock();
        f.debug_struct("Resumable")
            .field("id", &self.node.id)
            .field("interruptible", &self.node.interruptible)
            .field("cancelled", &self.node.token.is_cancelled())
            .field("self_paused", &state.self_paused)
            .field("external_pauses", &state.external_pauses)
            .finish()
    }
}

impl Node {
    fn new(token: CancellationToken, interruptible: bool, inherited_pauses: u32) -> Self {
        let on_resume = (inherited_pauses > 0).then(CancellationToken::new);
        Node {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            interruptible,
            token,
            state: Mutex::new(NodeState {
                external_pauses: inherited_pauses,
                on_resume,
                ..NodeState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pause(&self, by_self: bool) {
        if self.interruptible {
            self.token.cancel();
            return;
        }
        // Pausing a cancelled node does nothing.
        if self.token.is_cancelled() {
            return;
        }

        let mut state = self.lock();
        if by_self {
            if state.self_paused {
                return;
            }
            state.self_paused = true;
        } else {
            state.external_pauses += 1;
        }
        if state.on_resume.is_none() {
            state.on_resume = Some(CancellationToken::new());
        }
        for child in state.live_children() {
            child.pause(false);
        }
    }

    fn resume(&self, by_self: bool) {
        let mut state = self.lock();
        if self.token.is_cancelled() {
            return;
        }
        if by_self {
            if !state.self_paused {
                return;
            }
            state.self_paused = false;
        } else {
            state.external_pauses = state.external_pauses.saturating_sub(1);
        }
        if state.pause_depth() == 0 {
            if let Some(signal) = state.on_resume.take() {
                signal.cancel();
            }
        }
        for child in state.live_children() {
            child.resume(false);
        }
    }
}
