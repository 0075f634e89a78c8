// ── Owning-thread cooperative queue ───────────────────────────────────────────
//
// Every window is affine to one thread.  Hook dispatch always runs there, one
// job at a time; callers on other threads hand work over and (for `invoke`)
// block until the owner has run it.
//
// A queue shuts itself down when its owning thread exits, so a caller blocked
// in `invoke` is released even if the owner never called `shutdown`.

use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    thread::{self, ThreadId},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// A unit of work handed to the owning thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The owning thread's queue, as seen by the subclassing layer.
pub trait OwnerQueue: Send + Sync {
    /// `true` when called on the owning thread.
    fn check_access(&self) -> bool;

    /// `true` once the queue has stopped accepting work.
    fn has_shut_down(&self) -> bool;

    /// Run `job` on the owning thread and wait for it to finish.
    ///
    /// Runs inline when called from the owning thread.  Returns `false` if the
    /// queue shut down before the job could run.
    fn invoke(&self, job: Job) -> bool;

    /// Queue `job` for the owning thread without waiting.
    ///
    /// Returns `false` if the queue has shut down.
    fn begin_invoke(&self, job: Job) -> bool;
}

/// Run `f` through [`OwnerQueue::invoke`] and hand its value back.
///
/// `None` means the queue refused or dropped the job.
pub(crate) fn invoke_with_result<T, F>(queue: &dyn OwnerQueue, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let ran = queue.invoke(Box::new(move || {
        let _ = tx.send(f());
    }));
    if ran {
        rx.try_recv().ok()
    } else {
        None
    }
}

// ── ThreadQueue ───────────────────────────────────────────────────────────────

enum Envelope {
    Run { job: Job, done: Option<Sender<()>> },
    Wake,
}

/// A cooperative queue bound to the thread that created it.
///
/// The owner drains it either by blocking in [`run`](Self::run) or by calling
/// [`pump`](Self::pump) from its own message loop.  An optional waker is called
/// after each cross-thread submission so a loop blocked in `GetMessageW` can be
/// nudged.
pub struct ThreadQueue {
    owner: ThreadId,
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
    shut_down: AtomicBool,
    waker: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Queues created on this thread; shut down when the thread exits.
struct OwnedQueues(Vec<Weak<ThreadQueue>>);

impl Drop for OwnedQueues {
    fn drop(&mut self) {
        for queue in self.0.drain(..).filter_map(|q| q.upgrade()) {
            queue.shutdown();
        }
    }
}

thread_local! {
    static OWNED_QUEUES: RefCell<OwnedQueues> = const { RefCell::new(OwnedQueues(Vec::new())) };
}

impl ThreadQueue {
    /// A queue owned by the calling thread.
    pub fn for_current_thread() -> Arc<Self> {
        Self::adopt(Self::build(None))
    }

    /// A queue owned by the calling thread that calls `waker` whenever another
    /// thread submits work.
    pub fn with_waker(waker: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Self::adopt(Self::build(Some(Box::new(waker))))
    }

    fn adopt(queue: Self) -> Arc<Self> {
        let queue = Arc::new(queue);
        let registered = OWNED_QUEUES.try_with(|owned| {
            let mut owned = owned.borrow_mut();
            owned.0.retain(|q| q.strong_count() > 0);
            owned.0.push(Arc::downgrade(&queue));
        });
        if registered.is_err() {
            log::warn!("owner queue created during thread teardown; shut down on creation");
            queue.shutdown();
        }
        queue
    }

    fn build(waker: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            owner: thread::current().id(),
            sender,
            receiver,
            shut_down: AtomicBool::new(false),
            waker,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Run every job already queued.  Owner thread only.
    ///
    /// Returns the number of jobs run.
    pub fn pump(&self) -> usize {
        debug_assert!(self.check_access(), "ThreadQueue::pump off the owning thread");
        let mut ran = 0;
        while let Ok(envelope) = self.receiver.try_recv() {
            if self.has_shut_down() {
                break;
            }
            if Self::execute(envelope) {
                ran += 1;
            }
        }
        ran
    }

    /// Block the owner thread running jobs until [`shutdown`](Self::shutdown).
    pub fn run(&self) {
        debug_assert!(self.check_access(), "ThreadQueue::run off the owning thread");
        while let Ok(envelope) = self.receiver.recv() {
            if self.has_shut_down() {
                break;
            }
            Self::execute(envelope);
        }
        self.discard_pending();
    }

    /// Stop accepting work.  Pending jobs are dropped, which releases any
    /// thread blocked in `invoke` on them.  Callable from any thread; runs on
    /// its own when the owning thread exits.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("owner queue for {:?} shut down", self.owner);
        self.discard_pending();
        let _ = self.sender.send(Envelope::Wake);
        self.wake();
    }

    fn execute(envelope: Envelope) -> bool {
        match envelope {
            Envelope::Run { job, done } => {
                job();
                if let Some(done) = done {
                    let _ = done.send(());
                }
                true
            }
            Envelope::Wake => false,
        }
    }

    fn discard_pending(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl OwnerQueue for ThreadQueue {
    fn check_access(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn has_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn invoke(&self, job: Job) -> bool {
        if self.has_shut_down() {
            return false;
        }
        if self.check_access() {
            job();
            return true;
        }

        let (done, finished) = bounded(1);
        if self
            .sender
            .send(Envelope::Run {
                job,
                done: Some(done),
            })
            .is_err()
        {
            return false;
        }
        self.wake();

        // A shutdown that raced the send may already have drained the channel;
        // drain again so our envelope cannot be stranded.
        if self.has_shut_down() {
            self.discard_pending();
        }
        finished.recv().is_ok()
    }

    fn begin_invoke(&self, job: Job) -> bool {
        if self.has_shut_down() {
            return false;
        }
        if self.sender.send(Envelope::Run { job, done: None }).is_err() {
            return false;
        }
        if !self.check_access() {
            self.wake();
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
