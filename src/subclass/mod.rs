// ── Subclass engine ───────────────────────────────────────────────────────────
//
// One `SubclassHandle` intercepts one window's procedure:
//
//   Unattached ──attach / first message──▶ Attached ──detach──▶ Orphaned ──▶ Detached
//
// `Orphaned` only exists while a teardown is in flight, so re-entrant detach
// requests can be recognised and short-circuited.  A `Detached` instance is
// never reused; create a new one to subclass again.
//
// Invariant: while `Attached`, the window's `GWLP_WNDPROC` is this instance's
// trampoline (unless someone chained on top of us, which the unforced detach
// path detects and refuses to break).
//
// Locking: the state mutex is never held across a call into hooks or into the
// previous procedure, so re-entrant messages (a hook sending to its own window)
// cannot deadlock.

mod slots;

use std::sync::{Arc, Weak};

use log::{debug, error, warn};
use parking_lot::Mutex;

pub use slots::Token;
#[cfg(test)]
pub(crate) use slots::is_free as is_free_trampoline;
use slots::SlotLease;

use crate::{
    error::{Result, SubclassError},
    fatal,
    interop::Interop,
    platform::{messages::WM_NCDESTROY, Message, ProcAddress, WindowHandle},
    queue::{self, OwnerQueue},
};

// ── Public types ──────────────────────────────────────────────────────────────

/// Attach/detach lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bond {
    Unattached,
    Attached,
    /// Teardown in progress.
    Orphaned,
    Detached,
}

/// Code carried in the detach message's lParam.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachRequest {
    /// Detach only if the chain is intact; the message stops here.
    Unforced,
    /// Detach regardless of the chain; the message stops here.
    Forced,
    /// Detach regardless, then pass the message to the previous procedure so
    /// further subclasses below us see it too.
    ForcedPassThrough,
}

impl DetachRequest {
    pub fn from_lparam(lparam: isize) -> Self {
        match lparam {
            i if i <= 0 => Self::Unforced,
            1 => Self::Forced,
            _ => Self::ForcedPassThrough,
        }
    }

    pub fn as_lparam(self) -> isize {
        match self {
            Self::Unforced => 0,
            Self::Forced => 1,
            Self::ForcedPassThrough => 2,
        }
    }

    pub fn is_forced(self) -> bool {
        self != Self::Unforced
    }

    pub fn passes_through(self) -> bool {
        self == Self::ForcedPassThrough
    }
}

/// What the hook chain made of one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookOutcome {
    pub result: isize,
    pub handled: bool,
}

impl HookOutcome {
    pub const UNHANDLED: Self = Self {
        result: 0,
        handled: false,
    };

    pub fn handled(result: isize) -> Self {
        Self {
            result,
            handled: true,
        }
    }
}

/// Receiver of every message the subclass intercepts.
///
/// Always called on the window's owning thread.  Held weakly: once the sink is
/// gone, messages simply fall through to the previous procedure.
pub trait MessageSink: Send + Sync {
    fn dispatch(&self, message: Message) -> HookOutcome;
}

// ── SubclassHandle ────────────────────────────────────────────────────────────

/// Owner-side handle of one window-procedure interception.
///
/// Dropping the handle while `Attached` leaves the interception in place (the
/// window still routes through it) until a detach message or the shutdown
/// sweep removes it.
pub struct SubclassHandle {
    core: Arc<SubclassCore>,
}

impl SubclassHandle {
    /// Reserve a trampoline for a new, unattached subclass.
    ///
    /// `queue` is the owning thread of whatever window this will be attached
    /// to; `sink` receives the intercepted messages there.
    pub fn new(
        interop: &Interop,
        queue: Arc<dyn OwnerQueue>,
        sink: Weak<dyn MessageSink>,
    ) -> Result<Self> {
        let lease = SlotLease::reserve()?;
        let core = Arc::new(SubclassCore {
            lease,
            interop: interop.clone(),
            queue,
            sink,
            state: Mutex::new(CoreState {
                bond: Bond::Unattached,
                hwnd: WindowHandle::NULL,
                previous: ProcAddress::NULL,
            }),
        });
        lease.bind(core.clone());
        Ok(Self { core })
    }

    /// The native entry point.  Install it as a class procedure to have the
    /// subclass attach itself on the window's first message.
    pub fn trampoline(&self) -> ProcAddress {
        self.core.lease.proc()
    }

    /// Identity native code uses to address this instance.
    pub fn token(&self) -> Token {
        self.core.lease.token()
    }

    pub fn bond(&self) -> Bond {
        self.core.state.lock().bond
    }

    /// The window this instance is or was attached to.
    pub fn window(&self) -> Option<WindowHandle> {
        let hwnd = self.core.state.lock().hwnd;
        (!hwnd.is_null()).then_some(hwnd)
    }

    /// Interpose on `hwnd`'s current procedure.
    pub fn attach(&self, hwnd: WindowHandle) -> Result<Token> {
        self.core.attach(hwnd)
    }

    /// Restore the previous procedure.
    ///
    /// `Ok(false)` means the chain changed since we attached and `force` was
    /// not set; nothing was modified.
    pub fn detach(&self, force: bool) -> Result<bool> {
        self.core.detach(force)
    }

    /// Ask the window itself to run the detach, from inside its own message
    /// context.  Returns whether this instance ended up detached.
    pub fn request_detach(&self, request: DetachRequest) -> Result<bool> {
        let Some(hwnd) = self.window() else {
            return Ok(true);
        };
        if self.bond() == Bond::Detached {
            return Ok(true);
        }
        let message = Message::new(
            hwnd,
            self.core.interop.detach_message(),
            self.token().as_raw(),
            request.as_lparam(),
        );
        match self.core.interop.api().send_message(message) {
            Ok(_) => {}
            Err(e) if e.is_window_gone() => return self.detach(true),
            Err(e) => return Err(e),
        }
        Ok(self.bond() == Bond::Detached)
    }
}

impl Drop for SubclassHandle {
    fn drop(&mut self) {
        // A never-attached instance gives its trampoline back; an attached one
        // stays reachable through the slot until it is detached.
        if self.bond() == Bond::Unattached {
            self.core.lease.release();
        }
    }
}

// ── Core ──────────────────────────────────────────────────────────────────────

struct CoreState {
    bond: Bond,
    hwnd: WindowHandle,
    previous: ProcAddress,
}

pub(crate) struct SubclassCore {
    lease: SlotLease,
    interop: Interop,
    queue: Arc<dyn OwnerQueue>,
    sink: Weak<dyn MessageSink>,
    state: Mutex<CoreState>,
}

impl SubclassCore {
    fn attach(&self, hwnd: WindowHandle) -> Result<Token> {
        if hwnd.is_null() {
            return Err(SubclassError::NullWindow);
        }
        let token = self.lease.token();
        {
            let mut state = self.state.lock();
            if state.bond != Bond::Unattached {
                return Err(SubclassError::AlreadyAttached(state.hwnd));
            }
            // Held across the swap so a message racing in on another thread
            // sees `Attached`, not a half-installed subclass.
            let previous = self.interop.api().set_window_proc(hwnd, self.lease.proc())?;
            state.bond = Bond::Attached;
            state.hwnd = hwnd;
            state.previous = previous;
        }
        self.interop.registry().register(token, hwnd);
        debug!("{token:?} attached to {hwnd:?}");
        Ok(token)
    }

    /// Bookkeeping for a window whose class procedure is our trampoline: the
    /// OS installed us before we ever saw the handle.  Returns the previous
    /// procedure to forward to.
    fn attach_implicitly(&self, hwnd: WindowHandle) -> ProcAddress {
        let token = self.lease.token();
        let previous = {
            let mut state = self.state.lock();
            if state.bond != Bond::Unattached {
                return state.previous;
            }
            let previous = self
                .interop
                .registry()
                .neutral_handler(hwnd)
                .unwrap_or_else(|e| {
                    error!("no default procedure for {hwnd:?}: {e}");
                    ProcAddress::NULL
                });
            state.bond = Bond::Attached;
            state.hwnd = hwnd;
            state.previous = previous;
            previous
        };
        self.interop.registry().register(token, hwnd);
        debug!("{token:?} attached to {hwnd:?} on first message");
        previous
    }

    fn detach(&self, force: bool) -> Result<bool> {
        let api = self.interop.api();
        let token = self.lease.token();
        let (hwnd, previous, chained_over) = {
            let mut state = self.state.lock();
            match state.bond {
                Bond::Unattached | Bond::Detached => return Ok(true),
                Bond::Orphaned => {
                    debug!("{token:?} detach requested while already tearing down");
                    return Ok(true);
                }
                Bond::Attached => {}
            }
            // Chained over: someone installed a procedure above ours and will
            // restore our trampoline address when it unwinds.
            let chained_over = match api.window_proc(state.hwnd) {
                Ok(current) => current != self.lease.proc(),
                Err(e) if e.is_window_gone() => false,
                Err(e) if force => {
                    debug!("{token:?} cannot read procedure of {:?}: {e}", state.hwnd);
                    false
                }
                Err(e) => return Err(e),
            };
            if chained_over && !force {
                debug!("{token:?} not detaching from {:?}: chained over", state.hwnd);
                return Ok(false);
            }
            state.bond = Bond::Orphaned;
            (state.hwnd, state.previous, chained_over)
        };

        self.interop.registry().unregister(token);
        if let Err(e) = api.set_window_proc(hwnd, previous) {
            if !e.is_window_gone() {
                self.state.lock().bond = Bond::Attached;
                self.interop.registry().register(token, hwnd);
                return Err(e);
            }
        }

        self.state.lock().bond = Bond::Detached;
        if chained_over {
            warn!("{token:?} force-detached from under another subclass of {hwnd:?}; slot retired");
            self.lease.retire();
        } else {
            self.lease.release();
        }
        debug!("{token:?} detached from {hwnd:?} (force: {force})");
        Ok(true)
    }

    fn force_detach(&self) {
        if let Err(e) = self.detach(true) {
            error!("{:?} forced detach failed: {e}", self.lease.token());
        }
    }

    /// Body of the trampoline.
    pub(crate) fn handle_message(&self, message: Message) -> isize {
        let (bond, previous) = {
            let state = self.state.lock();
            (state.bond, state.previous)
        };
        let previous = match bond {
            Bond::Attached => previous,
            Bond::Unattached => self.attach_implicitly(message.hwnd),
            Bond::Orphaned => return self.forward(previous, message),
            Bond::Detached => fatal::protocol_violation(format_args!(
                "message {:#06x} delivered to {:?} after detach from {:?}",
                message.msg,
                self.lease.token(),
                message.hwnd
            )),
        };

        if message.msg == self.interop.detach_message() {
            return match self.handle_detach_request(message) {
                Some(result) => result,
                None => self.forward(previous, message),
            };
        }

        let outcome = match self.dispatch(message) {
            Some(outcome) => outcome,
            None => {
                warn!(
                    "owning queue of {:?} has shut down; detaching {:?}",
                    message.hwnd,
                    self.lease.token()
                );
                self.force_detach();
                HookOutcome::UNHANDLED
            }
        };

        // Last message the window will ever get: chain correctness no longer
        // matters, and the previous procedure must always see it.
        if message.msg == WM_NCDESTROY {
            self.force_detach();
            return self.forward(previous, message);
        }

        if outcome.handled {
            outcome.result
        } else {
            self.forward(previous, message)
        }
    }

    /// `Some(result)` if the request was for us and stops here.
    fn handle_detach_request(&self, message: Message) -> Option<isize> {
        let token = self.lease.token();
        if message.wparam != Token::ANY.as_raw() && message.wparam != token.as_raw() {
            return None;
        }
        let request = DetachRequest::from_lparam(message.lparam);
        let detached = self.detach(request.is_forced()).unwrap_or_else(|e| {
            error!("{token:?} detach on request failed: {e}");
            false
        });
        if request.passes_through() {
            None
        } else {
            Some(isize::from(detached))
        }
    }

    /// Hand the message to the sink on the owning thread, blocking until it
    /// has been handled.  `None` if the queue no longer accepts work.
    fn dispatch(&self, message: Message) -> Option<HookOutcome> {
        if self.queue.has_shut_down() {
            return None;
        }
        let sink = self.sink.clone();
        queue::invoke_with_result(&*self.queue, move || match sink.upgrade() {
            Some(sink) => sink.dispatch(message),
            None => HookOutcome::UNHANDLED,
        })
    }

    fn forward(&self, previous: ProcAddress, message: Message) -> isize {
        if previous.is_null() {
            return 0;
        }
        self.interop.api().call_window_proc(previous, message)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
