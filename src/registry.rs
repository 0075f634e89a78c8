// ── Shutdown registry ─────────────────────────────────────────────────────────
//
// Directory of every attached subclass in the process.  At shutdown it
// rewires each tracked window straight to the OS's neutral default procedure:
// by then the code behind our trampolines may already be unusable, so nothing
// may be left that routes a late message back into it.
//
// One coarse lock guards the map.  The sweep works from a snapshot and sets the
// `shutting_down` latch first, so detach calls racing the sweep (including the
// ones it provokes itself) cannot mutate the map underneath it.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::{
    error::Result,
    platform::{
        messages::{DEF_WINDOW_PROC_A, DEF_WINDOW_PROC_W, DETACH_MESSAGE_NAME, USER32, WM_CLOSE, WS_CHILD},
        Message, ProcAddress, WindowApi, WindowHandle,
    },
    subclass::{DetachRequest, Token},
};

#[derive(Default)]
struct RegistryState {
    entries: HashMap<Token, WindowHandle>,
    shutting_down: bool,
}

/// Live-instance directory of attached subclasses.
pub struct ShutdownRegistry {
    api: Arc<dyn WindowApi>,
    state: Mutex<RegistryState>,
    neutral_wide: OnceLock<ProcAddress>,
    neutral_narrow: OnceLock<ProcAddress>,
}

impl ShutdownRegistry {
    pub fn new(api: Arc<dyn WindowApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            state: Mutex::new(RegistryState::default()),
            neutral_wide: OnceLock::new(),
            neutral_narrow: OnceLock::new(),
        })
    }

    pub fn api(&self) -> &dyn WindowApi {
        &*self.api
    }

    /// Track `token` as attached to `hwnd`.  Ignored once shutdown has begun.
    pub fn register(&self, token: Token, hwnd: WindowHandle) {
        let mut state = self.state.lock();
        if state.shutting_down {
            warn!("{token:?} attached to {hwnd:?} after shutdown began; not tracked");
            return;
        }
        state.entries.insert(token, hwnd);
    }

    /// Stop tracking `token`.  Ignored once shutdown has begun.
    pub fn unregister(&self, token: Token) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        state.entries.remove(&token);
    }

    pub fn contains(&self, token: Token) -> bool {
        self.state.lock().entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// The OS's do-nothing procedure matching `hwnd`'s character set.
    ///
    /// Each flavour is resolved once and cached.
    pub fn neutral_handler(&self, hwnd: WindowHandle) -> Result<ProcAddress> {
        let (cell, symbol) = if self.api.is_window_unicode(hwnd) {
            (&self.neutral_wide, DEF_WINDOW_PROC_W)
        } else {
            (&self.neutral_narrow, DEF_WINDOW_PROC_A)
        };
        if let Some(proc) = cell.get() {
            return Ok(*proc);
        }
        let proc = self.api.resolve_export(USER32, symbol)?;
        Ok(*cell.get_or_init(|| proc))
    }

    /// A guard that runs [`on_process_shutdown`](Self::on_process_shutdown)
    /// when dropped.  Hold it for the life of `main`.
    pub fn shutdown_guard(self: &Arc<Self>) -> ShutdownGuard {
        ShutdownGuard {
            registry: self.clone(),
        }
    }

    /// Force every tracked window off its subclass chain.
    ///
    /// Runs once; later calls return immediately.  Returns how many windows
    /// had their procedure replaced (and were asked to close).
    pub fn on_process_shutdown(&self) -> usize {
        let snapshot: Vec<(Token, WindowHandle)> = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return 0;
            }
            state.shutting_down = true;
            state.entries.iter().map(|(t, h)| (*t, *h)).collect()
        };
        info!("shutdown sweep over {} subclassed window(s)", snapshot.len());

        let detach_message = match self.api.register_message(DETACH_MESSAGE_NAME) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("cannot register detach message for shutdown sweep: {e}");
                None
            }
        };

        let mut rewired = 0;
        for (token, hwnd) in snapshot {
            if let Some(msg) = detach_message {
                if self.unwinds_in_place(hwnd) {
                    // Let a well-behaved chain unwind itself first.
                    let request = Message::new(
                        hwnd,
                        msg,
                        token.as_raw(),
                        DetachRequest::ForcedPassThrough.as_lparam(),
                    );
                    if let Err(e) = self.api.send_message(request) {
                        debug!("detach request to {hwnd:?} failed: {e}");
                    }
                }
            }

            match self.rewire_to_default(hwnd) {
                Ok(true) => {
                    rewired += 1;
                    if let Err(e) = self.api.post_message(Message::new(hwnd, WM_CLOSE, 0, 0)) {
                        debug!("close request to {hwnd:?} failed: {e}");
                    }
                }
                Ok(false) => {}
                Err(e) => error!("cannot rewire {hwnd:?} to the default procedure: {e}"),
            }
        }
        rewired
    }

    /// Hosted child windows still pumped by this process get a chance to
    /// unwind through the detach message.
    fn unwinds_in_place(&self, hwnd: WindowHandle) -> bool {
        self.api.is_window(hwnd)
            && self
                .api
                .window_style(hwnd)
                .map_or(false, |style| style & WS_CHILD != 0)
    }

    /// `Ok(true)` if a non-null procedure was actually replaced.
    fn rewire_to_default(&self, hwnd: WindowHandle) -> Result<bool> {
        let neutral = self.neutral_handler(hwnd)?;
        match self.api.set_window_proc(hwnd, neutral) {
            Ok(previous) => Ok(!previous.is_null()),
            Err(e) if e.is_window_gone() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Runs the shutdown sweep of its registry on drop.
#[must_use = "the sweep runs when the guard is dropped"]
pub struct ShutdownGuard {
    registry: Arc<ShutdownRegistry>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.registry.on_process_shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
