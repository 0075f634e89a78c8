// ── Window host ───────────────────────────────────────────────────────────────
//
// Owns one native window of a private class and multiplexes its messages over
// an ordered list of weakly held hooks.  The class procedure is a subclass
// trampoline, so the host sees every message from `WM_NCCREATE` onward.
//
// The window handle and class token live together in one `Option`; they are
// published and cleared as a pair.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    error::Result,
    fatal,
    interop::Interop,
    platform::{
        messages::{CW_USEDEFAULT, WM_NCDESTROY, WS_OVERLAPPEDWINDOW},
        ClassToken, CreateParams, Message, WindowClass, WindowHandle,
    },
    queue::OwnerQueue,
    subclass::{HookOutcome, MessageSink, SubclassHandle},
};

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// A message observer registered with a [`WindowHost`].
///
/// Runs on the window's owning thread.  Set `handled` and return a non-zero
/// result to stop the chain; the value is then returned to the sender.
pub trait WindowHook: Send + Sync {
    fn on_message(&self, message: &Message, handled: &mut bool) -> isize;
}

impl<F> WindowHook for F
where
    F: Fn(&Message, &mut bool) -> isize + Send + Sync,
{
    fn on_message(&self, message: &Message, handled: &mut bool) -> isize {
        self(message, handled)
    }
}

/// Where [`WindowHost::add_hook`] inserts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HookPosition {
    #[default]
    First,
    Last,
}

/// Style and geometry of the hosted window.
#[derive(Clone, Debug)]
pub struct HostParameters {
    pub title: String,
    pub style: u32,
    pub ex_style: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub parent: WindowHandle,
}

impl Default for HostParameters {
    fn default() -> Self {
        Self {
            title: String::new(),
            style: WS_OVERLAPPEDWINDOW,
            ex_style: 0,
            x: CW_USEDEFAULT,
            y: CW_USEDEFAULT,
            width: CW_USEDEFAULT,
            height: CW_USEDEFAULT,
            parent: WindowHandle::NULL,
        }
    }
}

// ── WindowHost ────────────────────────────────────────────────────────────────

struct NativeWindow {
    hwnd: WindowHandle,
    class: ClassToken,
}

type Observer = Box<dyn FnOnce() + Send>;

struct HostInner {
    interop: Interop,
    queue: Arc<dyn OwnerQueue>,
    window: Mutex<Option<NativeWindow>>,
    subclass: Mutex<Option<SubclassHandle>>,
    hooks: Mutex<Vec<Weak<dyn WindowHook>>>,
    /// Set until `create_window` has returned a handle.
    constructing: AtomicBool,
    disposed: AtomicBool,
    observers: Mutex<Vec<Observer>>,
}

/// One owned native window plus its hook chain.
///
/// Dropping the host without [`dispose`](Self::dispose) still destroys the
/// window and unregisters its class, but raises no disposal notification.
pub struct WindowHost {
    inner: Arc<HostInner>,
}

impl WindowHost {
    /// Register a private class and create its window.
    ///
    /// Must be called on `queue`'s owning thread; creation messages are
    /// dispatched to `hooks` (front to back) before this returns.  On failure
    /// nothing stays registered.
    pub fn new(
        interop: &Interop,
        queue: Arc<dyn OwnerQueue>,
        params: &HostParameters,
        hooks: &[Arc<dyn WindowHook>],
    ) -> Result<Self> {
        debug_assert!(queue.check_access(), "WindowHost::new off the owning thread");

        let inner = HostInner::new(interop, queue.clone(), hooks);
        let sink: Weak<HostInner> = Arc::downgrade(&inner);
        let subclass = SubclassHandle::new(interop, queue, sink)?;

        let api = interop.api();
        let class_name = unique_class_name(&interop.settings().class_prefix);
        let class = api.register_class(&WindowClass {
            name: &class_name,
            wnd_proc: subclass.trampoline(),
        })?;

        let created = api.create_window(&CreateParams {
            class_name,
            title: params.title.clone(),
            style: params.style,
            ex_style: params.ex_style,
            x: params.x,
            y: params.y,
            width: params.width,
            height: params.height,
            parent: params.parent,
        });
        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(e) => {
                warn!("creating window of class {} failed: {e}", class.name);
                if let Err(e) = subclass.detach(true) {
                    error!("rollback: detaching {:?} failed: {e}", subclass.token());
                }
                if let Err(e) = api.unregister_class(&class) {
                    error!("rollback: unregistering class {} failed: {e}", class.name);
                }
                return Err(e);
            }
        };

        info!("host window {hwnd:?} created with class {}", class.name);
        *inner.window.lock() = Some(NativeWindow { hwnd, class });
        *inner.subclass.lock() = Some(subclass);
        inner.constructing.store(false, Ordering::SeqCst);
        Ok(Self { inner })
    }

    /// The live window, or `None` once it has been destroyed.
    pub fn handle(&self) -> Option<WindowHandle> {
        self.inner.window.lock().as_ref().map(|w| w.hwnd)
    }

    /// Name of the registered window class, while the window lives.
    pub fn class_name(&self) -> Option<String> {
        self.inner.window.lock().as_ref().map(|w| w.class.name.clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// `true` on the window's owning thread.
    pub fn check_access(&self) -> bool {
        self.inner.queue.check_access()
    }

    /// Number of hooks whose owners are still alive.
    pub fn hook_count(&self) -> usize {
        self.inner
            .hooks
            .lock()
            .iter()
            .filter(|h| h.strong_count() > 0)
            .count()
    }

    /// Register `hook` without keeping it alive.
    pub fn add_hook(&self, hook: &Arc<dyn WindowHook>, position: HookPosition) {
        let mut hooks = self.inner.hooks.lock();
        hooks.retain(|h| h.strong_count() > 0);
        let weak = Arc::downgrade(hook);
        match position {
            HookPosition::First => hooks.insert(0, weak),
            HookPosition::Last => hooks.push(weak),
        }
    }

    /// Remove the first registration of `hook`.  No-op if it is not present.
    pub fn remove_hook(&self, hook: &Arc<dyn WindowHook>) {
        let mut hooks = self.inner.hooks.lock();
        if let Some(at) = hooks
            .iter()
            .position(|h| std::ptr::addr_eq(h.as_ptr(), Arc::as_ptr(hook)))
        {
            hooks.remove(at);
        }
    }

    /// Run `observer` once, when the host is disposed (explicitly or because
    /// its window was destroyed).  Runs immediately if that already happened.
    pub fn on_disposed(&self, observer: impl FnOnce() + Send + 'static) {
        if self.is_disposed() {
            observer();
            return;
        }
        self.inner.observers.lock().push(Box::new(observer));
        // Lost a race with dispose: make sure it still runs.
        if self.is_disposed() {
            self.inner.notify_disposed();
        }
    }

    /// Destroy the window and unregister its class.  Idempotent.
    ///
    /// From another thread the destroy is queued to the owning thread and this
    /// returns without waiting for it.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl HostInner {
    /// A host with no window yet, in the constructing state.
    fn new(
        interop: &Interop,
        queue: Arc<dyn OwnerQueue>,
        hooks: &[Arc<dyn WindowHook>],
    ) -> Arc<Self> {
        Arc::new(Self {
            interop: interop.clone(),
            queue,
            window: Mutex::new(None),
            subclass: Mutex::new(None),
            hooks: Mutex::new(hooks.iter().map(Arc::downgrade).collect()),
            constructing: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
        })
    }

    fn dispose(self: &Arc<Self>) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify_disposed();

        if self.queue.check_access() {
            self.destroy_window();
            return;
        }
        let this = self.clone();
        if !self.queue.begin_invoke(Box::new(move || this.destroy_window())) {
            warn!("owning queue has shut down; host window left for the shutdown sweep");
        }
    }

    fn notify_disposed(&self) {
        let observers = std::mem::take(&mut *self.observers.lock());
        for observer in observers {
            observer();
        }
    }

    /// Owner thread only.
    fn destroy_window(&self) {
        // Taken first so the `WM_NCDESTROY` this provokes finds nothing to do.
        let Some(window) = self.window.lock().take() else {
            return;
        };
        let api = self.interop.api();
        match api.destroy_window(window.hwnd) {
            Ok(()) => {}
            Err(e) if e.is_window_gone() => {}
            Err(e) => error!("destroying host window {:?} failed: {e}", window.hwnd),
        }
        if let Err(e) = api.unregister_class(&window.class) {
            error!("unregistering class {} failed: {e}", window.class.name);
        }
    }

    /// The window is going away underneath us.
    fn on_window_destroyed(&self) {
        let Some(window) = self.window.lock().take() else {
            return;
        };
        info!("host window {:?} destroyed", window.hwnd);
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.notify_disposed();
        }
        // The class still has a window until this message returns.
        let interop = self.interop.clone();
        let class = window.class;
        let queued = self.queue.begin_invoke(Box::new(move || {
            if let Err(e) = interop.api().unregister_class(&class) {
                error!("unregistering class {} failed: {e}", class.name);
            }
        }));
        if !queued {
            warn!("class unregistration dropped: owning queue has shut down");
        }
    }

    fn live_hooks(&self) -> Vec<Arc<dyn WindowHook>> {
        self.hooks.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

impl MessageSink for HostInner {
    fn dispatch(&self, message: Message) -> HookOutcome {
        if self.interop.settings().trace_messages {
            trace!(
                "{:?} msg {:#06x} wp {:#x} lp {:#x}",
                message.hwnd,
                message.msg,
                message.wparam,
                message.lparam
            );
        }
        let creating = self.constructing.load(Ordering::SeqCst);

        let mut handled = false;
        let mut result = 0;
        for hook in self.live_hooks() {
            let call =
                panic::catch_unwind(AssertUnwindSafe(|| hook.on_message(&message, &mut handled)));
            result = match call {
                Ok(result) => result,
                Err(_) => {
                    error!("hook panicked on message {:#06x}; skipped", message.msg);
                    0
                }
            };
            fatal::check_creation_result(creating, handled, result);
            if handled && result != 0 {
                break;
            }
        }

        if message.msg == WM_NCDESTROY {
            self.on_window_destroyed();
        } else if message.msg == self.interop.memory_usage_message() {
            result = self.interop.api().process_memory_usage() as isize;
            handled = true;
        }

        HookOutcome { result, handled }
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        // Finalization: no observers, no marshaling.
        let Some(window) = self.window.get_mut().take() else {
            return;
        };
        debug!("host for {:?} finalized without dispose", window.hwnd);
        let api = self.interop.api();
        if let Err(e) = api.destroy_window(window.hwnd) {
            debug!("finalizer could not destroy {:?}: {e}", window.hwnd);
        }
        if let Err(e) = api.unregister_class(&window.class) {
            debug!("finalizer could not unregister {}: {e}", window.class.name);
        }
    }
}

fn unique_class_name(prefix: &str) -> String {
    format!(
        "{prefix}[{};{}]",
        std::process::id(),
        Uuid::new_v4().simple()
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        thread,
    };

    use super::*;
    use crate::{
        config::Settings,
        platform::{
            fake::{self, FakeWindows},
            messages::{WM_CREATE, WM_DESTROY, WM_NCCREATE, WM_USER},
            ProcAddress, WindowApi,
        },
        queue::ThreadQueue,
        registry::ShutdownRegistry,
        subclass,
    };

    type Log = Arc<Mutex<Vec<(&'static str, u32)>>>;

    /// A hook that logs under `name` and claims `claim` with `result`.
    fn hook(log: &Log, name: &'static str, claim: Option<(u32, isize)>) -> Arc<dyn WindowHook> {
        let log = log.clone();
        Arc::new(move |message: &Message, handled: &mut bool| {
            log.lock().push((name, message.msg));
            match claim {
                Some((msg, result)) if msg == message.msg => {
                    *handled = true;
                    result
                }
                _ => 0,
            }
        })
    }

    fn seen(log: &Log, msg: u32) -> Vec<&'static str> {
        log.lock()
            .iter()
            .filter(|(_, m)| *m == msg)
            .map(|(name, _)| *name)
            .collect()
    }

    struct Fixture {
        api: Arc<FakeWindows>,
        interop: Interop,
        queue: Arc<ThreadQueue>,
    }

    impl Fixture {
        fn new() -> Self {
            let api = FakeWindows::new();
            let registry = ShutdownRegistry::new(api.clone());
            let interop = Interop::new(registry, Settings::default()).expect("interop");
            Self {
                api,
                interop,
                queue: ThreadQueue::for_current_thread(),
            }
        }

        fn host(&self, hooks: &[Arc<dyn WindowHook>]) -> WindowHost {
            WindowHost::new(&self.interop, self.queue.clone(), &HostParameters::default(), hooks)
                .expect("host")
        }

        fn send(&self, hwnd: WindowHandle, msg: u32) -> isize {
            self.api
                .send_message(Message::new(hwnd, msg, 0, 0))
                .expect("send")
        }
    }

    #[test]
    fn normal_lifecycle() {
        let fx = Fixture::new();
        let host = fx.host(&[]);
        let hwnd = host.handle().expect("window");
        let class = host.class_name().expect("class");
        assert!(class.starts_with("HwndHost["));
        assert!(fx.api.class_registered(&class));

        let log = Log::default();
        let h = hook(&log, "H", None);
        host.add_hook(&h, HookPosition::First);
        fx.send(hwnd, WM_USER);
        assert_eq!(seen(&log, WM_USER), vec!["H"]);

        host.dispose();

        assert!(host.is_disposed());
        assert_eq!(host.handle(), None);
        assert!(!fx.api.is_window(hwnd));
        assert!(!fx.api.class_registered(&class));
        assert!(fx.interop.registry().is_empty());
    }

    #[test]
    fn creation_messages_reach_initial_hooks() {
        let fx = Fixture::new();
        let log = Log::default();
        let host = fx.host(&[hook(&log, "A", None)]);

        assert_eq!(seen(&log, WM_NCCREATE), vec!["A"]);
        assert_eq!(seen(&log, WM_CREATE), vec!["A"]);
        // Unclaimed creation messages fall to the default procedure.
        let hwnd = host.handle().expect("window");
        assert_eq!(fake::default_calls(hwnd), vec![WM_NCCREATE, WM_CREATE]);
        host.dispose();
    }

    #[test]
    fn unique_class_per_host() {
        let fx = Fixture::new();
        let a = fx.host(&[]);
        let b = fx.host(&[]);
        assert_ne!(a.class_name(), b.class_name());
        a.dispose();
        b.dispose();
    }

    #[test]
    fn hooks_run_in_chain_order_then_previous() {
        let fx = Fixture::new();
        let log = Log::default();
        let (a, b, c) = (
            hook(&log, "A", None),
            hook(&log, "B", None),
            hook(&log, "C", None),
        );
        let host = fx.host(&[a.clone(), b.clone()]);
        host.add_hook(&c, HookPosition::Last);
        let hwnd = host.handle().expect("window");

        fx.send(hwnd, WM_USER);

        assert_eq!(seen(&log, WM_USER), vec!["A", "B", "C"]);
        assert_eq!(
            fake::default_calls(hwnd).iter().filter(|m| **m == WM_USER).count(),
            1
        );

        // Front insertion is the default position.
        let z = hook(&log, "Z", None);
        host.add_hook(&z, HookPosition::default());
        fx.send(hwnd, WM_USER + 1);
        assert_eq!(seen(&log, WM_USER + 1), vec!["Z", "A", "B", "C"]);
        host.dispose();
    }

    #[test]
    fn handled_result_short_circuits() {
        let fx = Fixture::new();
        let log = Log::default();
        let host = fx.host(&[
            hook(&log, "A", None),
            hook(&log, "B", Some((WM_USER, 7))),
            hook(&log, "C", None),
        ]);
        let hwnd = host.handle().expect("window");

        assert_eq!(fx.send(hwnd, WM_USER), 7);
        assert_eq!(seen(&log, WM_USER), vec!["A", "B"]);
        assert!(!fake::default_calls(hwnd).contains(&WM_USER));
        host.dispose();
    }

    #[test]
    fn handled_zero_keeps_going() {
        let fx = Fixture::new();
        let log = Log::default();
        let host = fx.host(&[hook(&log, "A", Some((WM_USER, 0))), hook(&log, "B", None)]);
        let hwnd = host.handle().expect("window");

        assert_eq!(fx.send(hwnd, WM_USER), 0);
        assert_eq!(seen(&log, WM_USER), vec!["A", "B"]);
        // Still handled: the default procedure never saw it.
        assert!(!fake::default_calls(hwnd).contains(&WM_USER));
        host.dispose();
    }

    #[test]
    fn released_hooks_are_skipped() {
        let fx = Fixture::new();
        let log = Log::default();
        let keep = hook(&log, "keep", None);
        let gone = hook(&log, "gone", Some((WM_USER, 9)));
        let host = fx.host(&[gone.clone(), keep.clone()]);
        assert_eq!(host.hook_count(), 2);

        drop(gone);
        assert_eq!(host.hook_count(), 1);

        let hwnd = host.handle().expect("window");
        assert_eq!(fx.send(hwnd, WM_USER), 0);
        assert_eq!(seen(&log, WM_USER), vec!["keep"]);
        host.dispose();
    }

    #[test]
    fn remove_hook_drops_first_match_only() {
        let fx = Fixture::new();
        let log = Log::default();
        let a = hook(&log, "A", None);
        let host = fx.host(&[a.clone()]);
        host.add_hook(&a, HookPosition::Last);
        assert_eq!(host.hook_count(), 2);

        host.remove_hook(&a);
        assert_eq!(host.hook_count(), 1);
        host.remove_hook(&a);
        host.remove_hook(&a);
        assert_eq!(host.hook_count(), 0);
        host.dispose();
    }

    #[test]
    fn panicking_hook_does_not_break_the_chain() {
        let fx = Fixture::new();
        let log = Log::default();
        let bad: Arc<dyn WindowHook> = Arc::new(|message: &Message, _: &mut bool| -> isize {
            if message.msg == WM_USER {
                panic!("hook failure");
            }
            0
        });
        let host = fx.host(&[bad.clone(), hook(&log, "B", Some((WM_USER, 3)))]);
        let hwnd = host.handle().expect("window");

        assert_eq!(fx.send(hwnd, WM_USER), 3);
        assert_eq!(seen(&log, WM_USER), vec!["B"]);
        host.dispose();
    }

    #[test]
    fn memory_usage_message_is_answered_by_the_host() {
        let fx = Fixture::new();
        let host = fx.host(&[]);
        let hwnd = host.handle().expect("window");

        let usage = fx.send(hwnd, fx.interop.memory_usage_message());
        assert_eq!(usage, fake::FAKE_MEMORY_USAGE as isize);
        host.dispose();
    }

    #[test]
    fn failed_creation_rolls_back() {
        let fx = Fixture::new();
        let before = fx.interop.registry().len();
        fx.api.fail_next_create();

        let err = WindowHost::new(&fx.interop, fx.queue.clone(), &HostParameters::default(), &[]);

        assert!(err.is_err());
        assert_eq!(fx.interop.registry().len(), before);
        let (class, trampoline) = fx
            .api
            .registered_classes()
            .pop()
            .expect("class was registered");
        assert!(!fx.api.class_registered(&class));
        assert!(subclass::is_free_trampoline(trampoline));
    }

    #[test]
    fn observers_fire_once() {
        let fx = Fixture::new();
        let host = fx.host(&[]);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        host.on_disposed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        host.dispose();
        host.dispose();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Late registration runs at once.
        let counter = fired.clone();
        host.on_disposed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn external_destroy_disposes_and_defers_class_cleanup() {
        let fx = Fixture::new();
        let log = Log::default();
        let host = fx.host(&[hook(&log, "A", None)]);
        let hwnd = host.handle().expect("window");
        let class = host.class_name().expect("class");
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        host.on_disposed(move || flag.store(true, Ordering::SeqCst));

        fx.api.destroy_window(hwnd).expect("destroy");

        assert_eq!(seen(&log, WM_DESTROY), vec!["A"]);
        assert_eq!(seen(&log, WM_NCDESTROY), vec!["A"]);
        assert!(fired.load(Ordering::SeqCst));
        assert!(host.is_disposed());
        assert_eq!(host.handle(), None);
        // Unregistration waits for the owning thread's next turn.
        assert!(fx.api.class_registered(&class));
        fx.queue.pump();
        assert!(!fx.api.class_registered(&class));
    }

    #[test]
    fn cross_thread_round_trip_and_dispose() {
        let api = FakeWindows::new();
        let registry = ShutdownRegistry::new(api.clone());
        let interop = Interop::new(registry, Settings::default()).expect("interop");
        let log = Log::default();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let owner_interop = interop.clone();
        let owner_log = log.clone();
        let owner = thread::spawn(move || {
            let queue = ThreadQueue::for_current_thread();
            let echo: Arc<dyn WindowHook> =
                Arc::new(move |message: &Message, handled: &mut bool| -> isize {
                    owner_log.lock().push(("owner", message.msg));
                    if message.msg == WM_USER {
                        *handled = true;
                        return message.wparam as isize * 2;
                    }
                    0
                });
            let host = WindowHost::new(
                &owner_interop,
                queue.clone(),
                &HostParameters::default(),
                &[echo.clone()],
            )
            .expect("host");
            tx.send((queue.clone(), host)).expect("handoff");
            queue.run();
            drop(echo);
        });
        let (queue, host) = rx.recv().expect("owner ready");
        let hwnd = host.handle().expect("window");
        assert!(!host.check_access());

        let result = api
            .send_message(Message::new(hwnd, WM_USER, 21, 0))
            .expect("send");
        assert_eq!(result, 42);
        assert_eq!(seen(&log, WM_USER), vec!["owner"]);

        let class = host.class_name().expect("class");
        host.dispose();
        assert!(host.is_disposed());
        // FIFO: once this no-op has run, so has the queued destroy.
        assert!(queue.invoke(Box::new(|| {})));
        assert!(!api.is_window(hwnd));
        assert!(!api.class_registered(&class));

        queue.shutdown();
        owner.join().expect("owner thread");
    }

    #[test]
    fn dropping_the_host_finalizes_quietly() {
        let fx = Fixture::new();
        let host = fx.host(&[]);
        let hwnd = host.handle().expect("window");
        let class = host.class_name().expect("class");
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        host.on_disposed(move || flag.store(true, Ordering::SeqCst));

        drop(host);

        assert!(!fx.api.is_window(hwnd));
        assert!(!fx.api.class_registered(&class));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn creation_hooks_may_claim_with_zero() {
        let fx = Fixture::new();
        let log = Log::default();
        let host = fx.host(&[hook(&log, "A", Some((WM_CREATE, 0)))]);

        assert!(host.handle().is_some());
        assert_eq!(seen(&log, WM_CREATE), vec!["A"]);
        assert!(!host.inner.constructing.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "protocol violation")]
    fn handled_result_during_construction_is_fatal() {
        let fx = Fixture::new();
        let log = Log::default();
        // Exactly what `WindowHost::new` holds while `CreateWindowExW` runs.
        let inner = HostInner::new(
            &fx.interop,
            fx.queue.clone(),
            &[hook(&log, "A", Some((WM_CREATE, 1)))],
        );
        let hwnd = fx.api.add_window(ProcAddress::of(fake::recording_proc), 0);

        inner.dispatch(Message::new(hwnd, WM_CREATE, 0, 0));
    }

    #[test]
    #[should_panic(expected = "protocol violation")]
    fn handled_result_after_nccreate_claim_is_fatal() {
        let fx = Fixture::new();
        let log = Log::default();
        let inner = HostInner::new(
            &fx.interop,
            fx.queue.clone(),
            &[hook(&log, "A", Some((WM_NCCREATE, 1)))],
        );
        let hwnd = fx.api.add_window(ProcAddress::of(fake::recording_proc), 0);

        inner.dispatch(Message::new(hwnd, WM_NCCREATE, 0, 0));
    }
}
