// ── In-memory window system ───────────────────────────────────────────────────
//
// Test double for `WindowApi`.  Windows are table rows; "sending" a message
// looks up the row's current procedure and calls it through its real function
// pointer, so trampolines are exercised exactly as the OS would call them.
// The table lock is never held while a procedure runs.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicIsize, AtomicU16, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::{const_mutex, Mutex};

use super::{
    messages::{
        ERROR_CLASS_ALREADY_EXISTS, ERROR_CLASS_DOES_NOT_EXIST, ERROR_CLASS_HAS_WINDOWS,
        ERROR_INVALID_WINDOW_HANDLE, ERROR_NOT_ENOUGH_MEMORY, ERROR_PROC_NOT_FOUND,
        ERROR_CANNOT_FIND_WND_CLASS, DEF_WINDOW_PROC_A, DEF_WINDOW_PROC_W, USER32, WM_CREATE,
        WM_DESTROY, WM_NCCREATE, WM_NCDESTROY,
    },
    ClassToken, CreateParams, Message, ProcAddress, WindowApi, WindowClass, WindowHandle,
};
use crate::error::{Result, SubclassError};

/// What `recording_proc` answers for everything but `WM_NCCREATE`.
pub(crate) const RECORDING_RESULT: isize = 0x2a;

/// Working-set figure the fake reports.
pub(crate) const FAKE_MEMORY_USAGE: usize = 48 * 1024 * 1024;

// Handles are process-unique so the per-window call logs below never collide
// between tests running in parallel.
static NEXT_HWND: AtomicIsize = AtomicIsize::new(0x1000);

static DEFAULT_CALLS: Mutex<Vec<(WindowHandle, u32)>> = const_mutex(Vec::new());
static RECORDED_CALLS: Mutex<Vec<(WindowHandle, u32)>> = const_mutex(Vec::new());

fn calls_for(log: &Mutex<Vec<(WindowHandle, u32)>>, hwnd: WindowHandle) -> Vec<u32> {
    log.lock()
        .iter()
        .filter(|(h, _)| *h == hwnd)
        .map(|(_, msg)| *msg)
        .collect()
}

fn creation_reply(msg: u32) -> Option<isize> {
    (msg == WM_NCCREATE).then_some(1)
}

/// Stand-in for `DefWindowProcW`.
pub(crate) unsafe extern "system" fn default_proc_w(
    hwnd: WindowHandle,
    msg: u32,
    _wparam: usize,
    _lparam: isize,
) -> isize {
    DEFAULT_CALLS.lock().push((hwnd, msg));
    creation_reply(msg).unwrap_or(0)
}

/// Stand-in for `DefWindowProcA`.
pub(crate) unsafe extern "system" fn default_proc_a(
    hwnd: WindowHandle,
    msg: u32,
    _wparam: usize,
    _lparam: isize,
) -> isize {
    DEFAULT_CALLS.lock().push((hwnd, msg));
    creation_reply(msg).unwrap_or(0)
}

/// A window's "own" procedure: logs and answers [`RECORDING_RESULT`].
pub(crate) unsafe extern "system" fn recording_proc(
    hwnd: WindowHandle,
    msg: u32,
    _wparam: usize,
    _lparam: isize,
) -> isize {
    RECORDED_CALLS.lock().push((hwnd, msg));
    creation_reply(msg).unwrap_or(RECORDING_RESULT)
}

/// Messages `default_proc_w`/`default_proc_a` received for `hwnd`.
pub(crate) fn default_calls(hwnd: WindowHandle) -> Vec<u32> {
    calls_for(&DEFAULT_CALLS, hwnd)
}

/// Messages `recording_proc` received for `hwnd`.
pub(crate) fn recorded_calls(hwnd: WindowHandle) -> Vec<u32> {
    calls_for(&RECORDED_CALLS, hwnd)
}

// ── Table ─────────────────────────────────────────────────────────────────────

struct FakeWindow {
    proc: ProcAddress,
    style: u32,
    unicode: bool,
    class: Option<String>,
    posted: Vec<u32>,
}

#[derive(Default)]
struct Table {
    windows: HashMap<WindowHandle, FakeWindow>,
    classes: HashMap<String, (u16, ProcAddress)>,
    messages: HashMap<String, u32>,
}

type Reentry = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct FakeWindows {
    table: Mutex<Table>,
    next_atom: AtomicU16,
    export_lookups: AtomicUsize,
    fail_next_create: Mutex<bool>,
    fail_next_set_proc: Mutex<Option<u32>>,
    before_next_set_proc: Mutex<Option<Reentry>>,
    registered_classes: Mutex<Vec<(String, ProcAddress)>>,
}

impl FakeWindows {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_atom: AtomicU16::new(0xC000),
            ..Self::default()
        })
    }

    /// A Unicode window running `proc`, created without any messages.
    pub(crate) fn add_window(&self, proc: ProcAddress, style: u32) -> WindowHandle {
        self.insert(proc, style, true, None)
    }

    /// Like [`add_window`](Self::add_window) for an ANSI window.
    pub(crate) fn add_narrow_window(&self, proc: ProcAddress, style: u32) -> WindowHandle {
        self.insert(proc, style, false, None)
    }

    /// Drop `hwnd` from the table without telling anyone.
    pub(crate) fn vanish(&self, hwnd: WindowHandle) {
        self.table.lock().windows.remove(&hwnd);
    }

    /// Messages posted to `hwnd` so far.
    pub(crate) fn posted(&self, hwnd: WindowHandle) -> Vec<u32> {
        self.table
            .lock()
            .windows
            .get(&hwnd)
            .map(|w| w.posted.clone())
            .unwrap_or_default()
    }

    pub(crate) fn export_lookups(&self) -> usize {
        self.export_lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn class_registered(&self, name: &str) -> bool {
        self.table.lock().classes.contains_key(name)
    }

    /// Make the next `create_window` fail the way a rejected `WM_NCCREATE`
    /// does: the window is torn down before the call returns.
    pub(crate) fn fail_next_create(&self) {
        *self.fail_next_create.lock() = true;
    }

    /// Make the next `set_window_proc` fail with `code`, changing nothing.
    pub(crate) fn fail_next_set_proc(&self, code: u32) {
        *self.fail_next_set_proc.lock() = Some(code);
    }

    /// Run `f` inside the next `set_window_proc`, before the procedure is
    /// swapped, as a message arriving mid-call would.
    pub(crate) fn before_next_set_proc(&self, f: impl FnOnce() + Send + 'static) {
        *self.before_next_set_proc.lock() = Some(Box::new(f));
    }

    /// Name and procedure of every class ever registered, in order.
    pub(crate) fn registered_classes(&self) -> Vec<(String, ProcAddress)> {
        self.registered_classes.lock().clone()
    }

    fn insert(
        &self,
        proc: ProcAddress,
        style: u32,
        unicode: bool,
        class: Option<String>,
    ) -> WindowHandle {
        let hwnd = WindowHandle(NEXT_HWND.fetch_add(1, Ordering::Relaxed));
        self.table.lock().windows.insert(
            hwnd,
            FakeWindow {
                proc,
                style,
                unicode,
                class,
                posted: Vec::new(),
            },
        );
        hwnd
    }

    fn gone(function: &'static str) -> SubclassError {
        SubclassError::os(function, ERROR_INVALID_WINDOW_HANDLE)
    }

    fn deliver(&self, hwnd: WindowHandle, msg: u32) -> Result<isize> {
        self.send_message(Message::new(hwnd, msg, 0, 0))
    }
}

impl WindowApi for FakeWindows {
    fn register_class(&self, class: &WindowClass<'_>) -> Result<ClassToken> {
        let mut table = self.table.lock();
        if table.classes.contains_key(class.name) {
            return Err(SubclassError::os("RegisterClassExW", ERROR_CLASS_ALREADY_EXISTS));
        }
        let atom = self.next_atom.fetch_add(1, Ordering::Relaxed);
        table
            .classes
            .insert(class.name.to_owned(), (atom, class.wnd_proc));
        self.registered_classes
            .lock()
            .push((class.name.to_owned(), class.wnd_proc));
        Ok(ClassToken {
            atom,
            name: class.name.to_owned(),
        })
    }

    fn unregister_class(&self, class: &ClassToken) -> Result<()> {
        let mut table = self.table.lock();
        if !table.classes.contains_key(&class.name) {
            return Err(SubclassError::os("UnregisterClassW", ERROR_CLASS_DOES_NOT_EXIST));
        }
        let in_use = table
            .windows
            .values()
            .any(|w| w.class.as_deref() == Some(class.name.as_str()));
        if in_use {
            return Err(SubclassError::os("UnregisterClassW", ERROR_CLASS_HAS_WINDOWS));
        }
        table.classes.remove(&class.name);
        Ok(())
    }

    fn create_window(&self, params: &CreateParams) -> Result<WindowHandle> {
        let proc = match self.table.lock().classes.get(&params.class_name) {
            Some((_, proc)) => *proc,
            None => return Err(SubclassError::os("CreateWindowExW", ERROR_CANNOT_FIND_WND_CLASS)),
        };
        let hwnd = self.insert(proc, params.style, true, Some(params.class_name.clone()));

        let fail = std::mem::take(&mut *self.fail_next_create.lock());
        let accepted = self.deliver(hwnd, WM_NCCREATE)? != 0;
        if fail || !accepted {
            self.deliver(hwnd, WM_NCDESTROY)?;
            self.table.lock().windows.remove(&hwnd);
            return Err(SubclassError::os("CreateWindowExW", ERROR_NOT_ENOUGH_MEMORY));
        }
        self.deliver(hwnd, WM_CREATE)?;
        Ok(hwnd)
    }

    fn destroy_window(&self, hwnd: WindowHandle) -> Result<()> {
        if !self.is_window(hwnd) {
            return Err(Self::gone("DestroyWindow"));
        }
        self.deliver(hwnd, WM_DESTROY)?;
        self.deliver(hwnd, WM_NCDESTROY)?;
        self.table.lock().windows.remove(&hwnd);
        Ok(())
    }

    fn is_window(&self, hwnd: WindowHandle) -> bool {
        self.table.lock().windows.contains_key(&hwnd)
    }

    fn is_window_unicode(&self, hwnd: WindowHandle) -> bool {
        self.table
            .lock()
            .windows
            .get(&hwnd)
            .map_or(true, |w| w.unicode)
    }

    fn window_style(&self, hwnd: WindowHandle) -> Result<u32> {
        self.table
            .lock()
            .windows
            .get(&hwnd)
            .map(|w| w.style)
            .ok_or_else(|| Self::gone("GetWindowLongPtrW"))
    }

    fn window_proc(&self, hwnd: WindowHandle) -> Result<ProcAddress> {
        self.table
            .lock()
            .windows
            .get(&hwnd)
            .map(|w| w.proc)
            .ok_or_else(|| Self::gone("GetWindowLongPtrW"))
    }

    fn set_window_proc(&self, hwnd: WindowHandle, proc: ProcAddress) -> Result<ProcAddress> {
        let reentry = self.before_next_set_proc.lock().take();
        if let Some(reentry) = reentry {
            reentry();
        }
        if let Some(code) = self.fail_next_set_proc.lock().take() {
            return Err(SubclassError::os("SetWindowLongPtrW", code));
        }
        let mut table = self.table.lock();
        let window = table
            .windows
            .get_mut(&hwnd)
            .ok_or_else(|| Self::gone("SetWindowLongPtrW"))?;
        Ok(std::mem::replace(&mut window.proc, proc))
    }

    fn call_window_proc(&self, proc: ProcAddress, message: Message) -> isize {
        // SAFETY: every address stored in the table came from `ProcAddress::of`
        // on a real `extern "system"` window procedure.
        unsafe {
            match proc.as_raw() {
                Some(proc) => proc(message.hwnd, message.msg, message.wparam, message.lparam),
                None => 0,
            }
        }
    }

    fn send_message(&self, message: Message) -> Result<isize> {
        let proc = self.window_proc(message.hwnd)?;
        Ok(self.call_window_proc(proc, message))
    }

    fn post_message(&self, message: Message) -> Result<()> {
        let mut table = self.table.lock();
        let window = table
            .windows
            .get_mut(&message.hwnd)
            .ok_or_else(|| Self::gone("PostMessageW"))?;
        window.posted.push(message.msg);
        Ok(())
    }

    fn register_message(&self, name: &str) -> Result<u32> {
        let mut table = self.table.lock();
        let next = 0xC000 + table.messages.len() as u32;
        Ok(*table.messages.entry(name.to_owned()).or_insert(next))
    }

    fn resolve_export(&self, module: &str, symbol: &str) -> Result<ProcAddress> {
        self.export_lookups.fetch_add(1, Ordering::SeqCst);
        match (module, symbol) {
            (USER32, DEF_WINDOW_PROC_W) => Ok(ProcAddress::of(default_proc_w)),
            (USER32, DEF_WINDOW_PROC_A) => Ok(ProcAddress::of(default_proc_a)),
            _ => Err(SubclassError::os("GetProcAddress", ERROR_PROC_NOT_FOUND)),
        }
    }

    fn process_memory_usage(&self) -> usize {
        FAKE_MEMORY_USAGE
    }
}
