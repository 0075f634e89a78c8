// ── Platform abstraction layer ────────────────────────────────────────────────
//
// This module defines the OS call surface the rest of the crate consumes.  The
// trait itself is safe; all Win32 FFI is confined to the `win32` sub-module and
// never leaks outward.  Value types here are ABI-compatible with their Win32
// counterparts (`HWND`, `WNDPROC`) so trampolines can be handed to the OS as-is.

#![allow(unsafe_code)]

use std::fmt;

use crate::error::Result;

pub mod messages;

#[cfg(windows)]
pub mod win32;

#[cfg(test)]
pub(crate) mod fake;

// ── ABI value types ───────────────────────────────────────────────────────────

/// Opaque OS window identifier.  Never owned by this type.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HWND({:#x})", self.0)
    }
}

/// Native window-procedure signature (`WNDPROC`).
pub type RawWndProc = unsafe extern "system" fn(WindowHandle, u32, usize, isize) -> isize;

/// Address of a window procedure as stored in the window's `GWLP_WNDPROC` slot.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProcAddress(pub usize);

impl ProcAddress {
    pub const NULL: Self = Self(0);

    pub fn of(proc: RawWndProc) -> Self {
        Self(proc as usize)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reinterpret the address as a callable window procedure.
    ///
    /// # Safety
    /// The address must be null or point at a function with the `WNDPROC` ABI.
    pub unsafe fn as_raw(self) -> Option<RawWndProc> {
        if self.is_null() {
            None
        } else {
            // SAFETY: non-null and, per the caller's contract, a WNDPROC.
            Some(unsafe { std::mem::transmute::<usize, RawWndProc>(self.0) })
        }
    }
}

impl fmt::Debug for ProcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WNDPROC({:#x})", self.0)
    }
}

/// One window message as delivered to a window procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    pub hwnd: WindowHandle,
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl Message {
    pub fn new(hwnd: WindowHandle, msg: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            hwnd,
            msg,
            wparam,
            lparam,
        }
    }
}

/// Window class to register: its name and the procedure every window of the
/// class starts with.
#[derive(Clone, Copy, Debug)]
pub struct WindowClass<'a> {
    pub name: &'a str,
    pub wnd_proc: ProcAddress,
}

/// Registration token of a window class.  Owned by whoever registered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassToken {
    pub atom: u16,
    pub name: String,
}

/// Arguments for `CreateWindowExW`.
#[derive(Clone, Debug, Default)]
pub struct CreateParams {
    pub class_name: String,
    pub title: String,
    pub style: u32,
    pub ex_style: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub parent: WindowHandle,
}

// ── OS call surface ───────────────────────────────────────────────────────────

/// The raw OS operations the subclassing layer needs.
///
/// Implementations are thin pass-throughs; they hold no subclassing state of
/// their own.  Errors carry the Win32 code so callers can recognise
/// `ERROR_INVALID_WINDOW_HANDLE`.
pub trait WindowApi: Send + Sync {
    fn register_class(&self, class: &WindowClass<'_>) -> Result<ClassToken>;
    fn unregister_class(&self, class: &ClassToken) -> Result<()>;

    fn create_window(&self, params: &CreateParams) -> Result<WindowHandle>;
    fn destroy_window(&self, hwnd: WindowHandle) -> Result<()>;

    fn is_window(&self, hwnd: WindowHandle) -> bool;
    fn is_window_unicode(&self, hwnd: WindowHandle) -> bool;
    fn window_style(&self, hwnd: WindowHandle) -> Result<u32>;

    /// Current `GWLP_WNDPROC` value.
    fn window_proc(&self, hwnd: WindowHandle) -> Result<ProcAddress>;
    /// Replace `GWLP_WNDPROC`, returning the previous value atomically.
    fn set_window_proc(&self, hwnd: WindowHandle, proc: ProcAddress) -> Result<ProcAddress>;
    /// `CallWindowProcW`: invoke `proc` as if the OS delivered `message`.
    fn call_window_proc(&self, proc: ProcAddress, message: Message) -> isize;

    /// Synchronous delivery; blocks until the target window handled it.
    fn send_message(&self, message: Message) -> Result<isize>;
    /// Asynchronous delivery; returns once queued.
    fn post_message(&self, message: Message) -> Result<()>;
    /// Process-stable id for a named private message.
    fn register_message(&self, name: &str) -> Result<u32>;

    /// Resolve a named export from a loaded system module.
    fn resolve_export(&self, module: &str, symbol: &str) -> Result<ProcAddress>;

    /// Working-set size of the current process, in bytes.
    fn process_memory_usage(&self) -> usize;
}

/// Stop in an attached debugger, if any.  No-op when nothing is attached.
pub(crate) fn break_into_debugger() {
    #[cfg(windows)]
    win32::break_into_debugger();
}
