// ── WindowApi over user32 ─────────────────────────────────────────────────────
//
// Thin pass-throughs.  Every function that can fail reports the Win32 code;
// `SendMessageW` cannot, so a dead target is detected with `IsWindow` first.

#![allow(unsafe_code)]

use std::{ffi::CString, mem::size_of};

use windows::{
    core::{HSTRING, PCSTR, PCWSTR},
    Win32::{
        Foundation::{GetLastError, SetLastError, HINSTANCE, HWND, LPARAM, WIN32_ERROR, WPARAM},
        System::{
            LibraryLoader::{GetModuleHandleW, GetProcAddress},
            ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS},
            Threading::GetCurrentProcess,
        },
        UI::WindowsAndMessaging::{
            CallWindowProcW, CreateWindowExW, DestroyWindow, GetWindowLongW, IsWindow,
            IsWindowUnicode, PostMessageW, RegisterClassExW, RegisterWindowMessageW,
            SendMessageW, UnregisterClassW, GWLP_WNDPROC, GWL_STYLE, HMENU, WINDOW_EX_STYLE,
            WINDOW_STYLE, WNDCLASSEXW, WNDPROC,
        },
    },
};

use crate::{
    error::{Result, SubclassError},
    platform::{
        messages::{ERROR_INVALID_PARAMETER, ERROR_INVALID_WINDOW_HANDLE},
        ClassToken, CreateParams, Message, ProcAddress, WindowApi, WindowClass, WindowHandle,
    },
};

/// The real window system.
pub struct Win32Api {
    /// `HINSTANCE` of the running module, kept as an integer so the API object
    /// is `Send + Sync`.
    instance: isize,
}

impl Win32Api {
    pub fn new() -> Result<Self> {
        // SAFETY: a null module name returns the .exe's own HMODULE, which is
        // valid for the process lifetime.
        let module = unsafe { GetModuleHandleW(None) }
            .map_err(|e| SubclassError::from_windows("GetModuleHandleW", e))?;
        Ok(Self {
            instance: module.0 as isize,
        })
    }

    fn instance(&self) -> HINSTANCE {
        HINSTANCE(self.instance as *mut _)
    }
}

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut _)
}

fn to_wndproc(proc: ProcAddress) -> WNDPROC {
    // SAFETY: `WNDPROC` is `Option<extern "system" fn>`, pointer-sized with
    // null as `None`; every non-null `ProcAddress` names a window procedure.
    unsafe { std::mem::transmute::<usize, WNDPROC>(proc.0) }
}

/// Capture the calling thread's last-error code.
///
/// Call immediately after the failing function; any later API call may
/// overwrite it.
fn last_error(function: &'static str) -> SubclassError {
    // SAFETY: reads thread-local state; always safe.
    let code = unsafe { GetLastError() };
    SubclassError::os(function, code.0)
}

fn gone(function: &'static str) -> SubclassError {
    SubclassError::os(function, ERROR_INVALID_WINDOW_HANDLE)
}

#[cfg(target_pointer_width = "64")]
mod long_ptr {
    pub(super) use windows::Win32::UI::WindowsAndMessaging::{
        GetWindowLongPtrW as get, SetWindowLongPtrW as set,
    };
}

#[cfg(target_pointer_width = "32")]
mod long_ptr {
    use windows::Win32::{
        Foundation::HWND,
        UI::WindowsAndMessaging::{GetWindowLongW, SetWindowLongW, WINDOW_LONG_PTR_INDEX},
    };

    pub(super) unsafe fn get(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
        // SAFETY: forwarded caller contract.
        unsafe { GetWindowLongW(hwnd, index) as isize }
    }

    pub(super) unsafe fn set(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX, value: isize) -> isize {
        // SAFETY: forwarded caller contract.
        unsafe { SetWindowLongW(hwnd, index, value as i32) as isize }
    }
}

impl WindowApi for Win32Api {
    fn register_class(&self, class: &WindowClass<'_>) -> Result<ClassToken> {
        let name = HSTRING::from(class.name);
        let wndclass = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: to_wndproc(class.wnd_proc),
            hInstance: self.instance(),
            lpszClassName: PCWSTR(name.as_ptr()),
            ..Default::default()
        };
        // SAFETY: `wndclass` is fully initialised; `name` outlives the call and
        // the OS copies the class name.
        let atom = unsafe { RegisterClassExW(&wndclass) };
        if atom == 0 {
            return Err(last_error("RegisterClassExW"));
        }
        Ok(ClassToken {
            atom,
            name: class.name.to_owned(),
        })
    }

    fn unregister_class(&self, class: &ClassToken) -> Result<()> {
        let name = HSTRING::from(class.name.as_str());
        // SAFETY: `name` is a valid null-terminated string for the call.
        unsafe { UnregisterClassW(&name, self.instance()) }
            .map_err(|e| SubclassError::from_windows("UnregisterClassW", e))
    }

    fn create_window(&self, params: &CreateParams) -> Result<WindowHandle> {
        let class = HSTRING::from(params.class_name.as_str());
        let title = HSTRING::from(params.title.as_str());
        // SAFETY: both strings outlive the call; a null parent creates a
        // top-level window; no creation data is passed.
        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(params.ex_style),
                &class,
                &title,
                WINDOW_STYLE(params.style),
                params.x,
                params.y,
                params.width,
                params.height,
                hwnd(params.parent),
                HMENU::default(),
                self.instance(),
                None,
            )
        };
        created
            .map(|h| WindowHandle(h.0 as isize))
            .map_err(|e| SubclassError::from_windows("CreateWindowExW", e))
    }

    fn destroy_window(&self, handle: WindowHandle) -> Result<()> {
        // SAFETY: DestroyWindow validates the handle and fails cleanly on a
        // stale one.
        unsafe { DestroyWindow(hwnd(handle)) }
            .map_err(|e| SubclassError::from_windows("DestroyWindow", e))
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        // SAFETY: IsWindow accepts any value.
        unsafe { IsWindow(hwnd(handle)) }.as_bool()
    }

    fn is_window_unicode(&self, handle: WindowHandle) -> bool {
        // SAFETY: IsWindowUnicode accepts any value.
        unsafe { IsWindowUnicode(hwnd(handle)) }.as_bool()
    }

    fn window_style(&self, handle: WindowHandle) -> Result<u32> {
        // SAFETY: zero is a valid style, so clear the error first to tell
        // "no bits" from failure.
        unsafe {
            SetLastError(WIN32_ERROR(0));
            let style = GetWindowLongW(hwnd(handle), GWL_STYLE);
            if style == 0 && GetLastError().0 != 0 {
                return Err(last_error("GetWindowLongW"));
            }
            Ok(style as u32)
        }
    }

    fn window_proc(&self, handle: WindowHandle) -> Result<ProcAddress> {
        // SAFETY: reading GWLP_WNDPROC has no side effects; see `window_style`
        // for the last-error dance.
        unsafe {
            SetLastError(WIN32_ERROR(0));
            let proc = long_ptr::get(hwnd(handle), GWLP_WNDPROC);
            if proc == 0 && GetLastError().0 != 0 {
                return Err(last_error("GetWindowLongPtrW"));
            }
            Ok(ProcAddress(proc as usize))
        }
    }

    fn set_window_proc(&self, handle: WindowHandle, proc: ProcAddress) -> Result<ProcAddress> {
        // SAFETY: `proc` is a window procedure that stays callable for as long
        // as it is installed (trampolines are statics; the neutral handler is
        // a user32 export).
        unsafe {
            SetLastError(WIN32_ERROR(0));
            let previous = long_ptr::set(hwnd(handle), GWLP_WNDPROC, proc.0 as isize);
            if previous == 0 && GetLastError().0 != 0 {
                return Err(last_error("SetWindowLongPtrW"));
            }
            Ok(ProcAddress(previous as usize))
        }
    }

    fn call_window_proc(&self, proc: ProcAddress, message: Message) -> isize {
        // SAFETY: `proc` was read from GWLP_WNDPROC or resolved from user32;
        // CallWindowProcW also accepts the handle values GWLP_WNDPROC returns
        // for cross-character-set procedures.
        unsafe {
            CallWindowProcW(
                to_wndproc(proc),
                hwnd(message.hwnd),
                message.msg,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            )
        }
        .0
    }

    fn send_message(&self, message: Message) -> Result<isize> {
        if !self.is_window(message.hwnd) {
            return Err(gone("SendMessageW"));
        }
        // SAFETY: blocks until the owning thread handled the message; the
        // parameters are plain integers.
        let result = unsafe {
            SendMessageW(
                hwnd(message.hwnd),
                message.msg,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            )
        };
        Ok(result.0)
    }

    fn post_message(&self, message: Message) -> Result<()> {
        // SAFETY: parameters are plain integers; PostMessageW validates the
        // handle.
        unsafe {
            PostMessageW(
                hwnd(message.hwnd),
                message.msg,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            )
        }
        .map_err(|e| SubclassError::from_windows("PostMessageW", e))
    }

    fn register_message(&self, name: &str) -> Result<u32> {
        let name = HSTRING::from(name);
        // SAFETY: `name` is a valid null-terminated string for the call.
        let id = unsafe { RegisterWindowMessageW(&name) };
        if id == 0 {
            return Err(last_error("RegisterWindowMessageW"));
        }
        Ok(id)
    }

    fn resolve_export(&self, module: &str, symbol: &str) -> Result<ProcAddress> {
        let module = HSTRING::from(module);
        let symbol = CString::new(symbol)
            .map_err(|_| SubclassError::os("GetProcAddress", ERROR_INVALID_PARAMETER))?;
        // SAFETY: user32 stays loaded for the life of any process that has
        // windows; both names are valid null-terminated strings.
        unsafe {
            let handle = GetModuleHandleW(&module)
                .map_err(|e| SubclassError::from_windows("GetModuleHandleW", e))?;
            match GetProcAddress(handle, PCSTR(symbol.as_ptr().cast())) {
                Some(proc) => Ok(ProcAddress(proc as usize)),
                None => Err(last_error("GetProcAddress")),
            }
        }
    }

    fn process_memory_usage(&self) -> usize {
        let mut counters = PROCESS_MEMORY_COUNTERS {
            cb: size_of::<PROCESS_MEMORY_COUNTERS>() as u32,
            ..Default::default()
        };
        // SAFETY: `counters` is writable and its size is passed in `cb`; the
        // pseudo-handle from GetCurrentProcess needs no closing.
        let queried = unsafe {
            GetProcessMemoryInfo(GetCurrentProcess(), &mut counters, counters.cb)
        };
        match queried {
            Ok(()) => counters.WorkingSetSize,
            Err(e) => {
                log::debug!("GetProcessMemoryInfo failed: {e}");
                0
            }
        }
    }
}
