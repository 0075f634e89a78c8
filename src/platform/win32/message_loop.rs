// ── Message loop ──────────────────────────────────────────────────────────────
//
// Drives `GetMessageW` on an owning thread and drains its `ThreadQueue` after
// every message.  Cross-thread submissions wake a blocked `GetMessageW` with a
// `WM_NULL` thread message.

#![allow(unsafe_code)]

use std::sync::Arc;

use windows::{
    core::{w, PCWSTR},
    Win32::{
        Foundation::{HWND, LPARAM, WPARAM},
        System::Threading::GetCurrentThreadId,
        UI::WindowsAndMessaging::{
            DispatchMessageW, GetMessageW, MessageBoxW, PostQuitMessage, PostThreadMessageW,
            TranslateMessage, MB_ICONERROR, MB_OK, MSG,
        },
    },
};

use crate::{
    error::{Result, SubclassError},
    platform::messages::WM_NULL,
    queue::ThreadQueue,
};

/// A queue owned by the calling thread whose cross-thread submissions wake
/// [`run`] on this thread.
pub fn queue_for_current_thread() -> Arc<ThreadQueue> {
    // SAFETY: no preconditions.
    let thread = unsafe { GetCurrentThreadId() };
    ThreadQueue::with_waker(move || {
        // SAFETY: posting to a thread that has exited fails harmlessly.
        // Failure only delays the queue to the next message.
        let _ = unsafe { PostThreadMessageW(thread, WM_NULL, WPARAM(0), LPARAM(0)) };
    })
}

/// Pump messages until `WM_QUIT`, draining `queue` after each one.
///
/// Returns the `WM_QUIT` exit code.
pub fn run(queue: &ThreadQueue) -> Result<i32> {
    let mut msg = MSG::default();
    loop {
        // SAFETY: &mut msg is a valid MSG pointer; a null HWND retrieves
        // messages for all windows and the thread itself; 0,0 accepts all.
        let ret = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        match ret.0 {
            -1 => {
                return Err(SubclassError::from_windows(
                    "GetMessageW",
                    windows::core::Error::from_win32(),
                ))
            }
            0 => break,
            // SAFETY: msg was populated by a successful GetMessageW.  Thread
            // messages (our WM_NULL wake-ups) have no window and are ignored.
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            },
        }
        queue.pump();
    }
    // Work queued by the final messages (e.g. class cleanup) still runs.
    queue.pump();
    queue.shutdown();
    Ok(msg.wParam.0 as i32)
}

/// Ask the calling thread's loop to exit with `code`.
pub fn quit(code: i32) {
    // SAFETY: posts WM_QUIT to the calling thread's queue; always valid.
    unsafe { PostQuitMessage(code) };
}

/// Show a modal error dialog with the given message.
///
/// Safe to call from any context; performs the UTF-16 conversion internally.
pub fn show_error_dialog(message: &str) {
    let msg_wide: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();

    // SAFETY: msg_wide is a valid null-terminated UTF-16 string that remains
    // allocated for the duration of the MessageBoxW call.  A null owner means
    // the dialog has no owner window.
    unsafe {
        let _ = MessageBoxW(
            HWND::default(),
            PCWSTR(msg_wide.as_ptr()),
            w!("Window host error"),
            MB_OK | MB_ICONERROR,
        );
    }
}
