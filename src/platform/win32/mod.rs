// ── Win32 platform implementation ─────────────────────────────────────────────
//
// The only place that calls into user32/kernel32.  Every `unsafe` block MUST
// carry a `// SAFETY:` comment that states:
//   • which invariant makes the operation sound, and
//   • what the caller is responsible for maintaining.
//
// Nothing in this module is `pub` beyond what callers genuinely need; keep the
// unsafe surface as small as possible.

#![allow(unsafe_code)]

// ── Sub-modules ───────────────────────────────────────────────────────────────

mod api; // `WindowApi` over the real OS
pub mod message_loop; // GetMessageW pump + owning-thread queue waker

pub use api::Win32Api;

use windows::Win32::System::Diagnostics::Debug::{DebugBreak, IsDebuggerPresent};

/// Stop in an attached debugger.  No-op when none is attached.
pub(crate) fn break_into_debugger() {
    // SAFETY: both calls have no preconditions; DebugBreak only runs when a
    // debugger is present to catch the breakpoint exception.
    unsafe {
        if IsDebuggerPresent().as_bool() {
            DebugBreak();
        }
    }
}
