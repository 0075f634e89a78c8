// ── Protocol violations ───────────────────────────────────────────────────────
//
// A protocol violation means the subclass state machine's core invariant is
// already broken (a message reached a torn-down instance, or a hook produced a
// handled result before its window existed).  Continuing could corrupt the
// OS-level handler chain, so these never return.  Trampolines turn the panic
// into `process::abort` because it must not unwind into the OS.

use std::fmt;

use crate::platform;

/// Log, stop in an attached debugger (debug builds), then fail hard.
#[cold]
#[track_caller]
pub(crate) fn protocol_violation(what: fmt::Arguments<'_>) -> ! {
    log::error!("protocol violation: {what}");
    if cfg!(debug_assertions) {
        platform::break_into_debugger();
    }
    panic!("protocol violation: {what}");
}

/// A handled, non-zero result may not surface while the window that owns it
/// is still being created.
#[track_caller]
pub(crate) fn check_creation_result(creating: bool, handled: bool, result: isize) {
    if creating && handled && result != 0 {
        protocol_violation(format_args!(
            "hook returned {result:#x} as handled before window creation completed"
        ));
    }
}
