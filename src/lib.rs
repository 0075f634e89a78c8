//! Race-free subclassing of Win32 window procedures.
//!
//! * [`subclass`]: one interception of one window's `GWLP_WNDPROC`, with an
//!   attach/detach state machine that never breaks a chain someone else built
//!   on top of it.
//! * [`host`]: an owned window of a private class whose messages are
//!   multiplexed over weakly held hooks.
//! * [`registry`]: the process-wide directory that rewires every surviving
//!   window to the OS default procedure at shutdown.
//!
//! Hook dispatch always runs on the window's owning thread through a
//! [`queue::OwnerQueue`]; cross-thread sends block until it has.

// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except:
//   • `platform`          – ABI value types, Win32 FFI, the in-memory fake
//   • `subclass::slots`   – the `extern "system"` trampoline table
// Each unsafe block in those modules MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod host;
pub mod interop;
pub mod platform;
pub mod queue;
pub mod registry;
pub mod subclass;

mod fatal;

pub use error::{Result, SubclassError};
pub use host::{HookPosition, HostParameters, WindowHook, WindowHost};
pub use interop::Interop;
pub use platform::{Message, WindowHandle};
pub use queue::{OwnerQueue, ThreadQueue};
pub use registry::{ShutdownGuard, ShutdownRegistry};
pub use subclass::{Bond, DetachRequest, HookOutcome, MessageSink, SubclassHandle, Token};
