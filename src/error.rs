// ── Central error type ────────────────────────────────────────────────────────
//
// All fallible operations return `error::Result<T>`.  The only OS failure that
// is ever swallowed is `ERROR_INVALID_WINDOW_HANDLE` (the window vanished under
// us); callers test for it with `SubclassError::is_window_gone`.

use thiserror::Error;

use crate::platform::{messages::ERROR_INVALID_WINDOW_HANDLE, WindowHandle};

/// Every error the subclassing layer can produce.
#[derive(Debug, Error)]
pub enum SubclassError {
    /// An OS call returned a failure code.
    #[error("{function} failed (error {code:#010x})")]
    Os {
        /// The name of the failing function, for display purposes.
        function: &'static str,
        /// The raw Win32 error code (`GetLastError()` value).
        code: u32,
    },

    /// `attach` was called on an instance that has already left `Unattached`.
    #[error("subclass is already bound to {0:?}")]
    AlreadyAttached(WindowHandle),

    /// A null window handle was passed where a live window is required.
    #[error("window handle is null")]
    NullWindow,

    /// Every trampoline slot is bound to a live subclass.
    #[error("all {0} trampoline slots are in use")]
    SlotsExhausted(usize),

    /// The settings file could not be parsed or written.
    #[error("settings: {0}")]
    Config(#[from] serde_json::Error),

    /// A standard I/O error (settings file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SubclassError {
    pub(crate) fn os(function: &'static str, code: u32) -> Self {
        Self::Os { function, code }
    }

    /// `true` when the error means "the target window no longer exists".
    ///
    /// This is the one benign race tolerated during detach and rewire.
    pub fn is_window_gone(&self) -> bool {
        matches!(
            self,
            Self::Os {
                code: ERROR_INVALID_WINDOW_HANDLE,
                ..
            }
        )
    }

    /// Attach a function name to a windows-crate error.
    #[cfg(windows)]
    pub(crate) fn from_windows(function: &'static str, e: windows::core::Error) -> Self {
        Self::Os {
            function,
            code: win32_code(e.code().0),
        }
    }
}

// Convert a windows-crate error (HRESULT) directly into a SubclassError so that
// `?` can be used on `windows::core::Result<T>` throughout the platform module.
#[cfg(windows)]
impl From<windows::core::Error> for SubclassError {
    fn from(e: windows::core::Error) -> Self {
        Self::from_windows("windows", e)
    }
}

/// Unwrap a `HRESULT_FROM_WIN32` value (0x8007xxxx) back into the Win32 code.
#[cfg(windows)]
fn win32_code(hresult: i32) -> u32 {
    // HRESULT.0 is i32; reinterpret bits as u32.
    let bits = hresult as u32;
    if bits & 0xFFFF_0000 == 0x8007_0000 {
        bits & 0xFFFF
    } else {
        bits
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SubclassError>;

// ── Tests ─────────────────────────────────────────────────────────────────────
