// ── Win32 constants used by the subclassing layer ─────────────────────────────
//
// Values from WinUser.h / WinError.h.  Kept here (rather than taken from the
// `windows` crate) so the platform-neutral modules and the in-memory window
// system can share them on every target.

// ── Window messages ───────────────────────────────────────────────────────────

pub const WM_NULL: u32 = 0x0000;
pub const WM_CREATE: u32 = 0x0001;
pub const WM_DESTROY: u32 = 0x0002;
pub const WM_CLOSE: u32 = 0x0010;
pub const WM_NCCREATE: u32 = 0x0081;
/// Last message a window ever receives.
pub const WM_NCDESTROY: u32 = 0x0082;
pub const WM_USER: u32 = 0x0400;

// ── Window styles ─────────────────────────────────────────────────────────────

pub const WS_OVERLAPPEDWINDOW: u32 = 0x00CF_0000;
pub const WS_VISIBLE: u32 = 0x1000_0000;
pub const WS_CHILD: u32 = 0x4000_0000;

/// `CreateWindowExW` position/size placeholder: let the OS choose.
pub const CW_USEDEFAULT: i32 = i32::MIN;

// ── Win32 error codes ─────────────────────────────────────────────────────────

pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
pub const ERROR_INVALID_PARAMETER: u32 = 87;
pub const ERROR_PROC_NOT_FOUND: u32 = 127;
pub const ERROR_INVALID_WINDOW_HANDLE: u32 = 1400;
pub const ERROR_CANNOT_FIND_WND_CLASS: u32 = 1407;
pub const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;
pub const ERROR_CLASS_DOES_NOT_EXIST: u32 = 1411;
pub const ERROR_CLASS_HAS_WINDOWS: u32 = 1412;

// ── Registered (process-private) messages ────────────────────────────────────

/// `RegisterWindowMessageW` name of the directed detach request.
///
/// `wParam` carries the target subclass token (0 = any), `lParam` a
/// [`DetachRequest`](crate::subclass::DetachRequest) code.
pub const DETACH_MESSAGE_NAME: &str = "HwndSubclass.DetachMessage";

/// `RegisterWindowMessageW` name of the host's memory-usage query.
pub const MEMORY_USAGE_MESSAGE_NAME: &str = "WindowHost.GetMemoryUsage";

// ── Neutral default handler exports ──────────────────────────────────────────

pub const USER32: &str = "user32.dll";
pub const DEF_WINDOW_PROC_W: &str = "DefWindowProcW";
pub const DEF_WINDOW_PROC_A: &str = "DefWindowProcA";
