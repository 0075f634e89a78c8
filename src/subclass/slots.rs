// ── Trampoline slot table ─────────────────────────────────────────────────────
//
// The OS identifies a window procedure by address only, so every live
// subclass needs an entry point of its own: comparing the window's current
// `GWLP_WNDPROC` against "ours" is how chain integrity is checked.  A fixed
// table of monomorphised `slot_proc::<N>` functions provides those addresses.
//
// A slot is leased to one `SubclassCore` from construction until teardown.
// Its token (`generation << INDEX_BITS | index`) is what native code sees in
// the detach message's wParam.  Both reserving and releasing bump the slot's
// generation, so a released token goes stale immediately and never matches
// again.
//
// A slot whose trampoline address may still be installed in some window after
// teardown (the chain above it was force-broken) is retired instead of freed.
// It is never leased again, so a late call cannot reach an unrelated owner.

#![allow(unsafe_code)]

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::{const_mutex, Mutex};

use super::SubclassCore;
use crate::{
    error::{Result, SubclassError},
    fatal,
    platform::{Message, ProcAddress, RawWndProc, WindowHandle},
};

const INDEX_BITS: u32 = 10;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

pub(crate) const SLOT_COUNT: usize = 1 << INDEX_BITS;

// The trampoline table is generated as `ROW_LEN` rows of `ROW_LEN` entries.
const ROW_LEN: usize = 32;

// ── Token ─────────────────────────────────────────────────────────────────────

/// Opaque, wParam-sized identity of one subclass instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(usize);

impl Token {
    /// Wildcard accepted by every subclass in a detach request.
    pub const ANY: Token = Token(0);

    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }

    fn index(self) -> usize {
        self.0 & INDEX_MASK
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({}#{})", self.index(), self.0 >> INDEX_BITS)
    }
}

// ── Slots ─────────────────────────────────────────────────────────────────────

enum Occupant {
    Free,
    Reserved,
    Bound(Arc<SubclassCore>),
    /// Torn down while its address may still be reachable; never reused.
    Retired,
}

struct Slot {
    occupant: Mutex<Occupant>,
    generation: AtomicUsize,
}

impl Slot {
    const fn new() -> Self {
        Self {
            occupant: const_mutex(Occupant::Free),
            generation: AtomicUsize::new(0),
        }
    }
}

static SLOTS: [Slot; SLOT_COUNT] = [const { Slot::new() }; SLOT_COUNT];

/// Round-robin cursor so a freed slot is the last to be handed out again.
static CURSOR: AtomicUsize = AtomicUsize::new(0);

/// A claim on one slot: its trampoline address and the token naming it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SlotLease {
    token: Token,
}

impl SlotLease {
    /// Claim a free slot.
    pub(crate) fn reserve() -> Result<Self> {
        let start = CURSOR.fetch_add(1, Ordering::Relaxed);
        for offset in 0..SLOT_COUNT {
            let index = (start + offset) % SLOT_COUNT;
            let slot = &SLOTS[index];
            let mut occupant = slot.occupant.lock();
            if matches!(*occupant, Occupant::Free) {
                *occupant = Occupant::Reserved;
                let generation = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
                return Ok(Self {
                    token: Token(generation << INDEX_BITS | index),
                });
            }
        }
        Err(SubclassError::SlotsExhausted(SLOT_COUNT))
    }

    pub(crate) fn token(self) -> Token {
        self.token
    }

    /// The native entry point bound to this slot.
    pub(crate) fn proc(self) -> ProcAddress {
        let index = self.token.index();
        ProcAddress::of(SLOT_PROCS[index / ROW_LEN][index % ROW_LEN])
    }

    /// Route the slot's trampoline to `core`.
    pub(crate) fn bind(self, core: Arc<SubclassCore>) {
        let mut occupant = self.slot().occupant.lock();
        if self.is_current() {
            *occupant = Occupant::Bound(core);
        }
    }

    /// Give the slot back.  Safe to call more than once; only the first call
    /// for this generation has any effect.
    pub(crate) fn release(self) {
        let previous = {
            let mut occupant = self.slot().occupant.lock();
            if !self.is_current() {
                return;
            }
            self.slot().generation.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut *occupant, Occupant::Free)
        };
        // The bound core may be the last owner of itself; drop it unlocked.
        drop(previous);
    }

    /// Like [`release`](Self::release), but the slot is never handed out again.
    pub(crate) fn retire(self) {
        let previous = {
            let mut occupant = self.slot().occupant.lock();
            if !self.is_current() {
                return;
            }
            self.slot().generation.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut *occupant, Occupant::Retired)
        };
        drop(previous);
    }

    fn slot(self) -> &'static Slot {
        &SLOTS[self.token.index()]
    }

    fn is_current(self) -> bool {
        self.slot().generation.load(Ordering::SeqCst) == self.token.0 >> INDEX_BITS
    }
}

fn occupant(index: usize) -> Option<Arc<SubclassCore>> {
    match &*SLOTS[index].occupant.lock() {
        Occupant::Bound(core) => Some(core.clone()),
        Occupant::Free | Occupant::Reserved | Occupant::Retired => None,
    }
}

/// `true` if `proc` is a trampoline whose slot is free for leasing.
#[cfg(test)]
pub(crate) fn is_free(proc: ProcAddress) -> bool {
    SLOT_PROCS
        .iter()
        .flatten()
        .position(|p| ProcAddress::of(*p) == proc)
        .is_some_and(|index| matches!(*SLOTS[index].occupant.lock(), Occupant::Free))
}

#[cfg(test)]
pub(super) fn is_retired(token: Token) -> bool {
    matches!(*SLOTS[token.index()].occupant.lock(), Occupant::Retired)
}

// ── Trampolines ───────────────────────────────────────────────────────────────

/// Native entry point for slot `N`.
///
/// Allocation-free on the lookup path; never lets a panic cross the ABI.
unsafe extern "system" fn slot_proc<const N: usize>(
    hwnd: WindowHandle,
    msg: u32,
    wparam: usize,
    lparam: isize,
) -> isize {
    route(N, Message::new(hwnd, msg, wparam, lparam))
}

fn route(index: usize, message: Message) -> isize {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match occupant(index) {
        Some(core) => core.handle_message(message),
        None => fatal::protocol_violation(format_args!(
            "message {:#06x} for {:?} reached released trampoline slot {index}",
            message.msg, message.hwnd
        )),
    }));
    outcome.unwrap_or_else(|_| std::process::abort())
}

// One row of trampolines: slots `row * ROW_LEN ..= row * ROW_LEN + 31`.
macro_rules! slot_row {
    (@ $row:literal; $($col:literal)*) => {
        [$(slot_proc::<{ $row * ROW_LEN + $col }> as RawWndProc),*]
    };
    ($row:literal) => {
        slot_row!(@ $row;
             0  1  2  3  4  5  6  7  8  9 10 11 12 13 14 15
            16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31)
    };
}

macro_rules! slot_procs {
    ($($row:literal)*) => {
        [$(slot_row!($row)),*]
    };
}

static SLOT_PROCS: [[RawWndProc; ROW_LEN]; SLOT_COUNT / ROW_LEN] = slot_procs![
     0  1  2  3  4  5  6  7  8  9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
];

// ── Tests ─────────────────────────────────────────────────────────────────────
