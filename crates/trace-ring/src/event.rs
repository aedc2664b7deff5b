//! Wire-level event records written into index and detail rings.
//!
//! Shapes follow `EventRecord` (two kinds: `IndexEvent` and `DetailEvent`,
//! plus a `SIGNAL_DELIVERY` variant carried by `DetailEvent::kind`).

/// Maximum number of captured general-purpose register values in a
/// [`DetailEvent`]'s register file.
pub const MAX_REGISTERS: usize = 32;

/// Maximum number of stack bytes a single [`DetailEvent`] can carry.
pub const MAX_STACK_SNAPSHOT: usize = 512;

/// Discriminates the three event shapes that flow through a Lane's rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    Call = 0,
    Return = 1,
    Signal = 2,
}

/// Compact per-call header written to the index lane.
///
/// Kept small and `Copy` on purpose: this is the hot-path record, written on
/// every traced call/return.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct IndexEvent {
    pub timestamp: u64,
    pub function_id: u64,
    pub thread_id: u32,
    pub kind: EventKind,
    pub call_depth: u32,
}

impl IndexEvent {
    pub const fn new(
        timestamp: u64,
        function_id: u64,
        thread_id: u32,
        kind: EventKind,
        call_depth: u32,
    ) -> Self {
        Self {
            timestamp,
            function_id,
            thread_id,
            kind,
            call_depth,
        }
    }
}

/// Fixed-size general purpose register file snapshot.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct RegisterFile {
    pub values: [u64; MAX_REGISTERS],
    pub count: u8,
}

impl RegisterFile {
    pub const EMPTY: Self = Self {
        values: [0; MAX_REGISTERS],
        count: 0,
    };

    pub fn as_slice(&self) -> &[u64] {
        &self.values[..self.count as usize]
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterFile")
            .field("count", &self.count)
            .field("values", &self.as_slice())
            .finish()
    }
}

/// Extends the index header with register file, frame pointers, and an
/// optional stack snapshot. Oversized stack snapshots are rejected by the
/// writer (`write_errors` counted), never truncated silently.
#[derive(Debug, Clone)]
pub struct DetailEvent {
    pub header: IndexEvent,
    pub registers: RegisterFile,
    pub link_pointer: u64,
    pub frame_pointer: u64,
    pub stack_pointer: u64,
    pub stack_snapshot: Vec<u8>,
    pub signal: Option<SignalDelivery>,
}

impl DetailEvent {
    pub fn new(header: IndexEvent) -> Self {
        Self {
            header,
            registers: RegisterFile::EMPTY,
            link_pointer: 0,
            frame_pointer: 0,
            stack_pointer: 0,
            stack_snapshot: Vec::new(),
            signal: None,
        }
    }

    /// True when the stack snapshot exceeds [`MAX_STACK_SNAPSHOT`].
    pub fn is_oversized(&self) -> bool {
        self.stack_snapshot.len() > MAX_STACK_SNAPSHOT
    }
}

/// `SIGNAL_DELIVERY` payload: signal number, name, and a register snapshot
/// captured at the point of delivery.
#[derive(Debug, Clone)]
pub struct SignalDelivery {
    pub signal_number: i32,
    pub signal_name: String,
    pub registers: RegisterFile,
}

impl SignalDelivery {
    pub fn new(signal_number: i32, signal_name: impl Into<String>, registers: RegisterFile) -> Self {
        Self {
            signal_number,
            signal_name: signal_name.into(),
            registers,
        }
    }
}
