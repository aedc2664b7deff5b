//! Cross-process thread registry and control-block IPC.
//!
//! Builds on `trace-ring`'s lanes: this crate owns the fixed-capacity arena
//! that maps OS thread ids to per-thread lane pairs, the cross-process
//! control block that coordinates capture mode between the traced process
//! and an out-of-process drain agent, and the named shared-memory segments
//! that back both.

mod control_block;
mod shm;
mod thread_registry;

pub use control_block::ControlBlock;
pub use shm::{calculate_memory_size_with_capacity, segment_name, Segment, SegmentRole, ShmError};
pub use thread_registry::{RegistryError, ThreadLaneSet, ThreadRegistry};
