//! Bytecode virtual machine.
//!
//! - `vm`: state, the dispatch loop, and runtime errors
//! - `vm_calls`: calling closures, natives, classes, and bound methods
//! - `vm_classes`: properties, methods, and inheritance
//! - `upvalue`: capturing and closing upvalue cells
//! - `heap`: weak registry of the objects that can form reference cycles
//! - `gc`: marks reachable objects so the heap can reclaim unreachable cycles
//! - `natives`: host function registration

pub mod heap;
pub mod vm;

mod gc;
mod natives;
mod upvalue;
mod vm_calls;
mod vm_classes;

pub use vm::{CallFrame, Vm, FRAMES_MAX};
