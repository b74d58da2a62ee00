//! Per-thread runtime data: slots, frames and the frame stack.
pub mod frame;
pub mod slot;
pub mod thread;

pub use frame::{Frame, OperandStack};
pub use slot::{LocalVars, Slot, Slots, Value};
pub use thread::{FrameStack, Thread, DEFAULT_MAX_STACK_DEPTH};
