//! Java threads: a program counter and a bounded stack of frames.
use crate::error::{exceptions, Result, VmError};
use crate::runtime::frame::Frame;
use crate::runtime::slot::Value;

/// Default maximum number of frames on a thread's stack.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1024;

/// LIFO stack of frames. The caller of a frame is the frame right below it.
#[derive(Debug)]
pub struct FrameStack {
    max_size: usize,
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= self.max_size {
            return Err(VmError::exception(
                exceptions::STACK_OVERFLOW_ERROR,
                format!("frame stack exceeded {} frames", self.max_size),
            ));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Frame> {
        self.frames.pop().ok_or_else(|| {
            VmError::exception(exceptions::STACK_UNDERFLOW_ERROR, "frame stack is empty")
        })
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Frames from the top of the stack to the bottom.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }
}

/// A thread of execution.
#[derive(Debug)]
pub struct Thread {
    /// Offset of the instruction currently executing, kept apart from the
    /// frame's `next_pc` so an instruction can ask to run again.
    pc: usize,
    stack: FrameStack,
    /// Value returned by the bottom frame, if any.
    return_value: Option<Value>,
}

impl Thread {
    pub fn new(max_stack_depth: usize) -> Self {
        Self {
            pc: 0,
            stack: FrameStack::new(max_stack_depth),
            return_value: None,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<()> {
        self.stack.push(frame)
    }

    pub fn pop_frame(&mut self) -> Result<Frame> {
        self.stack.pop()
    }

    pub fn current_frame(&mut self) -> Result<&mut Frame> {
        self.stack.top_mut().ok_or_else(|| {
            VmError::exception(exceptions::STACK_UNDERFLOW_ERROR, "no current frame")
        })
    }

    pub fn top_frame(&self) -> Option<&Frame> {
        self.stack.top()
    }

    pub fn is_stack_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn stack(&self) -> &FrameStack {
        &self.stack
    }

    /// Make the current instruction execute again once the frames pushed
    /// on top of the current one have returned.
    pub fn revert_next_pc(&mut self) -> Result<()> {
        let pc = self.pc;
        self.current_frame()?.next_pc = pc;
        Ok(())
    }

    pub fn set_return_value(&mut self, value: Option<Value>) {
        self.return_value = value;
    }

    pub fn take_return_value(&mut self) -> Option<Value> {
        self.return_value.take()
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_underflows() {
        let mut thread = Thread::default();
        assert!(thread.is_stack_empty());
        let err = thread.pop_frame().unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::STACK_UNDERFLOW_ERROR));
        assert!(thread.current_frame().is_err());
        assert_eq!(thread.stack().max_size(), DEFAULT_MAX_STACK_DEPTH);
    }
}
