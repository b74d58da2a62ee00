//! Activation records and their operand stacks.
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::heap::{Class, Method, ObjectRef};
use crate::runtime::slot::{join_long, split_long, LocalVars, Slot, Value};

/// Fixed-capacity operand stack. The capacity comes from the method's
/// `max_stack`; a well-formed class file never pushes past it nor pops an
/// empty stack.
#[derive(Clone, Default)]
pub struct OperandStack {
    slots: Vec<Slot>,
    size: usize,
}

impl OperandStack {
    pub fn new(max_stack: usize) -> Self {
        Self {
            slots: vec![Slot::default(); max_stack],
            size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.size] {
            *slot = Slot::default();
        }
        self.size = 0;
    }

    pub fn push_slot(&mut self, slot: Slot) {
        self.slots[self.size] = slot;
        self.size += 1;
    }

    pub fn pop_slot(&mut self) -> Slot {
        self.size -= 1;
        std::mem::take(&mut self.slots[self.size])
    }

    /// Slot `n` positions below the top, `0` being the top itself.
    pub fn peek_slot(&self, n: usize) -> &Slot {
        &self.slots[self.size - 1 - n]
    }

    pub fn push_int(&mut self, v: i32) {
        self.push_slot(Slot::Num(v));
    }

    pub fn pop_int(&mut self) -> i32 {
        self.pop_slot().num()
    }

    pub fn push_float(&mut self, v: f32) {
        self.push_int(v.to_bits() as i32);
    }

    pub fn pop_float(&mut self) -> f32 {
        f32::from_bits(self.pop_int() as u32)
    }

    pub fn push_long(&mut self, v: i64) {
        let (low, high) = split_long(v);
        self.push_int(low);
        self.push_int(high);
    }

    pub fn pop_long(&mut self) -> i64 {
        let high = self.pop_int();
        let low = self.pop_int();
        join_long(low, high)
    }

    pub fn push_double(&mut self, v: f64) {
        self.push_long(v.to_bits() as i64);
    }

    pub fn pop_double(&mut self) -> f64 {
        f64::from_bits(self.pop_long() as u64)
    }

    pub fn push_ref(&mut self, r: Option<ObjectRef>) {
        self.push_slot(Slot::Ref(r));
    }

    pub fn pop_ref(&mut self) -> Option<ObjectRef> {
        self.pop_slot().reference()
    }

    /// Reference `n` slots below the top without popping it. Used to find
    /// the receiver of a virtual call under its arguments.
    pub fn top_ref(&self, n: usize) -> Option<ObjectRef> {
        self.peek_slot(n).reference()
    }

    pub fn push_value(&mut self, value: &Value) {
        match value {
            Value::Int(v) => self.push_int(*v),
            Value::Long(v) => self.push_long(*v),
            Value::Float(v) => self.push_float(*v),
            Value::Double(v) => self.push_double(*v),
            Value::Reference(r) => self.push_ref(r.clone()),
        }
    }
}

impl fmt::Debug for OperandStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.slots[..self.size].iter()).finish()
    }
}

/// Execution environment of one method invocation. A frame is created
/// each time a method is invoked and dropped once it returns.
pub struct Frame {
    pub locals: LocalVars,
    pub stack: OperandStack,
    method: Rc<Method>,
    class: Rc<Class>,
    /// Byte offset of the next instruction within the method's code.
    pub next_pc: usize,
    /// Start of the instruction being executed, `None` until the frame
    /// runs its first one. Exception handlers are matched against it.
    pub pc: Option<usize>,
}

impl Frame {
    /// Create a frame sized by the method's `max_locals` and `max_stack`.
    pub fn new(method: Rc<Method>) -> Result<Self> {
        let class = method.class()?;
        Ok(Self {
            locals: LocalVars::new(method.max_locals()),
            stack: OperandStack::new(method.max_stack()),
            method,
            class,
            next_pc: 0,
            pc: None,
        })
    }

    pub fn method(&self) -> &Rc<Method> {
        &self.method
    }

    /// Class declaring the executing method.
    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Branch relative to the instruction that started at `pc`.
    pub fn branch(&mut self, pc: usize, offset: i32) {
        self.next_pc = (pc as i64 + offset as i64) as usize;
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Frame")
            .field("method", &format_args!("{}", self.method))
            .field("pc", &self.pc)
            .field("next_pc", &self.next_pc)
            .field("locals", &self.locals)
            .field("stack", &self.stack)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_push_pop() {
        let mut stack = OperandStack::new(8);
        stack.push_int(-5);
        stack.push_long(i64::MIN + 3);
        stack.push_float(2.5);
        stack.push_double(-0.0);
        stack.push_ref(None);
        assert_eq!(stack.size(), 7);
        assert!(stack.pop_ref().is_none());
        assert_eq!(stack.pop_double().to_bits(), (-0.0f64).to_bits());
        assert_eq!(stack.pop_float(), 2.5);
        assert_eq!(stack.pop_long(), i64::MIN + 3);
        assert_eq!(stack.pop_int(), -5);
        assert!(stack.is_empty());
    }

    #[test]
    fn long_is_two_raw_slots() {
        let mut stack = OperandStack::new(2);
        stack.push_long(0x0000_0001_FFFF_FFFF);
        // high half on top
        assert_eq!(stack.peek_slot(0), &Slot::Num(1));
        assert_eq!(stack.peek_slot(1), &Slot::Num(-1));
        let high = stack.pop_slot();
        let low = stack.pop_slot();
        stack.push_slot(low);
        stack.push_slot(high);
        assert_eq!(stack.pop_long(), 0x0000_0001_FFFF_FFFF);
    }

    #[test]
    fn clear_resets_size() {
        let mut stack = OperandStack::new(3);
        stack.push_int(1);
        stack.push_int(2);
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.capacity(), 3);
        stack.push_int(3);
        assert_eq!(stack.pop_int(), 3);
    }
}
