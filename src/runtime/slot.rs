//! Slots, the unit of local variable, operand stack and field storage.
use std::fmt;
use std::rc::Rc;

use crate::heap::ObjectRef;

/// A 32-bit number or a reference. `long` and `double` values take two
/// consecutive slots, low half first.
#[derive(Clone)]
pub enum Slot {
    Num(i32),
    Ref(Option<ObjectRef>),
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Num(0)
    }
}

impl Slot {
    pub const NULL: Slot = Slot::Ref(None);

    /// Numeric view of the slot. A reference reads as zero.
    pub fn num(&self) -> i32 {
        match self {
            Slot::Num(n) => *n,
            Slot::Ref(_) => 0,
        }
    }

    /// Reference view of the slot. A number reads as `null`.
    pub fn reference(&self) -> Option<ObjectRef> {
        match self {
            Slot::Ref(r) => r.clone(),
            Slot::Num(_) => None,
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Slot::Num(a), Slot::Num(b)) => a == b,
            (Slot::Ref(None), Slot::Ref(None)) => true,
            (Slot::Ref(Some(a)), Slot::Ref(Some(b))) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Num(n) => write!(f, "Num({n})"),
            Slot::Ref(None) => write!(f, "null"),
            Slot::Ref(Some(obj)) => write!(f, "Ref({})", obj.class().name()),
        }
    }
}

pub(crate) fn split_long(v: i64) -> (i32, i32) {
    (v as i32, (v >> 32) as i32)
}

pub(crate) fn join_long(low: i32, high: i32) -> i64 {
    ((high as i64) << 32) | (low as u32 as i64)
}

/// JVM values as seen by embedders and native methods.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Reference(Option<ObjectRef>),
}

impl Value {
    /// Slots taken by the value.
    pub fn size(&self) -> usize {
        match self {
            Value::Long(_) | Value::Double(_) => 2,
            _ => 1,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Value::Reference(r) => r.clone(),
            _ => None,
        }
    }
}

/// Fixed-size, positionally indexed slot array. Used for local
/// variables, instance fields and static fields.
#[derive(Clone, Default, PartialEq)]
pub struct Slots {
    slots: Vec<Slot>,
}

/// Local variable table of a frame.
pub type LocalVars = Slots;

impl Slots {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![Slot::default(); size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get_slot(&self, index: usize) -> Slot {
        self.slots[index].clone()
    }

    pub fn set_slot(&mut self, index: usize, slot: Slot) {
        self.slots[index] = slot;
    }

    pub fn get_int(&self, index: usize) -> i32 {
        self.slots[index].num()
    }

    pub fn set_int(&mut self, index: usize, v: i32) {
        self.slots[index] = Slot::Num(v);
    }

    pub fn get_float(&self, index: usize) -> f32 {
        f32::from_bits(self.get_int(index) as u32)
    }

    pub fn set_float(&mut self, index: usize, v: f32) {
        self.set_int(index, v.to_bits() as i32);
    }

    /// Reads `index` (low half) and `index + 1` (high half).
    pub fn get_long(&self, index: usize) -> i64 {
        join_long(self.get_int(index), self.get_int(index + 1))
    }

    /// Writes `index` (low half) and `index + 1` (high half).
    pub fn set_long(&mut self, index: usize, v: i64) {
        let (low, high) = split_long(v);
        self.set_int(index, low);
        self.set_int(index + 1, high);
    }

    pub fn get_double(&self, index: usize) -> f64 {
        f64::from_bits(self.get_long(index) as u64)
    }

    pub fn set_double(&mut self, index: usize, v: f64) {
        self.set_long(index, v.to_bits() as i64);
    }

    pub fn get_ref(&self, index: usize) -> Option<ObjectRef> {
        self.slots[index].reference()
    }

    pub fn set_ref(&mut self, index: usize, r: Option<ObjectRef>) {
        self.slots[index] = Slot::Ref(r);
    }

    /// Write `value` at `index`, using two slots for category 2 values.
    pub fn set_value(&mut self, index: usize, value: &Value) {
        match value {
            Value::Int(v) => self.set_int(index, *v),
            Value::Long(v) => self.set_long(index, *v),
            Value::Float(v) => self.set_float(index, *v),
            Value::Double(v) => self.set_double(index, *v),
            Value::Reference(r) => self.set_ref(index, r.clone()),
        }
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}
