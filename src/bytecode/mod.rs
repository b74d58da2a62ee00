//! Raw bytecode: the opcode table and a cursor over code arrays.
pub mod opcode;
pub mod reader;

pub use opcode::OPCode;
pub use reader::BytecodeReader;
