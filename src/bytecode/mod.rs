//! Bytecode representation.
//!
//! - `instruction`: the opcode set and operand widths
//! - `chunk`: instruction bytes, line table, and constant pool
//! - `disassembler`: human-readable listings for debugging

pub mod chunk;
pub mod disassembler;
pub mod instruction;

pub use chunk::Chunk;
pub use disassembler::{disassemble_chunk, disassemble_function, disassemble_instruction};
pub use instruction::OpCode;
