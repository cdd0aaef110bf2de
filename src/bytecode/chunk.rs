//! Bytecode chunk: instructions, line table, and constant pool.

use crate::bytecode::instruction::OpCode;
use crate::error::ChunkError;
use crate::value::Value;

/// Constant pool indices are a single operand byte.
pub const MAX_CONSTANTS: usize = 256;

/// A chunk of bytecode with a source line recorded for every byte.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The bytecode instructions.
    pub code: Vec<u8>,
    /// Line information, parallel to `code`.
    pub lines: Vec<usize>,
    /// The constant pool.
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write_byte(op as u8, line);
    }

    /// Write a raw byte to the chunk.
    pub fn write_byte(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit value to the chunk (little-endian).
    pub fn write_u16(&mut self, value: u16, line: usize) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(lo, line);
        self.write_byte(hi, line);
    }

    /// Read a 16-bit value from the chunk at offset.
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.code[offset], self.code[offset + 1]])
    }

    /// Patch a u16 value at the given offset.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.code[offset] = lo;
        self.code[offset + 1] = hi;
    }

    /// Append a constant and return its index.
    pub fn add_constant(&mut self, value: Value) -> Result<u8, ChunkError> {
        let index = self.constants.len();
        if index >= MAX_CONSTANTS {
            return Err(ChunkError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(index as u8)
    }

    /// Get the current offset in the code.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Get the line number at a given offset.
    pub fn get_line(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }
}
