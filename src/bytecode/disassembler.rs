//! Bytecode disassembler for debug output.

use std::fmt::{self, Write};

use super::chunk::Chunk;
use super::instruction::OpCode;
use crate::value::{Function, Value};

/// Disassemble a function and, recursively, every function in its constant pool.
pub fn disassemble_function(function: &Function) -> String {
    let name = match &function.name {
        Some(name) => name.to_string(),
        None => "<script>".to_string(),
    };
    let mut out = disassemble_chunk(&function.chunk, &name);

    for constant in &function.chunk.constants {
        if let Value::Function(nested) = constant {
            out.push('\n');
            out.push_str(&disassemble_function(nested));
        }
    }
    out
}

/// Disassemble every instruction of a chunk under a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        // Writing into a String cannot fail.
        match disassemble_instruction(chunk, offset, &mut out) {
            Ok(next) => offset = next,
            Err(_) => break,
        }
    }
    out
}

/// Write one instruction and return the offset of the next one.
pub fn disassemble_instruction(
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    write!(out, "{:04} ", offset)?;
    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        write!(out, "   | ")?;
    } else {
        write!(out, "{:4} ", line)?;
    }

    let byte = chunk.code[offset];
    let Some(op) = OpCode::from_u8(byte) else {
        writeln!(out, "Unknown opcode {}", byte)?;
        return Ok(offset + 1);
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => constant_instruction(op, chunk, offset, out),

        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(op, chunk, offset, out),

        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(op, 1, chunk, offset, out),
        OpCode::Loop => jump_instruction(op, -1, chunk, offset, out),

        OpCode::Invoke | OpCode::SuperInvoke => invoke_instruction(op, chunk, offset, out),

        OpCode::Closure => closure_instruction(chunk, offset, out),

        OpCode::Nil
        | OpCode::True
        | OpCode::False
        | OpCode::Pop
        | OpCode::Equal
        | OpCode::Greater
        | OpCode::Less
        | OpCode::Add
        | OpCode::Subtract
        | OpCode::Multiply
        | OpCode::Divide
        | OpCode::Not
        | OpCode::Negate
        | OpCode::Print
        | OpCode::CloseUpvalue
        | OpCode::Return
        | OpCode::Inherit => {
            writeln!(out, "{}", op.name())?;
            Ok(offset + 1)
        }
    }
}

fn operand(chunk: &Chunk, offset: usize) -> u8 {
    chunk.code.get(offset).copied().unwrap_or(0)
}

fn constant_display(chunk: &Chunk, index: u8) -> String {
    match chunk.constants.get(index as usize) {
        Some(value) => value.to_string(),
        None => "<bad constant>".to_string(),
    }
}

fn constant_instruction(
    op: OpCode,
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    let index = operand(chunk, offset + 1);
    writeln!(
        out,
        "{:<16} {:4} '{}'",
        op.name(),
        index,
        constant_display(chunk, index)
    )?;
    Ok(offset + 2)
}

fn byte_instruction(
    op: OpCode,
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    writeln!(out, "{:<16} {:4}", op.name(), operand(chunk, offset + 1))?;
    Ok(offset + 2)
}

fn jump_instruction(
    op: OpCode,
    sign: i64,
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    let jump = u16::from_le_bytes([operand(chunk, offset + 1), operand(chunk, offset + 2)]);
    let target = offset as i64 + 3 + sign * jump as i64;
    writeln!(out, "{:<16} {:4} -> {}", op.name(), offset, target)?;
    Ok(offset + 3)
}

fn invoke_instruction(
    op: OpCode,
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    let index = operand(chunk, offset + 1);
    let arg_count = operand(chunk, offset + 2);
    writeln!(
        out,
        "{:<16} ({} args) {:4} '{}'",
        op.name(),
        arg_count,
        index,
        constant_display(chunk, index)
    )?;
    Ok(offset + 3)
}

fn closure_instruction(
    chunk: &Chunk,
    offset: usize,
    out: &mut impl Write,
) -> Result<usize, fmt::Error> {
    let index = operand(chunk, offset + 1);
    writeln!(
        out,
        "{:<16} {:4} {}",
        OpCode::Closure.name(),
        index,
        constant_display(chunk, index)
    )?;

    let upvalue_count = match chunk.constants.get(index as usize) {
        Some(Value::Function(function)) => function.upvalue_count(),
        _ => 0,
    };

    let mut next = offset + 2;
    for _ in 0..upvalue_count {
        let is_local = operand(chunk, next);
        let slot = operand(chunk, next + 1);
        writeln!(
            out,
            "{:04}    |                     {} {}",
            next,
            if is_local == 1 { "local" } else { "upvalue" },
            slot
        )?;
        next += 2;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_chunk() {
        let mut chunk = Chunk::new();
        let index = chunk.add_constant(Value::Number(1.5)).expect("room");
        chunk.write_op(OpCode::Constant, 123);
        chunk.write_byte(index, 123);
        chunk.write_op(OpCode::Negate, 123);
        chunk.write_op(OpCode::Return, 124);

        let text = disassemble_chunk(&chunk, "test");
        let expected = "== test ==\n\
                        0000  123 OP_CONSTANT         0 '1.5'\n\
                        0002    | OP_NEGATE\n\
                        0003  124 OP_RETURN\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_jump_targets() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write_u16(2, 1);
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Loop, 2);
        chunk.write_u16(8, 2);

        let text = disassemble_chunk(&chunk, "jumps");
        assert!(text.contains("OP_JUMP             0 -> 5"));
        assert!(text.contains("OP_LOOP             5 -> 0"));
    }

    #[test]
    fn test_unknown_opcode_advances_one_byte() {
        let mut chunk = Chunk::new();
        chunk.write_byte(250, 1);
        chunk.write_op(OpCode::Return, 1);

        let mut out = String::new();
        let next = disassemble_instruction(&chunk, 0, &mut out).expect("string write");
        assert_eq!(next, 1);
        assert!(out.contains("Unknown opcode 250"));
    }
}
