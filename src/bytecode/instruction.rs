//! Bytecode instruction set.

/// Opcodes for the virtual machine. Operand bytes follow the opcode inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Push a constant: CONSTANT <index:u8>
    Constant = 0,
    /// Push nil
    Nil,
    /// Push true
    True,
    /// Push false
    False,
    /// Discard the top of the stack
    Pop,

    // ============ Variables ============
    /// GET_LOCAL <slot:u8>
    GetLocal,
    /// SET_LOCAL <slot:u8>
    SetLocal,
    /// GET_GLOBAL <name:u8>
    GetGlobal,
    /// DEFINE_GLOBAL <name:u8>
    DefineGlobal,
    /// SET_GLOBAL <name:u8>
    SetGlobal,
    /// GET_UPVALUE <index:u8>
    GetUpvalue,
    /// SET_UPVALUE <index:u8>
    SetUpvalue,

    // ============ Properties ============
    /// GET_PROPERTY <name:u8>
    GetProperty,
    /// SET_PROPERTY <name:u8>
    SetProperty,
    /// Bind a superclass method to `this`: GET_SUPER <name:u8>
    GetSuper,

    // ============ Comparison ============
    Equal,
    Greater,
    Less,

    // ============ Arithmetic ============
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,

    /// Pop and print the top of the stack
    Print,

    // ============ Control Flow ============
    /// Forward jump: JUMP <offset:u16>
    Jump,
    /// Forward jump if the top is falsey, leaving it on the stack: JUMP_IF_FALSE <offset:u16>
    JumpIfFalse,
    /// Backward jump: LOOP <offset:u16>
    Loop,

    // ============ Functions & Calls ============
    /// CALL <arg_count:u8>
    Call,
    /// Fused property get + call: INVOKE <name:u8> <arg_count:u8>
    Invoke,
    /// Fused super lookup + call: SUPER_INVOKE <name:u8> <arg_count:u8>
    SuperInvoke,
    /// CLOSURE <function:u8> followed by one (is_local:u8, index:u8) pair per upvalue
    Closure,
    /// Close the upvalue for the top stack slot, then pop it
    CloseUpvalue,
    Return,

    // ============ Classes ============
    /// CLASS <name:u8>
    Class,
    /// Copy the superclass's methods into the subclass below it
    Inherit,
    /// METHOD <name:u8>
    Method,
}

impl OpCode {
    /// Number of fixed operand bytes after the opcode. `Closure` carries
    /// additional upvalue pairs that depend on the referenced function.
    pub fn operand_size(self) -> usize {
        match self {
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
            | OpCode::Inherit => 0,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::GetSuper
            | OpCode::Call
            | OpCode::Closure
            | OpCode::Class
            | OpCode::Method => 1,

            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop
            | OpCode::Invoke
            | OpCode::SuperInvoke => 2,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::Method as u8 {
            // SAFETY: OpCode is repr(u8) with contiguous discriminants from 0 to Method.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }

    /// Upper-case mnemonic used by the disassembler.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetUpvalue => "OP_GET_UPVALUE",
            OpCode::SetUpvalue => "OP_SET_UPVALUE",
            OpCode::GetProperty => "OP_GET_PROPERTY",
            OpCode::SetProperty => "OP_SET_PROPERTY",
            OpCode::GetSuper => "OP_GET_SUPER",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Print => "OP_PRINT",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Loop => "OP_LOOP",
            OpCode::Call => "OP_CALL",
            OpCode::Invoke => "OP_INVOKE",
            OpCode::SuperInvoke => "OP_SUPER_INVOKE",
            OpCode::Closure => "OP_CLOSURE",
            OpCode::CloseUpvalue => "OP_CLOSE_UPVALUE",
            OpCode::Return => "OP_RETURN",
            OpCode::Class => "OP_CLASS",
            OpCode::Inherit => "OP_INHERIT",
            OpCode::Method => "OP_METHOD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::Method as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(OpCode::Method as u8 + 1).is_none());
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::Return.operand_size(), 0);
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::Jump.operand_size(), 2);
        assert_eq!(OpCode::Invoke.operand_size(), 2);
    }
}
