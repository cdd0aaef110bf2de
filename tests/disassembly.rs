use loxvm::bytecode::{disassemble_instruction, OpCode};
use loxvm::value::{Function, Value};

/// Walk every function in a compiled program, instruction by instruction.
fn walk(function: &Function) {
    let chunk = &function.chunk;
    assert_eq!(chunk.code.len(), chunk.lines.len());

    let mut offset = 0;
    let mut visited = 0;
    let mut text = String::new();
    while offset < chunk.code.len() {
        let op = OpCode::from_u8(chunk.code[offset]);
        assert!(op.is_some(), "unknown opcode at {}", offset);
        let next = disassemble_instruction(chunk, offset, &mut text).expect("write to string");
        assert!(next > offset);
        visited += next - offset;
        offset = next;
    }
    assert_eq!(offset, chunk.code.len());
    assert_eq!(visited, chunk.code.len());

    for constant in &chunk.constants {
        if let Value::Function(nested) = constant {
            walk(nested);
        }
    }
}

#[test]
fn test_walk_covers_every_byte() {
    let source = r#"
        var greeting = "hello";
        fun outer(a, b) {
            var sum = a + b;
            fun inner() { return sum * 2; }
            return inner;
        }
        class Shape {
            init(n) { this.n = n; }
            area() { return this.n; }
        }
        class Square < Shape {
            area() { return super.area() * super.area(); }
        }
        for (var i = 0; i < 3; i = i + 1) {
            if (i == 1 and true or false) print outer(i, 1)();
        }
        while (false) {}
        print Square(2).area();
    "#;
    let function = loxvm::compile(source).expect("compiles");
    walk(&function);
}

#[test]
fn test_disassemble_lists_nested_functions() {
    let listing = loxvm::disassemble("fun f() { return 1; } print f();").expect("compiles");
    assert!(listing.starts_with("== <script> ==\n"));
    assert!(listing.contains("== f ==\n"));
    assert!(listing.contains("OP_CLOSURE"));
    assert!(listing.contains("OP_RETURN"));
}
