//! The bytecode virtual machine: a stack-based execution engine.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::{disassemble_function, disassemble_instruction, Chunk, OpCode};
use crate::compiler::compile;
use crate::config::VmConfig;
use crate::error::{LoxError, RuntimeError, TraceLine};
use crate::value::{Class, Closure, Table, Upvalue, Value};

use super::heap::Heap;

/// Maximum call depth before "Stack overflow."
pub const FRAMES_MAX: usize = 64;

/// A call frame on the VM call stack.
pub struct CallFrame {
    /// The closure being executed.
    pub closure: Rc<Closure>,
    /// Offset of the next byte to execute in the closure's chunk.
    pub ip: usize,
    /// Stack index of slot 0 for this frame.
    pub slots: usize,
}

impl CallFrame {
    pub fn chunk(&self) -> &Chunk {
        &self.closure.function.chunk
    }
}

/// The bytecode VM.
pub struct Vm {
    /// Value stack.
    pub(super) stack: Vec<Value>,
    /// Call frame stack.
    pub(super) frames: Vec<CallFrame>,
    /// Global variables.
    pub(super) globals: Table,
    /// Upvalue cells still pointing at stack slots, sorted by slot.
    pub(super) open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
    pub(super) heap: Heap,
    pub(super) init_string: Rc<str>,
    pub(super) config: VmConfig,
    /// Destination for `print`.
    output: Box<dyn Write>,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            heap: Heap::new(),
            init_string: Rc::from("init"),
            config,
            output: Box::new(io::stdout()),
        };
        vm.define_builtin_natives();
        vm
    }

    /// Redirect `print` output.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.set_output(output);
        self
    }

    pub fn set_output(&mut self, output: impl Write + 'static) {
        self.output = Box::new(output);
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Read a global variable, mostly useful for embedding and tests.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Compile and run `source`. Globals persist across calls.
    pub fn interpret(&mut self, source: &str) -> Result<(), LoxError> {
        let function = compile(source)?;
        if self.config.print_code {
            debug!("\n{}", disassemble_function(&function));
        }

        let closure = Rc::new(Closure::new(Rc::new(function), Vec::new()));
        self.push(Value::Closure(closure.clone()));

        match self.call(closure, 0).and_then(|()| self.run()) {
            Ok(()) => {
                debug!(globals = self.globals.len(), "interpret finished");
                Ok(())
            }
            Err(err) => {
                debug!(error = %err.message, "runtime error");
                self.reset_stack();
                Err(err.into())
            }
        }
    }

    /// Run the dispatch loop until the script frame returns.
    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            self.maybe_collect_garbage();
            if self.config.trace_execution {
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let Some(op) = OpCode::from_u8(byte) else {
                return Err(self.runtime_error(format!("Unknown opcode {}.", byte)));
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }

                OpCode::GetLocal => {
                    let index = self.read_byte() as usize;
                    let slot = self.frame().slots + index;
                    let value = self.stack[slot].clone();
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let index = self.read_byte() as usize;
                    let slot = self.frame().slots + index;
                    self.stack[slot] = self.peek(0).clone();
                }
                OpCode::GetGlobal => {
                    let name = self.read_string()?;
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value);
                        }
                        None => {
                            return Err(
                                self.runtime_error(format!("Undefined variable '{}'.", name))
                            )
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string()?;
                    let value = self.peek(0).clone();
                    self.globals.set(name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string()?;
                    if !self.globals.contains_key(&name) {
                        return Err(self.runtime_error(format!("Undefined variable '{}'.", name)));
                    }
                    let value = self.peek(0).clone();
                    self.globals.set(name, value);
                }
                OpCode::GetUpvalue => {
                    let index = self.read_byte() as usize;
                    let cell = self.frame().closure.upvalues[index].clone();
                    let value = match &*cell.borrow() {
                        Upvalue::Open(slot) => self.stack[*slot].clone(),
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let index = self.read_byte() as usize;
                    let value = self.peek(0).clone();
                    let cell = self.frame().closure.upvalues[index].clone();
                    let mut cell = cell.borrow_mut();
                    match &mut *cell {
                        Upvalue::Open(slot) => self.stack[*slot] = value,
                        Upvalue::Closed(closed) => *closed = value,
                    }
                }

                OpCode::GetProperty => {
                    let name = self.read_string()?;
                    self.get_property(&name)?;
                }
                OpCode::SetProperty => {
                    let name = self.read_string()?;
                    self.set_property(name)?;
                }
                OpCode::GetSuper => {
                    let name = self.read_string()?;
                    let superclass = self.pop_class()?;
                    self.bind_method(&superclass, &name)?;
                }

                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let Value::Number(n) = *self.peek(0) else {
                        return Err(self.runtime_error("Operand must be a number."));
                    };
                    let top = self.stack.len() - 1;
                    self.stack[top] = Value::Number(-n);
                }

                OpCode::Print => {
                    let value = self.pop();
                    if let Err(err) = writeln!(self.output, "{}", value) {
                        return Err(self.runtime_error(format!("Unable to write output: {}.", err)));
                    }
                }

                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip -= offset;
                }

                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    let callee = self.peek(arg_count).clone();
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string()?;
                    let arg_count = self.read_byte() as usize;
                    self.invoke(&name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string()?;
                    let arg_count = self.read_byte() as usize;
                    let superclass = self.pop_class()?;
                    self.invoke_from_class(&superclass, &name, arg_count)?;
                }
                OpCode::Closure => self.make_closure()?,
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let Some(frame) = self.frames.pop() else {
                        return Ok(());
                    };
                    self.close_upvalues(frame.slots);

                    if self.frames.is_empty() {
                        // Discard the script closure.
                        self.stack.truncate(frame.slots);
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots);
                    self.push(result);
                }

                OpCode::Class => {
                    let name = self.read_string()?;
                    let class = Rc::new(RefCell::new(Class::new(name)));
                    self.heap.track_class(&class);
                    self.push(Value::Class(class));
                }
                OpCode::Inherit => self.inherit()?,
                OpCode::Method => {
                    let name = self.read_string()?;
                    self.define_method(name)?;
                }
            }
        }
    }

    // ===== Stack helpers =====

    pub(super) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(super) fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    pub(super) fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn reset_stack(&mut self) {
        // Closures that escaped into globals must not point at discarded slots.
        self.close_upvalues(0);
        self.stack.clear();
        self.frames.clear();
    }

    // ===== Frame and operand helpers =====

    pub(super) fn frame(&self) -> &CallFrame {
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub(super) fn read_byte(&mut self) -> u8 {
        let frame = self.frame_mut();
        let byte = frame.closure.function.chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frame_mut();
        let value = frame.closure.function.chunk.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    pub(super) fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.frame().chunk().constants[index].clone()
    }

    fn read_string(&mut self) -> Result<Rc<str>, RuntimeError> {
        match self.read_constant() {
            Value::String(name) => Ok(name),
            other => Err(self.runtime_error(format!(
                "Expected a name constant but found {}.",
                other.type_name()
            ))),
        }
    }

    // ===== Operators =====

    fn binary_number_op(&mut self, op: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let (Value::Number(a), Value::Number(b)) = (self.peek(1), self.peek(0)) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        let result = op(*a, *b);
        self.pop();
        self.pop();
        self.push(result);
        Ok(())
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let result = match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(a), Value::String(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Value::String(Rc::from(joined))
            }
            _ => {
                return Err(self.runtime_error("Operands must be two numbers or two strings."))
            }
        };
        self.pop();
        self.pop();
        self.push(result);
        Ok(())
    }

    // ===== Errors and tracing =====

    /// Build a runtime error carrying the call stack, innermost frame first.
    pub(super) fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let trace = self
            .frames
            .iter()
            .rev()
            .map(|frame| TraceLine {
                line: frame.chunk().get_line(frame.ip.saturating_sub(1)),
                function: frame.closure.function.name.as_ref().map(|n| n.to_string()),
            })
            .collect();
        RuntimeError::new(message, trace)
    }

    fn trace_instruction(&self) {
        let mut stack = String::from("          ");
        for value in &self.stack {
            let _ = write!(stack, "[ {:?} ]", value);
        }

        let frame = self.frame();
        let mut instruction = String::new();
        if disassemble_instruction(frame.chunk(), frame.ip, &mut instruction).is_ok() {
            trace!(stack = %stack, "{}", instruction.trim_end());
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
        self.globals.clear();
        let released = self.heap.break_cycles();
        debug!(objects = released, "released heap");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_persist_between_calls() {
        let mut vm = Vm::new().with_output(io::sink());
        vm.interpret("var a = 1;").expect("defines a");
        vm.interpret("a = a + 41;").expect("updates a");
        assert_eq!(vm.global("a"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_stack_is_empty_after_run() {
        let mut vm = Vm::new().with_output(io::sink());
        vm.interpret("var x = 1 + 2; { var y = x; }").expect("runs");
        assert!(vm.stack.is_empty());
        assert!(vm.frames.is_empty());
    }

    #[test]
    fn test_runtime_error_resets_state() {
        let mut vm = Vm::new().with_output(io::sink());
        let err = vm.interpret("var a = -nil;").expect_err("negate nil");
        assert_eq!(err.exit_code(), 70);
        assert!(vm.stack.is_empty());
        assert!(vm.frames.is_empty());
        assert!(vm.open_upvalues.is_empty());

        vm.interpret("var b = 2;").expect("vm is reusable");
        assert_eq!(vm.global("b"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_compile_error_does_not_run() {
        let mut vm = Vm::new().with_output(io::sink());
        let err = vm.interpret("var a = 1; print;").expect_err("compile error");
        assert_eq!(err.exit_code(), 65);
        assert_eq!(vm.global("a"), None);
    }
}
