//! Heap object variants: functions, closures, upvalue cells, classes, instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::Chunk;

use super::table::Table;
use super::Value;

/// A compiled function (or the top-level script, which has no name).
pub struct Function {
    pub name: Option<Rc<str>>,
    pub arity: usize,
    pub chunk: Chunk,
    /// One descriptor per variable the function's closures capture.
    pub upvalues: Vec<UpvalueDescriptor>,
}

impl Function {
    pub fn new(name: Option<Rc<str>>) -> Self {
        Self {
            name,
            arity: 0,
            chunk: Chunk::new(),
            upvalues: Vec::new(),
        }
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalues.len()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<script>"),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("code_len", &self.chunk.code.len())
            .field("upvalues", &self.upvalues.len())
            .finish()
    }
}

/// Where a closure finds one of its captured variables when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDescriptor {
    /// True: a local slot of the immediately enclosing function.
    /// False: an upvalue of the enclosing closure.
    pub is_local: bool,
    pub index: u8,
}

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String>;

/// A host function callable from scripts.
pub struct NativeFunction {
    pub name: Rc<str>,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    pub function: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        arity: Option<usize>,
        function: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            function: Box::new(function),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// An upvalue cell.
///
/// While the captured variable is still on the stack the cell is open and
/// names its slot. When the variable's scope exits the value moves into the
/// cell and every closure sharing it sees the same storage.
#[derive(Debug, Clone)]
pub enum Upvalue {
    Open(usize),
    Closed(Value),
}

impl Upvalue {
    pub fn open_slot(&self) -> Option<usize> {
        match self {
            Upvalue::Open(slot) => Some(*slot),
            Upvalue::Closed(_) => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Upvalue::Open(_))
    }

    pub fn close(&mut self, value: Value) {
        *self = Upvalue::Closed(value);
    }
}

/// A function paired with the upvalue cells it captured.
pub struct Closure {
    pub function: Rc<Function>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl Closure {
    pub fn new(function: Rc<Function>, upvalues: Vec<Rc<RefCell<Upvalue>>>) -> Self {
        Self { function, upvalues }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function)
    }
}

pub struct Class {
    pub name: Rc<str>,
    pub methods: Table<Rc<Closure>>,
}

impl Class {
    pub fn new(name: Rc<str>) -> Self {
        Self {
            name,
            methods: Table::new(),
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

pub struct Instance {
    pub class: Rc<RefCell<Class>>,
    pub fields: Table,
}

impl Instance {
    pub fn new(class: Rc<RefCell<Class>>) -> Self {
        Self {
            class,
            fields: Table::new(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fields may point back at this instance; stay shallow.
        write!(f, "{} instance", self.class.borrow().name)
    }
}

/// A method closure bound to the instance it was read from.
pub struct BoundMethod {
    pub receiver: Rc<RefCell<Instance>>,
    pub method: Rc<Closure>,
}

impl BoundMethod {
    pub fn new(receiver: Rc<RefCell<Instance>>, method: Rc<Closure>) -> Self {
        Self { receiver, method }
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method.function)
    }
}

// Instances and closures are the links of long object chains. Dropping one
// hands its contents to `release`, which frees the chain with a worklist so
// the native stack depth stays constant.

impl Drop for Instance {
    fn drop(&mut self) {
        if !self.fields.is_empty() {
            release(self.fields.take_values());
        }
    }
}

impl Drop for Closure {
    fn drop(&mut self) {
        if self.upvalues.is_empty() {
            return;
        }
        let mut pending = Vec::new();
        take_cells(std::mem::take(&mut self.upvalues), &mut pending);
        release(pending);
    }
}

/// Drop `pending`, emptying every object this holds the last reference to
/// before letting it go.
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::Instance(instance) => {
                if Rc::strong_count(&instance) == 1 {
                    if let Ok(mut instance) = instance.try_borrow_mut() {
                        pending.extend(instance.fields.take_values());
                        pending.push(Value::Class(instance.class.clone()));
                    }
                }
            }
            Value::Class(class) => {
                if Rc::strong_count(&class) == 1 {
                    if let Ok(mut class) = class.try_borrow_mut() {
                        pending.extend(class.methods.take_values().into_iter().map(Value::Closure));
                    }
                }
            }
            Value::Closure(closure) => {
                if let Ok(mut closure) = Rc::try_unwrap(closure) {
                    take_cells(std::mem::take(&mut closure.upvalues), &mut pending);
                }
            }
            Value::BoundMethod(bound) => {
                if let Ok(bound) = Rc::try_unwrap(bound) {
                    pending.push(Value::Instance(bound.receiver));
                    pending.push(Value::Closure(bound.method));
                }
            }
            _ => {}
        }
    }
}

fn take_cells(cells: Vec<Rc<RefCell<Upvalue>>>, pending: &mut Vec<Value>) {
    for cell in cells {
        if Rc::strong_count(&cell) != 1 {
            continue;
        }
        if let Ok(mut cell) = cell.try_borrow_mut() {
            if let Upvalue::Closed(value) = std::mem::replace(&mut *cell, Upvalue::Closed(Value::Nil)) {
                pending.push(value);
            }
        }
    }
}
