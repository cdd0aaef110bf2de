//! Shared helpers for end-to-end tests: run a program and capture what it prints.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use loxvm::error::LoxError;
use loxvm::vm::Vm;

/// A `Write` sink whose contents stay readable after the VM takes ownership.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A VM whose `print` output goes to the returned buffer.
pub fn capturing_vm() -> (Vm, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let vm = Vm::new().with_output(buffer.clone());
    (vm, buffer)
}

/// Run `source` on a fresh VM and return its output.
pub fn run(source: &str) -> (String, Result<(), LoxError>) {
    let (mut vm, buffer) = capturing_vm();
    let result = vm.interpret(source);
    (buffer.contents(), result)
}

/// Run a program that must succeed and return its output.
pub fn run_ok(source: &str) -> String {
    let (output, result) = run(source);
    if let Err(err) = result {
        panic!("program failed: {}\noutput so far:\n{}", err, output);
    }
    output
}

/// Run a program that must fail and return its output and error text.
pub fn run_err(source: &str) -> (String, LoxError) {
    let (output, result) = run(source);
    match result {
        Ok(()) => panic!("program unexpectedly succeeded with output:\n{}", output),
        Err(err) => (output, err),
    }
}
