//! Upvalue capture and closing, plus closure construction.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::{Closure, Upvalue, Value};

use super::vm::Vm;

fn open_slot(cell: &Rc<RefCell<Upvalue>>) -> usize {
    // Only open cells are kept in the open list.
    cell.borrow().open_slot().unwrap_or(usize::MAX)
}

impl Vm {
    /// Build a closure from the function constant and the capture pairs that follow it.
    pub(super) fn make_closure(&mut self) -> Result<(), RuntimeError> {
        let Value::Function(function) = self.read_constant() else {
            return Err(self.runtime_error("Closure operand must be a function."));
        };

        let mut upvalues = Vec::with_capacity(function.upvalue_count());
        for _ in 0..function.upvalue_count() {
            let is_local = self.read_byte() == 1;
            let index = self.read_byte() as usize;
            let cell = if is_local {
                let slot = self.frame().slots + index;
                self.capture_upvalue(slot)
            } else {
                self.frame().closure.upvalues[index].clone()
            };
            upvalues.push(cell);
        }

        let closure = Closure::new(function, upvalues);
        self.push(Value::Closure(Rc::new(closure)));
        Ok(())
    }

    /// Return the open cell for `slot`, creating one if no closure has captured it yet.
    pub(super) fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        match self
            .open_upvalues
            .binary_search_by(|cell| open_slot(cell).cmp(&slot))
        {
            Ok(existing) => self.open_upvalues[existing].clone(),
            Err(position) => {
                let cell = Rc::new(RefCell::new(Upvalue::Open(slot)));
                self.heap.track_upvalue(&cell);
                self.open_upvalues.insert(position, cell.clone());
                cell
            }
        }
    }

    /// Close every open cell at or above `last`, moving the slot's value into the cell.
    pub(super) fn close_upvalues(&mut self, last: usize) {
        while let Some(cell) = self.open_upvalues.last() {
            let slot = open_slot(cell);
            if slot < last {
                break;
            }
            let value = self.stack.get(slot).cloned().unwrap_or_default();
            cell.borrow_mut().close(value);
            self.open_upvalues.pop();
        }
    }
}
