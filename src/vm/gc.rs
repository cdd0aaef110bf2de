//! Cycle collection: mark everything reachable from the VM roots, then let
//! the heap empty whatever it tracks that was not reached.
//!
//! Roots are the value stack, the globals, the closures of active frames, and
//! the open upvalue cells. Collections run only between instructions, when
//! every live value sits in one of those places.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::debug;

use crate::value::{Closure, Upvalue, Value};

use super::heap::{object_id, ObjectId};
use super::vm::Vm;

impl Vm {
    /// Reclaim unreachable cycles now. Returns how many objects were emptied.
    ///
    /// Values a host keeps outside the VM (for example from [`Vm::global`])
    /// are not roots; re-read them after collecting.
    pub fn collect_garbage(&mut self) -> usize {
        let tracked = self.heap.tracked();
        let marked = self.mark_roots();
        let released = self.heap.sweep(&marked);
        debug!(
            tracked,
            reachable = marked.len(),
            released,
            "collected garbage"
        );
        released
    }

    pub(super) fn maybe_collect_garbage(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    fn mark_roots(&self) -> AHashSet<ObjectId> {
        let mut marker = Marker::default();
        for value in &self.stack {
            marker.push_value(value);
        }
        for (_, value) in self.globals.iter() {
            marker.push_value(value);
        }
        for frame in &self.frames {
            marker.push_closure(&frame.closure);
        }
        for cell in &self.open_upvalues {
            marker.push_cell(cell);
        }
        marker.trace()
    }
}

/// Worklist marker. Tracing is iterative so deep object graphs stay off the
/// native stack.
#[derive(Default)]
struct Marker {
    marked: AHashSet<ObjectId>,
    pending: Vec<Value>,
}

impl Marker {
    /// Record `object`; false if it was already marked.
    fn mark<T>(&mut self, object: &Rc<T>) -> bool {
        self.marked.insert(object_id(object))
    }

    fn push_value(&mut self, value: &Value) {
        match value {
            Value::Closure(_) | Value::Class(_) | Value::Instance(_) | Value::BoundMethod(_) => {
                self.pending.push(value.clone())
            }
            _ => {}
        }
    }

    fn push_closure(&mut self, closure: &Rc<Closure>) {
        self.pending.push(Value::Closure(closure.clone()));
    }

    fn push_cell(&mut self, cell: &Rc<RefCell<Upvalue>>) {
        if !self.mark(cell) {
            return;
        }
        // Open cells point at stack slots, which are roots already.
        if let Upvalue::Closed(value) = &*cell.borrow() {
            self.push_value(value);
        }
    }

    fn trace(mut self) -> AHashSet<ObjectId> {
        while let Some(value) = self.pending.pop() {
            match value {
                Value::Closure(closure) => {
                    if self.mark(&closure) {
                        for cell in &closure.upvalues {
                            self.push_cell(cell);
                        }
                    }
                }
                Value::Class(class) => {
                    if self.mark(&class) {
                        for (_, method) in class.borrow().methods.iter() {
                            self.push_closure(method);
                        }
                    }
                }
                Value::Instance(instance) => {
                    if self.mark(&instance) {
                        let instance = instance.borrow();
                        self.pending.push(Value::Class(instance.class.clone()));
                        for (_, field) in instance.fields.iter() {
                            self.push_value(field);
                        }
                    }
                }
                Value::BoundMethod(bound) => {
                    if self.mark(&bound) {
                        self.pending.push(Value::Instance(bound.receiver.clone()));
                        self.push_closure(&bound.method);
                    }
                }
                _ => {}
            }
        }
        self.marked
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_unreachable_cycles_are_reclaimed() {
        let mut vm = Vm::new().with_output(io::sink());
        vm.interpret(
            r#"
            class N {}
            for (var i = 0; i < 5000; i = i + 1) {
                var n = N();
                n.me = n;
                fun f() { return f; }
            }
            "#,
        )
        .expect("runs");

        // Collections during the run keep the registry bounded.
        assert!(vm.heap.tracked() < 3000);

        vm.collect_garbage();
        // Only the class, held by a global, survives.
        assert_eq!(vm.heap.live(), 1);
        assert_eq!(vm.heap.tracked(), 1);
    }

    #[test]
    fn test_reachable_objects_survive_collection() {
        let mut vm = Vm::new().with_output(io::sink());
        vm.interpret(
            r#"
            class Node {
                init(value, next) {
                    this.value = value;
                    this.next = next;
                }
            }
            var list = nil;

            fun counter() {
                var count = 0;
                fun bump() {
                    count = count + 1;
                    return count;
                }
                return bump;
            }
            var bump = counter();

            fun build() {
                var anchor = Node(-1, nil);
                var every = 0;
                for (var i = 0; i < 3000; i = i + 1) {
                    var junk = Node(i, nil);
                    junk.next = junk;
                    every = every + 1;
                    if (every == 100) {
                        list = Node(i, list);
                        every = 0;
                    }
                    bump();
                }
                return anchor.value;
            }
            var anchored = build();

            var length = 0;
            for (var node = list; node != nil; node = node.next) {
                length = length + 1;
            }
            var bumps = bump();
            "#,
        )
        .expect("runs");

        vm.collect_garbage();
        assert_eq!(vm.global("anchored"), Some(Value::Number(-1.0)));
        assert_eq!(vm.global("bumps"), Some(Value::Number(3001.0)));
        assert_eq!(vm.global("length"), Some(Value::Number(30.0)));

        // The list and counter are still intact after an explicit collection.
        vm.interpret("var again = 0; for (var n = list; n != nil; n = n.next) again = again + 1;")
            .expect("list still walkable");
        assert_eq!(vm.global("again"), Some(Value::Number(30.0)));
    }

    #[test]
    fn test_open_upvalues_and_frames_are_roots() {
        let mut vm = Vm::new().with_output(io::sink());
        vm.interpret(
            r#"
            class Box {}
            fun outer() {
                var held = Box();
                held.value = "kept";
                fun read() { return held.value; }
                for (var i = 0; i < 4000; i = i + 1) {
                    var junk = Box();
                    junk.self = junk;
                }
                return read();
            }
            var result = outer();
            "#,
        )
        .expect("runs");
        assert_eq!(vm.global("result"), Some(Value::from("kept")));
    }
}
