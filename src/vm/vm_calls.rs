//! Function call dispatch for the VM.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::{Class, Closure, Instance, NativeFunction, Value};

use super::vm::{CallFrame, Vm, FRAMES_MAX};

impl Vm {
    /// Call a value with `arg_count` arguments already on the stack above it.
    pub(super) fn call_value(&mut self, callee: Value, arg_count: usize) -> Result<(), RuntimeError> {
        match callee {
            Value::Closure(closure) => self.call(closure, arg_count),
            Value::Native(native) => self.call_native(&native, arg_count),
            Value::Class(class) => self.call_class(class, arg_count),
            Value::BoundMethod(bound) => {
                // The receiver takes the callee's slot and becomes `this`.
                let callee_slot = self.stack.len() - arg_count - 1;
                self.stack[callee_slot] = Value::Instance(bound.receiver.clone());
                self.call(bound.method.clone(), arg_count)
            }
            _ => Err(self.runtime_error("Can only call functions and classes.")),
        }
    }

    /// Push a frame for `closure`. Its slot 0 is the callee below the arguments.
    pub(super) fn call(&mut self, closure: Rc<Closure>, arg_count: usize) -> Result<(), RuntimeError> {
        let arity = closure.function.arity;
        if arg_count != arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                arity, arg_count
            )));
        }

        if self.frames.len() == FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }

        let slots = self.stack.len() - arg_count - 1;
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots,
        });
        Ok(())
    }

    fn call_native(&mut self, native: &NativeFunction, arg_count: usize) -> Result<(), RuntimeError> {
        if let Some(expected) = native.arity {
            if arg_count != expected {
                return Err(self.runtime_error(format!(
                    "Expected {} arguments but got {}.",
                    expected, arg_count
                )));
            }
        }

        let args_start = self.stack.len() - arg_count;
        let result = (native.function)(&self.stack[args_start..])
            .map_err(|message| self.runtime_error(message))?;

        // Drop the arguments and the callee.
        self.stack.truncate(args_start - 1);
        self.push(result);
        Ok(())
    }

    fn call_class(&mut self, class: Rc<RefCell<Class>>, arg_count: usize) -> Result<(), RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));
        self.heap.track_instance(&instance);

        let callee_slot = self.stack.len() - arg_count - 1;
        self.stack[callee_slot] = Value::Instance(instance);

        let initializer = class.borrow().methods.get(&self.init_string).cloned();
        match initializer {
            Some(initializer) => self.call(initializer, arg_count),
            None if arg_count != 0 => Err(self.runtime_error(format!(
                "Expected 0 arguments but got {}.",
                arg_count
            ))),
            None => Ok(()),
        }
    }

    /// `receiver.name(args)` without materializing a bound method.
    pub(super) fn invoke(&mut self, name: &str, arg_count: usize) -> Result<(), RuntimeError> {
        let Value::Instance(instance) = self.peek(arg_count).clone() else {
            return Err(self.runtime_error("Only instances have methods."));
        };

        // A field holding a callable shadows any method of the same name.
        let field = instance.borrow().fields.get(name).cloned();
        if let Some(value) = field {
            let callee_slot = self.stack.len() - arg_count - 1;
            self.stack[callee_slot] = value.clone();
            return self.call_value(value, arg_count);
        }

        let class = instance.borrow().class.clone();
        self.invoke_from_class(&class, name, arg_count)
    }

    pub(super) fn invoke_from_class(
        &mut self,
        class: &Rc<RefCell<Class>>,
        name: &str,
        arg_count: usize,
    ) -> Result<(), RuntimeError> {
        let method = class.borrow().methods.get(name).cloned();
        match method {
            Some(method) => self.call(method, arg_count),
            None => Err(self.runtime_error(format!("Undefined property '{}'.", name))),
        }
    }
}
