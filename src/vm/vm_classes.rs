//! Class operations for the VM: property access, methods, inheritance.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::{BoundMethod, Class, Value};

use super::vm::Vm;

impl Vm {
    /// Replace the instance on top of the stack with its property `name`.
    /// Fields shadow methods; methods come back bound to the instance.
    pub(super) fn get_property(&mut self, name: &str) -> Result<(), RuntimeError> {
        let Value::Instance(instance) = self.peek(0).clone() else {
            return Err(self.runtime_error("Only instances have properties."));
        };

        let field = instance.borrow().fields.get(name).cloned();
        if let Some(value) = field {
            self.pop();
            self.push(value);
            return Ok(());
        }

        let class = instance.borrow().class.clone();
        self.bind_method(&class, name)
    }

    /// Stack: [instance, value] -> [value]
    pub(super) fn set_property(&mut self, name: Rc<str>) -> Result<(), RuntimeError> {
        let Value::Instance(instance) = self.peek(1).clone() else {
            return Err(self.runtime_error("Only instances have fields."));
        };

        let value = self.pop();
        instance.borrow_mut().fields.set(name, value.clone());
        self.pop();
        self.push(value);
        Ok(())
    }

    /// Replace the instance on top of the stack with `class`'s method `name` bound to it.
    pub(super) fn bind_method(
        &mut self,
        class: &Rc<RefCell<Class>>,
        name: &str,
    ) -> Result<(), RuntimeError> {
        let method = class.borrow().methods.get(name).cloned();
        let Some(method) = method else {
            return Err(self.runtime_error(format!("Undefined property '{}'.", name)));
        };
        let Value::Instance(receiver) = self.peek(0).clone() else {
            return Err(self.runtime_error("Only instances have methods."));
        };

        let bound = BoundMethod::new(receiver, method);
        self.pop();
        self.push(Value::BoundMethod(Rc::new(bound)));
        Ok(())
    }

    /// Stack: [class, closure] -> [class]
    pub(super) fn define_method(&mut self, name: Rc<str>) -> Result<(), RuntimeError> {
        let Value::Closure(method) = self.peek(0).clone() else {
            return Err(self.runtime_error("Method body must be a closure."));
        };
        let Value::Class(class) = self.peek(1).clone() else {
            return Err(self.runtime_error("Methods can only be defined on classes."));
        };

        class.borrow_mut().methods.set(name, method);
        self.pop();
        Ok(())
    }

    /// Stack: [superclass, subclass] -> [superclass]
    pub(super) fn inherit(&mut self) -> Result<(), RuntimeError> {
        let Value::Class(superclass) = self.peek(1).clone() else {
            return Err(self.runtime_error("Superclass must be a class."));
        };
        let Value::Class(subclass) = self.peek(0).clone() else {
            return Err(self.runtime_error("Only classes can inherit."));
        };

        if !Rc::ptr_eq(&superclass, &subclass) {
            let methods = superclass.borrow().methods.clone();
            subclass.borrow_mut().methods.add_all(&methods);
        }
        self.pop();
        Ok(())
    }

    pub(super) fn pop_class(&mut self) -> Result<Rc<RefCell<Class>>, RuntimeError> {
        match self.pop() {
            Value::Class(class) => Ok(class),
            _ => Err(self.runtime_error("Superclass must be a class.")),
        }
    }
}
