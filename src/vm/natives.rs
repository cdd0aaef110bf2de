//! Host functions exposed to scripts.

use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

use crate::value::{NativeFunction, Value};

use super::vm::Vm;

impl Vm {
    /// Register a host function as a global. `arity: None` accepts any argument count.
    pub fn define_native(
        &mut self,
        name: &str,
        arity: Option<usize>,
        function: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        let native = NativeFunction::new(name, arity, function);
        self.globals
            .set(Rc::from(name), Value::Native(Rc::new(native)));
        debug!(name, ?arity, "registered native");
    }

    pub(super) fn define_builtin_natives(&mut self) {
        let start = Instant::now();
        self.define_native("clock", Some(0), move |_| {
            Ok(Value::Number(start.elapsed().as_secs_f64()))
        });
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_clock_is_registered() {
        let mut vm = Vm::new().with_output(io::sink());
        assert!(matches!(vm.global("clock"), Some(Value::Native(_))));

        vm.interpret("var t = clock();").expect("runs");
        match vm.global("t") {
            Some(Value::Number(seconds)) => assert!(seconds >= 0.0),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_clock_arity() {
        let mut vm = Vm::new().with_output(io::sink());
        let err = vm.interpret("clock(1);").expect_err("arity");
        assert!(err.to_string().starts_with("Expected 0 arguments but got 1."));
    }
}
