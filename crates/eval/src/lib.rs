//! Tessera runtime core -- executes JSON-valued operation sequences with
//! unification-based overload dispatch.
//!
//! The evaluator consumes interchange JSON (see [`program`]), registers
//! its predicates into an execution context, and runs the main sequence on
//! an explicit call stack. Recoverable runtime failures degrade into string
//! values; dispatch and binding failures abort with an [`EvalError`].

pub mod assign;
pub mod binding;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod interpreter;
pub mod invocable;
pub mod invoke;
pub mod natives;
pub mod operation;
pub mod print;
pub mod program;
pub mod signature;
pub mod stack;
pub mod unify;
pub mod value;

pub use binding::{SignatureContextMap, VARARGS_KEY};
pub use config::{PrintTarget, RuntimeConfig};
pub use context::{ExecutionContext, Modifiers};
pub use error::{ErrorKind, EvalError, UnifyError};
pub use interpreter::Interpreter;
pub use invocable::Invocable;
pub use invoke::InvokeOperation;
pub use operation::{Operation, OperationRef, OperationSequence};
pub use program::Program;
pub use signature::{FormalParameter, Signature, Type};
pub use stack::CallStack;
pub use unify::{Pattern, StructuralUnifier, Unifier};
pub use value::{Graph, Value};

/// Load a program bundle and run it with the default configuration.
///
/// This is the top-level public API for one-shot evaluation. Embedders
/// that need diagnostics after a failure should drive an [`Interpreter`]
/// directly.
pub fn run(program: &serde_json::Value) -> Result<Value, EvalError> {
    let program = Program::from_json(program)?;
    let mut interpreter = Interpreter::new(RuntimeConfig::default())?;
    interpreter.run_program(&program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_evaluates_main() {
        let result = run(&json!({
            "predicates": [{
                "name": "double",
                "params": [{"type": "NUMERIC", "pattern": "n"}],
                "body": [{"invoke": "Mul", "args": [{"var": "n"}, 2]}]
            }],
            "main": [{"invoke": "double", "args": [21]}]
        }))
        .unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[test]
    fn run_reports_load_errors() {
        assert!(matches!(
            run(&json!({"main": 5})),
            Err(EvalError::Load { .. })
        ));
    }
}
