//! Console-facing entry points.
//!
//! An [`Interpreter`] owns one execution context and one call stack. Hosts
//! register predicates, run operations or whole programs, and read the
//! diagnostics after a failure.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::context::{ExecutionContext, Modifiers};
use crate::error::EvalError;
use crate::invocable::{Body, Invocable};
use crate::natives;
use crate::operation::{OperationRef, OperationSequence};
use crate::print::SharedPrintSink;
use crate::program::Program;
use crate::stack::CallStack;
use crate::unify::StructuralUnifier;
use crate::value::Value;

#[derive(Debug)]
pub struct Interpreter {
    context: ExecutionContext,
    stack: CallStack,
    config: RuntimeConfig,
}

impl Interpreter {
    /// Interpreter with the built-in library installed, printing where
    /// `config` says.
    pub fn new(config: RuntimeConfig) -> Result<Self, EvalError> {
        let printer = config.print_sink();
        Interpreter::with_printer(config, printer)
    }

    pub fn with_printer(config: RuntimeConfig, printer: SharedPrintSink) -> Result<Self, EvalError> {
        let interpreter = Interpreter::bare(config, printer);
        natives::install(&interpreter.context)?;
        Ok(interpreter)
    }

    /// Interpreter with an empty callable table.
    pub fn bare(config: RuntimeConfig, printer: SharedPrintSink) -> Self {
        Interpreter {
            context: ExecutionContext::with_parts(Rc::new(StructuralUnifier), printer),
            stack: CallStack::new(),
            config,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ──────────────────────────────────────────────
    // Registration
    // ──────────────────────────────────────────────

    /// Register a callable. Sequence bodies are validated against the
    /// signature's variables first when validation is enabled.
    pub fn process_predicate(
        &mut self,
        invocable: Rc<Invocable>,
        modifiers: Modifiers,
    ) -> Result<usize, EvalError> {
        if self.config.validate {
            validate_predicate(&invocable)?;
        }
        self.context.add_sequence(invocable, modifiers)
    }

    pub fn load_program(&mut self, program: &Program) -> Result<(), EvalError> {
        for decl in &program.predicates {
            self.process_predicate(decl.to_invocable(), decl.modifiers)?;
        }
        debug!(predicates = program.predicates.len(), "program loaded");
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Execution
    // ──────────────────────────────────────────────

    /// Run a single operation as a one-step top-level sequence.
    pub fn process_operation(&mut self, operation: OperationRef) -> Result<Value, EvalError> {
        let sequence = OperationSequence::new(vec![operation]);
        self.process_sequence("operation", &sequence)
    }

    pub fn process_sequence(
        &mut self,
        label: &str,
        sequence: &OperationSequence,
    ) -> Result<Value, EvalError> {
        if self.config.validate {
            let mut defined: BTreeSet<String> = self
                .context
                .variables()
                .names()
                .map(str::to_string)
                .collect();
            sequence.validate(&mut defined)?;
        }
        self.stack.execute_main(label, sequence, &mut self.context)
    }

    /// Load the program's predicates and run its main sequence.
    pub fn run_program(&mut self, program: &Program) -> Result<Value, EvalError> {
        self.load_program(program)?;
        info!(steps = program.main.len(), "running main");
        self.process_sequence("main", &program.main)
    }

    /// Validate every predicate body and the main sequence without running
    /// or registering anything.
    pub fn check_program(&self, program: &Program) -> Result<(), EvalError> {
        for decl in &program.predicates {
            validate_predicate(&decl.to_invocable())?;
        }
        let mut defined: BTreeSet<String> = self
            .context
            .variables()
            .names()
            .map(str::to_string)
            .collect();
        program.main.validate(&mut defined)
    }

    // ──────────────────────────────────────────────
    // Diagnostics
    // ──────────────────────────────────────────────

    pub fn get_context_sequences_short_description(&self) -> String {
        self.context.get_context_sequences_short_description()
    }

    /// Trace of the most recent failure, innermost level first.
    pub fn failure_trace(&self) -> Vec<String> {
        self.stack
            .last_failure_trace()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Write the stack trace to the context's print sink.
    pub fn print_stack_trace(&self) -> Result<(), EvalError> {
        let mut printer = self.context.printer().borrow_mut();
        self.stack
            .print_stack_trace(&mut *printer)
            .map_err(|e| EvalError::invocation(format!("print failed: {}", e)))
    }
}

fn validate_predicate(invocable: &Invocable) -> Result<(), EvalError> {
    if let Body::Sequence(body) = invocable.body() {
        let mut defined: BTreeSet<String> =
            invocable.signature().variables().into_iter().collect();
        body.validate(&mut defined).map_err(|e| match e {
            EvalError::Validation { message } => EvalError::Validation {
                message: format!("in {}: {}", invocable.describe(), message),
            },
            other => other,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{shared, BufferSink};
    use serde_json::json;

    fn interpreter() -> (Interpreter, BufferSink) {
        let output = BufferSink::new();
        let interp =
            Interpreter::with_printer(RuntimeConfig::default(), shared(output.clone())).unwrap();
        (interp, output)
    }

    #[test]
    fn validation_rejects_undefined_reads_before_running() {
        let (mut interp, output) = interpreter();
        let program = Program::from_json(&json!({
            "main": [
                {"invoke": "Print", "args": ["started"]},
                {"invoke": "Print", "args": [{"var": "ghost"}]}
            ]
        }))
        .unwrap();
        let err = interp.run_program(&program).unwrap_err();
        assert!(matches!(err, EvalError::Validation { .. }));
        assert!(output.contents().is_empty());
    }

    #[test]
    fn validation_can_be_disabled() {
        let output = BufferSink::new();
        let config = RuntimeConfig {
            validate: false,
            ..RuntimeConfig::default()
        };
        let mut interp = Interpreter::with_printer(config, shared(output.clone())).unwrap();
        let program = Program::from_json(&json!({
            "main": [
                {"invoke": "Print", "args": ["started"]},
                {"var": "ghost"}
            ]
        }))
        .unwrap();
        let err = interp.run_program(&program).unwrap_err();
        assert!(matches!(err, EvalError::UndefinedVariable { .. }));
        assert_eq!(output.lines(), vec!["started"]);
    }

    #[test]
    fn predicate_bodies_see_their_parameters() {
        let (mut interp, _) = interpreter();
        let bad = Program::from_json(&json!({
            "predicates": [{"name": "f", "params": ["x"], "body": [{"var": "y"}]}]
        }))
        .unwrap();
        let err = interp.load_program(&bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: in f(x): variable 'y' is used before it is defined"
        );
    }

    #[test]
    fn variables_persist_between_operations() {
        let (mut interp, _) = interpreter();
        interp
            .process_operation(crate::program::parse_operation(&json!({"assign": "x", "from": 4})).unwrap())
            .unwrap();
        let doubled = interp
            .process_operation(
                crate::program::parse_operation(&json!({"invoke": "Mul", "args": [{"var": "x"}, 2]}))
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(doubled, Value::from(8));
    }

    #[test]
    fn failure_trace_names_the_failing_levels() {
        let (mut interp, output) = interpreter();
        let program = Program::from_json(&json!({
            "predicates": [{"name": "outer", "body": [{"invoke": "inner"}]}],
            "main": [{"invoke": "outer"}]
        }))
        .unwrap();
        let err = interp.run_program(&program).unwrap_err();
        assert_eq!(err, EvalError::UnknownPredicate { name: "inner".to_string() });
        assert_eq!(
            interp.failure_trace(),
            vec!["outer() at step 0".to_string(), "<main> at step 0".to_string()]
        );
        interp.print_stack_trace().unwrap();
        assert_eq!(output.lines()[0], "  at outer() at step 0");
    }

    #[test]
    fn bare_interpreter_has_no_library() {
        let interp = Interpreter::bare(RuntimeConfig::default(), shared(BufferSink::new()));
        assert!(interp.get_context_sequences_short_description().is_empty());
    }
}
