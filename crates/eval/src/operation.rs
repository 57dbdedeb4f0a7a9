//! Operations and the Operation-Sequence executor.
//!
//! An [`OperationSequence`] runs its steps in order against one context.
//! Each step's result becomes the stack's last value. Recoverable failures
//! are converted into a string value and execution continues; every other
//! failure aborts the sequence. A break request stops the remaining steps
//! of the sequence that observes it.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::invoke::InvokeOperation;
use crate::stack::CallStack;
use crate::value::Value;

pub trait Operation: fmt::Debug {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError>;

    /// Depth-first definedness check. `defined` holds the names bound
    /// before this operation runs and receives the names it binds.
    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        let _ = defined;
        Ok(())
    }

    fn describe(&self) -> String;
}

pub type OperationRef = Rc<dyn Operation>;

// ──────────────────────────────────────────────
// OperationSequence
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct OperationSequence {
    operations: Vec<OperationRef>,
}

impl OperationSequence {
    pub fn new(operations: Vec<OperationRef>) -> Self {
        OperationSequence { operations }
    }

    pub fn push(&mut self, operation: OperationRef) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[OperationRef] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        self.execute_from(0, context, stack)
    }

    /// Run steps `start..`. Returns the value of the last executed step,
    /// `Null` when none ran. The break flag is cleared on entry and on
    /// exit so it only ever stops this sequence.
    pub fn execute_from(
        &self,
        start: usize,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        stack.clear_break();
        let mut last = Value::Null;
        for (step, operation) in self.operations.iter().enumerate().skip(start) {
            trace!(step, operation = %operation.describe(), "executing step");
            let value = match operation.execute(context, stack) {
                Ok(value) => value,
                Err(e) if e.is_recoverable() => {
                    warn!(step, error = %e, "recoverable failure absorbed");
                    stack.clear_failure_trace();
                    Value::string(e.to_string())
                }
                Err(e) => {
                    stack.clear_break();
                    return Err(e);
                }
            };
            stack.next_operation(value.clone());
            last = value;
            if stack.is_break_requested() {
                trace!(step, "break requested");
                break;
            }
        }
        stack.clear_break();
        Ok(last)
    }

    pub fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        for operation in &self.operations {
            operation.validate(defined)?;
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        let steps: Vec<String> = self.operations.iter().map(|op| op.describe()).collect();
        format!("{{ {} }}", steps.join("; "))
    }
}

impl From<Vec<OperationRef>> for OperationSequence {
    fn from(operations: Vec<OperationRef>) -> Self {
        OperationSequence::new(operations)
    }
}

// ──────────────────────────────────────────────
// Operation kinds
// ──────────────────────────────────────────────

/// Literal value. Containers are deep-copied on every execution so a
/// program cannot mutate its own literals.
#[derive(Debug, Clone)]
pub struct Constant {
    pub value: Value,
}

impl Constant {
    pub fn new(value: impl Into<Value>) -> Self {
        Constant {
            value: value.into(),
        }
    }
}

impl Operation for Constant {
    fn execute(&self, _: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
        match &self.value {
            Value::List(_) | Value::Map(_) | Value::Json(_) | Value::Graph(_) => {
                self.value.clone_value()
            }
            other => Ok(other.clone()),
        }
    }

    fn describe(&self) -> String {
        self.value.to_string()
    }
}

/// A value captured at run time, returned as-is on every execution.
/// Quoted calls hold their evaluated arguments this way, so containers
/// keep their identity and may carry callables.
#[derive(Debug, Clone)]
pub struct Captured {
    pub value: Value,
}

impl Captured {
    pub fn new(value: Value) -> Self {
        Captured { value }
    }
}

impl Operation for Captured {
    fn execute(&self, _: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
        Ok(self.value.clone())
    }

    fn describe(&self) -> String {
        self.value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable { name: name.into() }
    }
}

impl Operation for Variable {
    fn execute(&self, context: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
        context.get_variable(&self.name)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        if defined.contains(&self.name) {
            Ok(())
        } else {
            Err(EvalError::Validation {
                message: format!("variable '{}' is used before it is defined", self.name),
            })
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// The stack's last value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviousResult;

impl Operation for PreviousResult {
    fn execute(&self, _: &mut ExecutionContext, stack: &mut CallStack) -> Result<Value, EvalError> {
        Ok(stack.last_value().clone())
    }

    fn describe(&self) -> String {
        "$previous".to_string()
    }
}

/// Nested anonymous sequence sharing the enclosing context.
#[derive(Debug, Clone)]
pub struct Block {
    pub body: OperationSequence,
}

impl Block {
    pub fn new(body: OperationSequence) -> Self {
        Block { body }
    }
}

impl Operation for Block {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        self.body.execute(context, stack)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        self.body.validate(defined)
    }

    fn describe(&self) -> String {
        self.body.describe()
    }
}

/// Push the source's value on the context's hand-off queue and return it.
#[derive(Debug, Clone)]
pub struct Enqueue {
    pub source: OperationRef,
}

impl Operation for Enqueue {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let value = self.source.execute(context, stack)?;
        context.enqueue(value.clone());
        Ok(value)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        self.source.validate(defined)
    }

    fn describe(&self) -> String {
        format!("enqueue {}", self.source.describe())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dequeue;

impl Operation for Dequeue {
    fn execute(&self, context: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
        context
            .dequeue()
            .ok_or_else(|| EvalError::invocation("dequeue from an empty queue"))
    }

    fn describe(&self) -> String {
        "dequeue".to_string()
    }
}

/// Quote a call: arguments are evaluated now, the call itself is returned
/// as an Invocation value for later execution.
#[derive(Debug, Clone)]
pub struct MakeInvocation {
    pub target: String,
    pub arguments: Vec<OperationRef>,
}

impl Operation for MakeInvocation {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let mut arguments: Vec<OperationRef> = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            let value = argument.execute(context, stack)?;
            arguments.push(Rc::new(Captured::new(value)));
        }
        let call = InvokeOperation::new(self.target.clone(), arguments, None);
        Ok(Value::Invocation(Rc::new(call)))
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        for argument in &self.arguments {
            argument.validate(defined)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        let args: Vec<String> = self.arguments.iter().map(|a| a.describe()).collect();
        format!("quote {}({})", self.target, args.join(", "))
    }
}

/// Fetch a named callable as an Invocable value. With several overloads
/// the first declared one is returned.
#[derive(Debug, Clone)]
pub struct InvocableRef {
    pub name: String,
}

impl Operation for InvocableRef {
    fn execute(&self, context: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
        context
            .candidates(&self.name)
            .into_iter()
            .next()
            .map(Value::Invocable)
            .ok_or_else(|| EvalError::UnknownPredicate {
                name: self.name.clone(),
            })
    }

    fn describe(&self) -> String {
        format!("&{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(seq: &OperationSequence, ctx: &mut ExecutionContext) -> Result<Value, EvalError> {
        CallStack::new().execute_main("test", seq, ctx)
    }

    #[derive(Debug)]
    struct Failing(EvalError);

    impl Operation for Failing {
        fn execute(&self, _: &mut ExecutionContext, _: &mut CallStack) -> Result<Value, EvalError> {
            Err(self.0.clone())
        }

        fn describe(&self) -> String {
            "fail".to_string()
        }
    }

    #[derive(Debug)]
    struct Breaking;

    impl Operation for Breaking {
        fn execute(&self, _: &mut ExecutionContext, stack: &mut CallStack) -> Result<Value, EvalError> {
            stack.request_break();
            Ok(Value::Boolean(false))
        }

        fn describe(&self) -> String {
            "break".to_string()
        }
    }

    #[test]
    fn recoverable_failure_becomes_string_and_execution_continues() {
        let seq = OperationSequence::new(vec![
            Rc::new(Constant::new(1)),
            Rc::new(Failing(EvalError::invocation("native went wrong"))),
            Rc::new(Enqueue {
                source: Rc::new(PreviousResult),
            }),
            Rc::new(Constant::new(3)),
        ]);
        let mut ctx = ExecutionContext::new();
        let result = run(&seq, &mut ctx).unwrap();
        assert_eq!(result, Value::from(3));
        assert_eq!(ctx.dequeue(), Some(Value::string("native went wrong")));
    }

    #[test]
    fn structural_failure_aborts() {
        let seq = OperationSequence::new(vec![
            Rc::new(Variable::new("missing")),
            Rc::new(Enqueue {
                source: Rc::new(Constant::new(1)),
            }),
        ]);
        let mut ctx = ExecutionContext::new();
        let err = run(&seq, &mut ctx).unwrap_err();
        assert_eq!(
            err,
            EvalError::UndefinedVariable {
                name: "missing".to_string()
            }
        );
        assert_eq!(ctx.queue_len(), 0);
    }

    #[test]
    fn break_stops_remaining_steps_of_current_sequence_only() {
        let inner = OperationSequence::new(vec![
            Rc::new(Breaking),
            Rc::new(Enqueue {
                source: Rc::new(Constant::new("inner")),
            }),
        ]);
        let outer = OperationSequence::new(vec![
            Rc::new(Block::new(inner)),
            Rc::new(Enqueue {
                source: Rc::new(Constant::new("outer")),
            }),
        ]);
        let mut ctx = ExecutionContext::new();
        run(&outer, &mut ctx).unwrap();
        assert_eq!(ctx.dequeue(), Some(Value::string("outer")));
        assert_eq!(ctx.dequeue(), None);
    }

    #[test]
    fn constants_are_fresh_per_execution() {
        let op = Constant::new(Value::from_json(&json!([1, 2])));
        let mut ctx = ExecutionContext::new();
        let mut stack = CallStack::new();
        let first = op.execute(&mut ctx, &mut stack).unwrap();
        first.as_list().borrow_mut().push(Value::from(3));
        let second = op.execute(&mut ctx, &mut stack).unwrap();
        assert_eq!(second.as_numeric(), 2.0);
    }

    #[test]
    fn quoted_arguments_keep_containers_holding_callables() {
        use crate::invocable::Invocable;
        use crate::signature::Signature;

        let callable = Rc::new(Invocable::native("noop", Signature::empty(), |_, _| {
            Ok(Value::Null)
        }));
        let xs = Value::list(vec![Value::Invocable(callable)]);
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("xs", xs.clone());
        let mut stack = CallStack::new();

        let quote = MakeInvocation {
            target: "Size".to_string(),
            arguments: vec![Rc::new(Variable::new("xs"))],
        };
        let call = match quote.execute(&mut ctx, &mut stack).unwrap() {
            Value::Invocation(call) => call,
            other => panic!("expected an invocation, got {:?}", other),
        };
        let captured = call.arguments()[0].execute(&mut ctx, &mut stack).unwrap();
        assert!(Rc::ptr_eq(&captured.as_list(), &xs.as_list()));
    }

    #[test]
    fn empty_dequeue_is_recoverable() {
        let seq = OperationSequence::new(vec![Rc::new(Dequeue)]);
        let mut ctx = ExecutionContext::new();
        let result = run(&seq, &mut ctx).unwrap();
        assert_eq!(result.as_string(), "dequeue from an empty queue");
    }

    #[test]
    fn execute_from_skips_leading_steps() {
        let seq = OperationSequence::new(vec![
            Rc::new(Variable::new("undefined")),
            Rc::new(Constant::new(7)),
        ]);
        let mut ctx = ExecutionContext::new();
        let mut stack = CallStack::new();
        assert_eq!(seq.execute_from(1, &mut ctx, &mut stack).unwrap(), Value::from(7));
    }

    #[test]
    fn validation_reports_undefined_reads() {
        let seq = OperationSequence::new(vec![Rc::new(Variable::new("x"))]);
        let mut defined = BTreeSet::new();
        assert!(matches!(
            seq.validate(&mut defined),
            Err(EvalError::Validation { .. })
        ));
        defined.insert("x".to_string());
        assert!(seq.validate(&mut defined).is_ok());
    }
}
