//! Invocation dispatch.
//!
//! Arguments are evaluated once, in the caller's context, before any
//! overload is tried. Candidates are then tried in declaration order and
//! the first whose signature unifies wins; there is no specificity
//! ranking. When every candidate fails, the per-candidate causes are
//! reported together.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::operation::{Operation, OperationRef};
use crate::stack::{CallStack, StackLevel};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct InvokeOperation {
    target: String,
    arguments: Vec<OperationRef>,
    destination: Option<String>,
}

impl InvokeOperation {
    pub fn new(
        target: impl Into<String>,
        arguments: Vec<OperationRef>,
        destination: Option<String>,
    ) -> Self {
        InvokeOperation {
            target: target.into(),
            arguments,
            destination,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn arguments(&self) -> &[OperationRef] {
        &self.arguments
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// `target(arg, ..)` without the destination.
    pub fn describe_call(&self) -> String {
        let args: Vec<String> = self.arguments.iter().map(|a| a.describe()).collect();
        format!("{}({})", self.target, args.join(", "))
    }

    /// Select an overload for already-evaluated arguments and run it.
    pub fn dispatch(
        target: &str,
        candidates: &[Rc<Invocable>],
        context: &ExecutionContext,
        stack: &mut CallStack,
        values: &[Value],
    ) -> Result<Value, EvalError> {
        if candidates.is_empty() {
            return Err(EvalError::UnknownPredicate {
                name: target.to_string(),
            });
        }
        let mut causes = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            match candidate.signature().unify(context.unifier(), values) {
                Ok(bindings) => {
                    debug!(
                        predicate = %target,
                        candidates = candidates.len(),
                        selected = i,
                        "overload resolved"
                    );
                    return candidate.enter(context, stack, bindings);
                }
                Err(cause) => causes.push(cause),
            }
        }
        debug!(predicate = %target, candidates = candidates.len(), "no overload matched");
        Err(EvalError::NoMatchingOverload {
            name: target.to_string(),
            causes,
        })
    }

    /// Run this call under its own level without resolving an overload for
    /// that level; used when an Invocation value is executed.
    pub fn execute_reentrant(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let level = StackLevel::invocation(self.target.clone(), None);
        stack.execute_level(level, |stack| self.execute(context, stack))
    }
}

impl Operation for InvokeOperation {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let candidates = context.candidates(&self.target);
        if candidates.is_empty() {
            return Err(EvalError::UnknownPredicate {
                name: self.target.clone(),
            });
        }

        let mut values = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            values.push(argument.execute(context, stack)?);
        }

        let result = InvokeOperation::dispatch(&self.target, &candidates, context, stack, &values)?;
        if let Some(destination) = &self.destination {
            context.set_variable(destination.clone(), result.clone());
        }
        Ok(result)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        for argument in &self.arguments {
            argument.validate(defined)?;
        }
        if let Some(destination) = &self.destination {
            defined.insert(destination.clone());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.destination {
            Some(destination) => format!("{} -> {}", self.describe_call(), destination),
            None => self.describe_call(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Modifiers;
    use crate::operation::{Constant, Enqueue, OperationSequence, Variable};
    use crate::signature::{FormalParameter, Signature, Type};
    use crate::unify::Pattern;

    fn register(ctx: &ExecutionContext, name: &str, signature: Signature, result: &str) {
        let body = OperationSequence::new(vec![Rc::new(Constant::new(result))]);
        ctx.add_sequence(
            Rc::new(Invocable::sequence(name, signature, Rc::new(body))),
            Modifiers::user_default(),
        )
        .unwrap();
    }

    fn call(target: &str, args: Vec<OperationRef>, ctx: &mut ExecutionContext) -> Result<Value, EvalError> {
        let seq = OperationSequence::new(vec![Rc::new(InvokeOperation::new(target, args, None))]);
        CallStack::new().execute_main("test", &seq, ctx)
    }

    #[test]
    fn first_declared_candidate_wins() {
        let mut ctx = ExecutionContext::new();
        register(&ctx, "pick", Signature::new(vec![FormalParameter::named(Type::Any, "a")]), "A");
        register(&ctx, "pick", Signature::new(vec![FormalParameter::named(Type::Numeric, "b")]), "B");
        for _ in 0..3 {
            let result = call("pick", vec![Rc::new(Constant::new(1))], &mut ctx).unwrap();
            assert_eq!(result, Value::string("A"));
        }
    }

    #[test]
    fn literal_pattern_clause_selected_before_general_one() {
        let mut ctx = ExecutionContext::new();
        register(
            &ctx,
            "fact",
            Signature::new(vec![FormalParameter::new(Type::Any, Pattern::literal(0))]),
            "base",
        );
        register(&ctx, "fact", Signature::new(vec![FormalParameter::named(Type::Any, "n")]), "step");
        assert_eq!(
            call("fact", vec![Rc::new(Constant::new(0))], &mut ctx).unwrap(),
            Value::string("base")
        );
        assert_eq!(
            call("fact", vec![Rc::new(Constant::new(4))], &mut ctx).unwrap(),
            Value::string("step")
        );
    }

    #[test]
    fn arguments_are_evaluated_once() {
        let mut ctx = ExecutionContext::new();
        register(&ctx, "g", Signature::new(vec![FormalParameter::named(Type::String, "s")]), "s");
        register(&ctx, "g", Signature::new(vec![FormalParameter::named(Type::Numeric, "n")]), "n");
        let arg: OperationRef = Rc::new(Enqueue {
            source: Rc::new(Constant::new(5)),
        });
        assert_eq!(call("g", vec![arg], &mut ctx).unwrap(), Value::string("n"));
        assert_eq!(ctx.queue_len(), 1);
    }

    #[test]
    fn unknown_target_fails_before_arguments_run() {
        let mut ctx = ExecutionContext::new();
        let arg: OperationRef = Rc::new(Enqueue {
            source: Rc::new(Constant::new(5)),
        });
        let err = call("nope", vec![arg], &mut ctx).unwrap_err();
        assert_eq!(err, EvalError::UnknownPredicate { name: "nope".to_string() });
        assert_eq!(ctx.queue_len(), 0);
    }

    #[test]
    fn failure_aggregates_every_candidate() {
        let mut ctx = ExecutionContext::new();
        register(&ctx, "h", Signature::new(vec![FormalParameter::named(Type::String, "s")]), "s");
        register(&ctx, "h", Signature::new(Vec::new()), "none");
        let err = call("h", vec![Rc::new(Constant::new(true))], &mut ctx).unwrap_err();
        match err {
            EvalError::NoMatchingOverload { name, causes } => {
                assert_eq!(name, "h");
                assert_eq!(causes.len(), 2);
                assert!(matches!(causes[0], EvalError::ParameterType { .. }));
                assert!(matches!(causes[1], EvalError::ArityMismatch { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn result_is_stored_in_caller_destination() {
        let mut ctx = ExecutionContext::new();
        register(&ctx, "k", Signature::empty(), "value");
        let seq = OperationSequence::new(vec![
            Rc::new(InvokeOperation::new("k", Vec::new(), Some("out".to_string()))),
            Rc::new(Variable::new("out")),
        ]);
        let result = CallStack::new().execute_main("test", &seq, &mut ctx).unwrap();
        assert_eq!(result, Value::string("value"));
    }

    #[test]
    fn describe_call_lists_arguments() {
        let call = InvokeOperation::new(
            "f",
            vec![Rc::new(Constant::new(1)), Rc::new(Variable::new("x"))],
            Some("y".to_string()),
        );
        assert_eq!(call.describe_call(), "f(1, x)");
        assert_eq!(call.describe(), "f(1, x) -> y");
    }
}
