//! Control-flow operators: `if` and `for`.
//!
//! Both are ordinary operations. Branch and loop bodies are nested
//! sequences, so a break raised inside one ends that body only.

use std::collections::BTreeSet;

use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::operation::{Operation, OperationRef, OperationSequence};
use crate::stack::CallStack;
use crate::value::Value;

/// Conditional. Without branches it is a guard: a false condition requests
/// a break, ending the enclosing sequence.
#[derive(Debug, Clone)]
pub struct IfOperation {
    pub condition: OperationRef,
    pub then_branch: Option<OperationSequence>,
    pub else_branch: Option<OperationSequence>,
}

impl IfOperation {
    pub fn guard(condition: OperationRef) -> Self {
        IfOperation {
            condition,
            then_branch: None,
            else_branch: None,
        }
    }

    pub fn branches(
        condition: OperationRef,
        then_branch: OperationSequence,
        else_branch: Option<OperationSequence>,
    ) -> Self {
        IfOperation {
            condition,
            then_branch: Some(then_branch),
            else_branch,
        }
    }

    fn is_guard(&self) -> bool {
        self.then_branch.is_none() && self.else_branch.is_none()
    }
}

impl Operation for IfOperation {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let holds = self.condition.execute(context, stack)?.as_boolean();
        if self.is_guard() {
            if !holds {
                stack.request_break();
            }
            return Ok(Value::Boolean(holds));
        }
        let branch = if holds {
            &self.then_branch
        } else {
            &self.else_branch
        };
        match branch {
            Some(body) => body.execute(context, stack),
            None => Ok(Value::Boolean(holds)),
        }
    }

    /// Only names bound on both paths count as defined afterwards.
    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        self.condition.validate(defined)?;
        if self.is_guard() {
            return Ok(());
        }
        let mut then_defined = defined.clone();
        if let Some(body) = &self.then_branch {
            body.validate(&mut then_defined)?;
        }
        let mut else_defined = defined.clone();
        if let Some(body) = &self.else_branch {
            body.validate(&mut else_defined)?;
        }
        *defined = then_defined.intersection(&else_defined).cloned().collect();
        Ok(())
    }

    fn describe(&self) -> String {
        match (&self.then_branch, &self.else_branch) {
            (None, None) => format!("if {}", self.condition.describe()),
            (then_branch, else_branch) => {
                let mut out = format!("if {}", self.condition.describe());
                if let Some(body) = then_branch {
                    out.push_str(&format!(" then {}", body.describe()));
                }
                if let Some(body) = else_branch {
                    out.push_str(&format!(" else {}", body.describe()));
                }
                out
            }
        }
    }
}

/// Run `body` once per element of the source's list view, with `variable`
/// bound in the current context. Returns the last body value.
#[derive(Debug, Clone)]
pub struct ForOperation {
    pub variable: String,
    pub source: OperationRef,
    pub body: OperationSequence,
}

impl Operation for ForOperation {
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let source = self.source.execute(context, stack)?;
        let list = source.as_list();
        let items: Vec<Value> = list.borrow().clone();

        let mut last = Value::Null;
        for item in items {
            context.set_variable(self.variable.clone(), item);
            last = self.body.execute(context, stack)?;
        }
        Ok(last)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        self.source.validate(defined)?;
        let mut inner = defined.clone();
        inner.insert(self.variable.clone());
        self.body.validate(&mut inner)
    }

    fn describe(&self) -> String {
        format!(
            "for {} in {} {}",
            self.variable,
            self.source.describe(),
            self.body.describe()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Constant, Enqueue, Variable};
    use serde_json::json;
    use std::rc::Rc;

    fn run(seq: &OperationSequence, ctx: &mut ExecutionContext) -> Value {
        CallStack::new().execute_main("test", seq, ctx).unwrap()
    }

    fn enqueue(value: impl Into<Value>) -> OperationRef {
        Rc::new(Enqueue {
            source: Rc::new(Constant::new(value)),
        })
    }

    fn drain(ctx: &mut ExecutionContext) -> Vec<Value> {
        std::iter::from_fn(|| ctx.dequeue()).collect()
    }

    #[test]
    fn guard_ends_enclosing_sequence() {
        let seq = OperationSequence::new(vec![
            enqueue("before"),
            Rc::new(IfOperation::guard(Rc::new(Constant::new(false)))),
            enqueue("after"),
        ]);
        let mut ctx = ExecutionContext::new();
        assert_eq!(run(&seq, &mut ctx), Value::Boolean(false));
        assert_eq!(drain(&mut ctx), vec![Value::string("before")]);
    }

    #[test]
    fn true_guard_continues() {
        let seq = OperationSequence::new(vec![
            Rc::new(IfOperation::guard(Rc::new(Constant::new(1)))),
            enqueue("after"),
        ]);
        let mut ctx = ExecutionContext::new();
        run(&seq, &mut ctx);
        assert_eq!(drain(&mut ctx), vec![Value::string("after")]);
    }

    #[test]
    fn branch_form_picks_one_branch() {
        let op: OperationRef = Rc::new(IfOperation::branches(
            Rc::new(Constant::new("")),
            OperationSequence::new(vec![Rc::new(Constant::new("then"))]),
            Some(OperationSequence::new(vec![Rc::new(Constant::new("else"))])),
        ));
        let mut ctx = ExecutionContext::new();
        let mut stack = CallStack::new();
        assert_eq!(
            op.execute(&mut ctx, &mut stack).unwrap(),
            Value::string("else")
        );

        let seq = OperationSequence::new(vec![op, enqueue("next")]);
        run(&seq, &mut ctx);
        assert_eq!(drain(&mut ctx), vec![Value::string("next")]);
    }

    #[test]
    fn for_guard_skips_rest_of_iteration_only() {
        // for x in [1, 0, 2] { if x; enqueue x }
        let body = OperationSequence::new(vec![
            Rc::new(IfOperation::guard(Rc::new(Variable::new("x")))),
            Rc::new(Enqueue {
                source: Rc::new(Variable::new("x")),
            }),
        ]);
        let op = ForOperation {
            variable: "x".to_string(),
            source: Rc::new(Constant::new(Value::from_json(&json!([1, 0, 2])))),
            body,
        };
        let seq = OperationSequence::new(vec![Rc::new(op), enqueue("done")]);
        let mut ctx = ExecutionContext::new();
        run(&seq, &mut ctx);
        assert_eq!(
            drain(&mut ctx),
            vec![Value::from(1), Value::from(2), Value::string("done")]
        );
    }

    #[test]
    fn validation_intersects_branches() {
        let assign_like = |name: &str| -> OperationSequence {
            OperationSequence::new(vec![Rc::new(crate::assign::AssignmentOperation::new(
                crate::unify::Pattern::var(name),
                Some(Rc::new(Constant::new(1))),
            ))])
        };
        let op = IfOperation::branches(
            Rc::new(Constant::new(true)),
            assign_like("a"),
            Some(assign_like("b")),
        );
        let mut defined = BTreeSet::new();
        op.validate(&mut defined).unwrap();
        assert!(defined.is_empty());

        let op = IfOperation::branches(
            Rc::new(Constant::new(true)),
            assign_like("a"),
            Some(assign_like("a")),
        );
        op.validate(&mut defined).unwrap();
        assert!(defined.contains("a"));
    }
}
