//! Assignment as pattern binding: `x := expr` and `[h | t] := expr` are the
//! same operation with different destination patterns.

use std::collections::BTreeSet;

use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::operation::{Operation, OperationRef};
use crate::stack::CallStack;
use crate::unify::Pattern;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct AssignmentOperation {
    pub destination: Pattern,
    /// Evaluated for the assigned value; `None` reuses the stack's last
    /// value.
    pub source: Option<OperationRef>,
}

impl AssignmentOperation {
    pub fn new(destination: Pattern, source: Option<OperationRef>) -> Self {
        AssignmentOperation {
            destination,
            source,
        }
    }
}

impl Operation for AssignmentOperation {
    /// Binds into the current context and returns the assigned value.
    fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        let value = match &self.source {
            Some(source) => source.execute(context, stack)?,
            None => stack.last_value().clone(),
        };
        let subject = if value.is_json_capable() {
            value.as_json()?
        } else {
            value.clone()
        };
        let bindings = context
            .unifier()
            .unify(&self.destination, &subject)
            .map_err(|cause| EvalError::Assignment {
                cause: Box::new(cause.into()),
            })?;
        for (name, bound) in bindings {
            context.set_variable(name, bound);
        }
        Ok(value)
    }

    fn validate(&self, defined: &mut BTreeSet<String>) -> Result<(), EvalError> {
        if let Some(source) = &self.source {
            source.validate(defined)?;
        }
        defined.extend(self.destination.variables());
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(source) => format!("{} := {}", self.destination, source.describe()),
            None => format!("{} := $previous", self.destination),
        }
    }
}
