//! Explicit call stack.
//!
//! A level is pushed for the top-level sequence and for every invocation,
//! and popped whether or not the level succeeded. The stack also carries
//! the last produced value and the break flag used by control-flow
//! operators.

use std::io;
use std::rc::Rc;

use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::operation::OperationSequence;
use crate::print::PrintSink;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum StackLevel {
    /// Top-level run of an anonymous sequence.
    Main { label: String, step: usize },
    /// Nested invocation. `invocable` is `None` when an invocation value is
    /// re-entered without resolving an overload first.
    Invocation {
        target: String,
        invocable: Option<Rc<Invocable>>,
        step: usize,
    },
}

impl StackLevel {
    pub fn main(label: impl Into<String>) -> Self {
        StackLevel::Main {
            label: label.into(),
            step: 0,
        }
    }

    pub fn invocation(target: impl Into<String>, invocable: Option<Rc<Invocable>>) -> Self {
        StackLevel::Invocation {
            target: target.into(),
            invocable,
            step: 0,
        }
    }

    pub fn step(&self) -> usize {
        match self {
            StackLevel::Main { step, .. } | StackLevel::Invocation { step, .. } => *step,
        }
    }

    fn advance(&mut self) {
        match self {
            StackLevel::Main { step, .. } | StackLevel::Invocation { step, .. } => *step += 1,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StackLevel::Main { label, step } => format!("<{}> at step {}", label, step),
            StackLevel::Invocation {
                invocable: Some(inv),
                step,
                ..
            } => format!("{} at step {}", inv.describe(), step),
            StackLevel::Invocation {
                target,
                invocable: None,
                step,
            } => format!("{}(..) re-entered at step {}", target, step),
        }
    }
}

#[derive(Debug)]
pub struct CallStack {
    levels: Vec<StackLevel>,
    last_value: Value,
    break_requested: bool,
    failure_trace: Option<Vec<String>>,
}

impl Default for CallStack {
    fn default() -> Self {
        CallStack::new()
    }
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            levels: Vec::new(),
            last_value: Value::Null,
            break_requested: false,
            failure_trace: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[StackLevel] {
        &self.levels
    }

    pub fn current(&self) -> Option<&StackLevel> {
        self.levels.last()
    }

    /// Most recent value produced by any step.
    pub fn last_value(&self) -> &Value {
        &self.last_value
    }

    /// Record a step's result and advance the current level's step counter.
    pub fn next_operation(&mut self, value: Value) {
        self.last_value = value;
        if let Some(level) = self.levels.last_mut() {
            level.advance();
        }
    }

    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn clear_break(&mut self) {
        self.break_requested = false;
    }

    pub fn is_break_requested(&self) -> bool {
        self.break_requested
    }

    /// Push `level`, run `f`, pop. The break flag is saved before the push
    /// and restored after the pop, so a break never crosses a level.
    pub fn execute_level<F>(&mut self, level: StackLevel, f: F) -> Result<Value, EvalError>
    where
        F: FnOnce(&mut CallStack) -> Result<Value, EvalError>,
    {
        if self.levels.is_empty() {
            self.failure_trace = None;
        }
        let saved_break = self.break_requested;
        self.break_requested = false;
        self.levels.push(level);

        let result = f(self);
        if result.is_err() && self.failure_trace.is_none() {
            self.failure_trace = Some(self.stack_trace());
        }

        self.levels.pop();
        self.break_requested = saved_break;
        result
    }

    /// Run `sequence` as a top-level level.
    pub fn execute_main(
        &mut self,
        label: &str,
        sequence: &OperationSequence,
        context: &mut ExecutionContext,
    ) -> Result<Value, EvalError> {
        self.execute_level(StackLevel::main(label), |stack| {
            sequence.execute(context, stack)
        })
    }

    /// Current levels, innermost first.
    pub fn stack_trace(&self) -> Vec<String> {
        self.levels.iter().rev().map(StackLevel::describe).collect()
    }

    /// Snapshot taken where the most recent unabsorbed failure was raised.
    pub fn last_failure_trace(&self) -> Option<&[String]> {
        self.failure_trace.as_deref()
    }

    pub fn clear_failure_trace(&mut self) {
        self.failure_trace = None;
    }

    /// Write the failure snapshot if there is one, the live stack otherwise.
    pub fn print_stack_trace(&self, sink: &mut dyn PrintSink) -> io::Result<()> {
        let lines = match &self.failure_trace {
            Some(trace) => trace.clone(),
            None => self.stack_trace(),
        };
        for line in lines {
            sink.write_line(&format!("  at {}", line))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::BufferSink;

    #[test]
    fn level_is_popped_on_failure() {
        let mut stack = CallStack::new();
        let result = stack.execute_level(StackLevel::main("main"), |stack| {
            stack.execute_level(StackLevel::invocation("f", None), |_| {
                Err(EvalError::invocation("boom"))
            })
        });
        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);
        assert_eq!(
            stack.last_failure_trace().unwrap(),
            &["f(..) re-entered at step 0".to_string(), "<main> at step 0".to_string()]
        );
    }

    #[test]
    fn break_does_not_cross_levels() {
        let mut stack = CallStack::new();
        stack
            .execute_level(StackLevel::main("main"), |stack| {
                stack.execute_level(StackLevel::invocation("f", None), |stack| {
                    stack.request_break();
                    Ok(Value::Null)
                })?;
                assert!(!stack.is_break_requested());
                Ok(Value::Null)
            })
            .unwrap();
    }

    #[test]
    fn next_operation_advances_current_level() {
        let mut stack = CallStack::new();
        stack
            .execute_level(StackLevel::main("main"), |stack| {
                stack.next_operation(Value::from(1));
                stack.next_operation(Value::from(2));
                assert_eq!(stack.current().map(StackLevel::step), Some(2));
                Ok(Value::Null)
            })
            .unwrap();
        assert_eq!(stack.last_value(), &Value::from(2));
    }

    #[test]
    fn new_top_level_run_resets_failure_trace() {
        let mut stack = CallStack::new();
        let _ = stack.execute_level(StackLevel::main("a"), |_| Err(EvalError::invocation("x")));
        assert!(stack.last_failure_trace().is_some());
        stack
            .execute_level(StackLevel::main("b"), |_| Ok(Value::Null))
            .unwrap();
        assert!(stack.last_failure_trace().is_none());

        let mut sink = BufferSink::new();
        stack.print_stack_trace(&mut sink).unwrap();
        assert!(sink.contents().is_empty());
    }
}
