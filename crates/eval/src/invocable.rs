//! Callable units: a name, a signature and either an operation sequence or
//! a native closure.

use std::fmt;
use std::rc::Rc;

use crate::binding::SignatureContextMap;
use crate::context::ExecutionContext;
use crate::error::EvalError;
use crate::operation::OperationSequence;
use crate::signature::Signature;
use crate::stack::{CallStack, StackLevel};
use crate::value::Value;

/// Native callable body. Arguments are read from the context's binding
/// table, in signature order.
pub type NativeFn = dyn Fn(&mut ExecutionContext, &mut CallStack) -> Result<Value, EvalError>;

#[derive(Clone)]
pub enum Body {
    Sequence(Rc<OperationSequence>),
    Native(Rc<NativeFn>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Sequence(seq) => f.debug_tuple("Sequence").field(&seq.len()).finish(),
            Body::Native(_) => f.write_str("Native"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocable {
    name: String,
    signature: Signature,
    body: Body,
}

impl Invocable {
    pub fn sequence(
        name: impl Into<String>,
        signature: Signature,
        body: Rc<OperationSequence>,
    ) -> Self {
        Invocable {
            name: name.into(),
            signature,
            body: Body::Sequence(body),
        }
    }

    pub fn native<F>(name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &mut CallStack) -> Result<Value, EvalError> + 'static,
    {
        Invocable {
            name: name.into(),
            signature,
            body: Body::Native(Rc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, Body::Native(_))
    }

    /// `name(signature)`, e.g. `Add(NUMERIC a, NUMERIC b)`.
    pub fn describe(&self) -> String {
        format!("{}{}", self.name, self.signature)
    }

    /// Run the body against an already-bound callee context.
    pub fn execute(
        &self,
        context: &mut ExecutionContext,
        stack: &mut CallStack,
    ) -> Result<Value, EvalError> {
        match &self.body {
            Body::Sequence(seq) => seq.execute(context, stack),
            Body::Native(f) => f(context, stack),
        }
    }

    /// Push a level for this callable and run it in a child of `caller`
    /// built from `bindings`.
    pub fn enter(
        self: &Rc<Self>,
        caller: &ExecutionContext,
        stack: &mut CallStack,
        bindings: SignatureContextMap,
    ) -> Result<Value, EvalError> {
        let mut callee = caller.child(bindings);
        let level = StackLevel::invocation(self.name.clone(), Some(Rc::clone(self)));
        stack.execute_level(level, |stack| self.execute(&mut callee, stack))
    }

    /// Bind `args` against this callable's own signature and run it,
    /// bypassing overload selection.
    pub fn invoke(
        self: &Rc<Self>,
        caller: &ExecutionContext,
        stack: &mut CallStack,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let bindings = self.signature.unify(caller.unifier(), args)?;
        self.enter(caller, stack, bindings)
    }
}
