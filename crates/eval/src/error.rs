//! Error taxonomy for the Tessera runtime.
//!
//! Every failure raised while dispatching, binding or executing operations
//! is an [`EvalError`]. The Operation-Sequence executor decides whether to
//! absorb a failure by looking at its [`ErrorKind`]: only `Recoverable`
//! failures degrade into a string value, everything else propagates.

/// Failure reported by a [`Unifier`](crate::unify::Unifier).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UnifyError {
    pub message: String,
}

impl UnifyError {
    pub fn new(message: impl Into<String>) -> Self {
        UnifyError {
            message: message.into(),
        }
    }
}

/// Coarse classification of an [`EvalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No callable with the given name, or no overload unifies.
    Dispatch,
    /// Undefined variable or failed assignment/binding.
    Argument,
    /// Runtime failure inside an operation; absorbed by sequences.
    Recoverable,
    /// Static pre-execution check failed.
    Validation,
    /// Program loading or callable registration failed.
    Structural,
}

/// Errors that can occur while registering, dispatching or executing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// No callable is registered under the target name.
    #[error("no predicate named '{name}'")]
    UnknownPredicate { name: String },

    /// Every candidate overload rejected the evaluated arguments.
    #[error("no overload of '{name}' accepts the given arguments{}", render_causes(.causes))]
    NoMatchingOverload { name: String, causes: Vec<EvalError> },

    /// Argument count does not fit the signature.
    #[error("expected {}{expected} argument(s), got {got}", at_least(.variadic))]
    ArityMismatch {
        expected: usize,
        got: usize,
        variadic: bool,
    },

    /// An actual value is not of the formal parameter's type.
    #[error("parameter {index} expects {expected}, got {got}")]
    ParameterType {
        index: usize,
        expected: String,
        got: String,
    },

    /// The unifier rejected a pattern/value pair.
    #[error("unification failed: {0}")]
    Unification(#[from] UnifyError),

    /// A referenced variable is not bound in the current context.
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    /// The destination pattern of an assignment did not unify.
    #[error("assignment failed: {cause}")]
    Assignment { cause: Box<EvalError> },

    /// A name was added twice to a binding table without override.
    #[error("variable '{name}' is already bound")]
    DuplicateBinding { name: String },

    /// Runtime failure raised by an operation or native callable.
    #[error("{message}")]
    Invocation { message: String },

    /// The operation has no meaning for the given value kind.
    #[error("unsupported operation '{operation}' on {kind}")]
    Unsupported { operation: String, kind: String },

    /// A variable is used before any operation defines it.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Registration or removal rejected by the overload's modifiers.
    #[error("cannot register '{name}': {reason}")]
    Registration { name: String, reason: String },

    /// Malformed program interchange JSON.
    #[error("load error: {message}")]
    Load { message: String },
}

impl EvalError {
    pub fn invocation(message: impl Into<String>) -> Self {
        EvalError::Invocation {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>, kind: impl Into<String>) -> Self {
        EvalError::Unsupported {
            operation: operation.into(),
            kind: kind.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        EvalError::Load {
            message: message.into(),
        }
    }

    /// Classify this error into the runtime's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UnknownPredicate { .. }
            | EvalError::NoMatchingOverload { .. }
            | EvalError::ArityMismatch { .. }
            | EvalError::ParameterType { .. }
            | EvalError::Unification(_) => ErrorKind::Dispatch,
            EvalError::UndefinedVariable { .. }
            | EvalError::Assignment { .. }
            | EvalError::DuplicateBinding { .. } => ErrorKind::Argument,
            EvalError::Invocation { .. } | EvalError::Unsupported { .. } => {
                ErrorKind::Recoverable
            }
            EvalError::Validation { .. } => ErrorKind::Validation,
            EvalError::Registration { .. } | EvalError::Load { .. } => ErrorKind::Structural,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }
}

fn at_least(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

fn render_causes(causes: &[EvalError]) -> String {
    let mut out = String::new();
    for (i, cause) in causes.iter().enumerate() {
        out.push_str(&format!("\n  candidate {}: {}", i, cause));
    }
    out
}
