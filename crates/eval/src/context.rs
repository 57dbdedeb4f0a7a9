//! Execution context: the process-wide callable table plus one frame of
//! variable bindings.
//!
//! Every context created while running one program shares the same
//! [`SequenceTable`]; each invocation gets a fresh binding table and a
//! fresh hand-off queue.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use tracing::debug;

use crate::binding::SignatureContextMap;
use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::print::{shared, SharedPrintSink, StdoutSink};
use crate::signature::Signature;
use crate::unify::{StructuralUnifier, Unifier};
use crate::value::Value;

// ──────────────────────────────────────────────
// Modifiers
// ──────────────────────────────────────────────

/// Registration flags of one overload entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const NATIVE: Modifiers = Modifiers(1);
    pub const DELETABLE: Modifiers = Modifiers(2);
    pub const OVERRIDABLE: Modifiers = Modifiers(4);
    pub const OVERLOADABLE: Modifiers = Modifiers(8);

    const NAMED: [(Modifiers, &'static str); 4] = [
        (Modifiers::NATIVE, "native"),
        (Modifiers::DELETABLE, "deletable"),
        (Modifiers::OVERRIDABLE, "overridable"),
        (Modifiers::OVERLOADABLE, "overloadable"),
    ];

    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags for program-defined callables.
    pub fn user_default() -> Modifiers {
        Modifiers::DELETABLE | Modifiers::OVERRIDABLE | Modifiers::OVERLOADABLE
    }

    /// Flags for the built-in library.
    pub fn native_default() -> Modifiers {
        Modifiers::NATIVE | Modifiers::OVERRIDABLE | Modifiers::OVERLOADABLE
    }

    pub fn names(self) -> Vec<&'static str> {
        Modifiers::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Parse lowercase flag names; unknown names yield `None`.
    pub fn from_names<'a, I>(names: I) -> Option<Modifiers>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Modifiers::NONE;
        for name in names {
            let (flag, _) = Modifiers::NAMED
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(name))?;
            out = out | *flag;
        }
        Some(out)
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(" "))
    }
}

// ──────────────────────────────────────────────
// Overload table
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OverloadEntry {
    /// Creation index, unique within one table.
    pub index: usize,
    pub invocable: Rc<Invocable>,
    pub modifiers: Modifiers,
}

/// Same-named entries in creation-index order.
#[derive(Debug, Clone, Default)]
pub struct Overload {
    entries: Vec<OverloadEntry>,
}

impl Overload {
    pub fn entries(&self) -> &[OverloadEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SequenceTable {
    overloads: HashMap<String, Overload>,
    next_index: usize,
}

pub type SharedSequenceTable = Rc<RefCell<SequenceTable>>;

impl SequenceTable {
    pub fn new() -> Self {
        SequenceTable::default()
    }

    /// Register an overload and return its creation index.
    ///
    /// An entry with the same signature is replaced in place, keeping its
    /// index, when it is OVERRIDABLE. A new signature may join a non-empty
    /// overload only when every existing entry is OVERLOADABLE.
    pub fn add(&mut self, invocable: Rc<Invocable>, modifiers: Modifiers) -> Result<usize, EvalError> {
        let name = invocable.name().to_string();
        let overload = self.overloads.entry(name.clone()).or_default();

        if let Some(entry) = overload
            .entries
            .iter_mut()
            .find(|e| e.invocable.signature().same_as(invocable.signature()))
        {
            if !entry.modifiers.contains(Modifiers::OVERRIDABLE) {
                return Err(EvalError::Registration {
                    name,
                    reason: format!("{} is not overridable", entry.invocable.describe()),
                });
            }
            debug!(predicate = %name, index = entry.index, "overload overridden");
            entry.invocable = invocable;
            entry.modifiers = modifiers;
            return Ok(entry.index);
        }

        if let Some(entry) = overload
            .entries
            .iter()
            .find(|e| !e.modifiers.contains(Modifiers::OVERLOADABLE))
        {
            return Err(EvalError::Registration {
                name,
                reason: format!("{} is not overloadable", entry.invocable.describe()),
            });
        }

        let index = self.next_index;
        self.next_index += 1;
        debug!(predicate = %name, index, signature = %invocable.signature(), "overload registered");
        overload.entries.push(OverloadEntry {
            index,
            invocable,
            modifiers,
        });
        Ok(index)
    }

    /// Remove one overload (by signature) or the whole set. Every removed
    /// entry must be DELETABLE; on refusal nothing is removed.
    pub fn remove(&mut self, name: &str, signature: Option<&Signature>) -> Result<usize, EvalError> {
        let overload = self
            .overloads
            .get_mut(name)
            .filter(|o| !o.is_empty())
            .ok_or_else(|| EvalError::UnknownPredicate {
                name: name.to_string(),
            })?;

        let selected = |e: &OverloadEntry| match signature {
            Some(sig) => e.invocable.signature().same_as(sig),
            None => true,
        };
        if let Some(entry) = overload
            .entries
            .iter()
            .find(|e| selected(e) && !e.modifiers.contains(Modifiers::DELETABLE))
        {
            return Err(EvalError::Registration {
                name: name.to_string(),
                reason: format!("{} is not deletable", entry.invocable.describe()),
            });
        }

        let before = overload.entries.len();
        overload.entries.retain(|e| !selected(e));
        let removed = before - overload.entries.len();
        if overload.entries.is_empty() {
            self.overloads.remove(name);
        }
        debug!(predicate = %name, removed, "overloads removed");
        Ok(removed)
    }

    /// Dispatch candidates in declaration order.
    pub fn candidates(&self, name: &str) -> Vec<Rc<Invocable>> {
        self.overloads
            .get(name)
            .map(|o| o.entries.iter().map(|e| Rc::clone(&e.invocable)).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Overload> {
        self.overloads.get(name)
    }

    /// Every entry across all names, in creation order.
    pub fn entries(&self) -> Vec<&OverloadEntry> {
        let mut all: Vec<&OverloadEntry> = self
            .overloads
            .values()
            .flat_map(|o| o.entries.iter())
            .collect();
        all.sort_by_key(|e| e.index);
        all
    }

    pub fn len(&self) -> usize {
        self.overloads.values().map(|o| o.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ──────────────────────────────────────────────
// ExecutionContext
// ──────────────────────────────────────────────

pub struct ExecutionContext {
    sequences: SharedSequenceTable,
    variables: SignatureContextMap,
    queue: VecDeque<Value>,
    unifier: Rc<dyn Unifier>,
    printer: SharedPrintSink,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("sequences", &self.sequences.borrow().len())
            .field("variables", &self.variables)
            .field("queue", &self.queue)
            .field("unifier", &self.unifier)
            .finish()
    }
}

impl ExecutionContext {
    /// Empty table, structural unifier, printing to stdout.
    pub fn new() -> Self {
        ExecutionContext::with_parts(Rc::new(StructuralUnifier), shared(StdoutSink))
    }

    pub fn with_parts(unifier: Rc<dyn Unifier>, printer: SharedPrintSink) -> Self {
        ExecutionContext {
            sequences: Rc::new(RefCell::new(SequenceTable::new())),
            variables: SignatureContextMap::new(),
            queue: VecDeque::new(),
            unifier,
            printer,
        }
    }

    /// Callee context: same callable table, unifier and printer; the given
    /// bindings as its only variables.
    pub fn child(&self, bindings: SignatureContextMap) -> ExecutionContext {
        ExecutionContext {
            sequences: Rc::clone(&self.sequences),
            variables: bindings,
            queue: VecDeque::new(),
            unifier: Rc::clone(&self.unifier),
            printer: Rc::clone(&self.printer),
        }
    }

    pub fn shares_sequences_with(&self, other: &ExecutionContext) -> bool {
        Rc::ptr_eq(&self.sequences, &other.sequences)
    }

    pub fn sequences(&self) -> &SharedSequenceTable {
        &self.sequences
    }

    pub fn add_sequence(
        &self,
        invocable: Rc<Invocable>,
        modifiers: Modifiers,
    ) -> Result<usize, EvalError> {
        self.sequences.borrow_mut().add(invocable, modifiers)
    }

    pub fn remove_sequence(
        &self,
        name: &str,
        signature: Option<&Signature>,
    ) -> Result<usize, EvalError> {
        self.sequences.borrow_mut().remove(name, signature)
    }

    pub fn candidates(&self, name: &str) -> Vec<Rc<Invocable>> {
        self.sequences.borrow().candidates(name)
    }

    pub fn variables(&self) -> &SignatureContextMap {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut SignatureContextMap {
        &mut self.variables
    }

    pub fn get_variable(&self, name: &str) -> Result<Value, EvalError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.set(name, value);
    }

    pub fn unifier(&self) -> &dyn Unifier {
        self.unifier.as_ref()
    }

    pub fn printer(&self) -> &SharedPrintSink {
        &self.printer
    }

    pub fn print(&self, line: &str) -> Result<(), EvalError> {
        self.printer
            .borrow_mut()
            .write_line(line)
            .map_err(|e| EvalError::invocation(format!("print failed: {}", e)))
    }

    pub fn enqueue(&mut self, value: Value) {
        self.queue.push_back(value);
    }

    pub fn dequeue(&mut self) -> Option<Value> {
        self.queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// One line per overload in creation order:
    /// `#index name(signature) [modifiers]`.
    pub fn get_context_sequences_short_description(&self) -> String {
        let table = self.sequences.borrow();
        let mut out = String::new();
        for entry in table.entries() {
            out.push_str(&format!(
                "#{} {} [{}]\n",
                entry.index,
                entry.invocable.describe(),
                entry.modifiers
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationSequence;
    use crate::signature::{FormalParameter, Type};

    fn user(name: &str, ty: Type) -> Rc<Invocable> {
        Rc::new(Invocable::sequence(
            name,
            Signature::new(vec![FormalParameter::named(ty, "x")]),
            Rc::new(OperationSequence::default()),
        ))
    }

    #[test]
    fn modifiers_round_trip_names() {
        let m = Modifiers::user_default();
        assert_eq!(m.names(), vec!["deletable", "overridable", "overloadable"]);
        assert_eq!(Modifiers::from_names(m.names()), Some(m));
        assert_eq!(Modifiers::from_names(["sticky"]), None);
    }

    #[test]
    fn override_keeps_creation_index() {
        let mut table = SequenceTable::new();
        let first = table.add(user("f", Type::Numeric), Modifiers::user_default()).unwrap();
        let second = table.add(user("f", Type::String), Modifiers::user_default()).unwrap();
        let again = table.add(user("f", Type::Numeric), Modifiers::user_default()).unwrap();
        assert_eq!((first, second, again), (0, 1, 0));
        assert_eq!(table.candidates("f").len(), 2);
    }

    #[test]
    fn registration_honours_modifiers() {
        let mut table = SequenceTable::new();
        table.add(user("g", Type::Numeric), Modifiers::NONE).unwrap();
        assert!(matches!(
            table.add(user("g", Type::Numeric), Modifiers::user_default()),
            Err(EvalError::Registration { .. })
        ));
        assert!(matches!(
            table.add(user("g", Type::String), Modifiers::user_default()),
            Err(EvalError::Registration { .. })
        ));
        assert!(matches!(
            table.remove("g", None),
            Err(EvalError::Registration { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_by_signature() {
        let mut table = SequenceTable::new();
        table.add(user("h", Type::Numeric), Modifiers::user_default()).unwrap();
        table.add(user("h", Type::String), Modifiers::user_default()).unwrap();
        let numeric = Signature::new(vec![FormalParameter::named(Type::Numeric, "y")]);
        assert_eq!(table.remove("h", Some(&numeric)).unwrap(), 1);
        assert_eq!(table.remove("h", None).unwrap(), 1);
        assert!(matches!(
            table.remove("h", None),
            Err(EvalError::UnknownPredicate { .. })
        ));
    }

    #[test]
    fn child_shares_table_but_not_variables() {
        let mut parent = ExecutionContext::new();
        parent.set_variable("x", Value::from(1));
        let child = parent.child(SignatureContextMap::new());
        assert!(child.shares_sequences_with(&parent));
        assert!(child.get_variable("x").is_err());

        child.add_sequence(user("k", Type::Any), Modifiers::user_default()).unwrap();
        assert_eq!(parent.candidates("k").len(), 1);
    }

    #[test]
    fn indices_are_scoped_per_context() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();
        assert_eq!(a.add_sequence(user("f", Type::Any), Modifiers::user_default()).unwrap(), 0);
        assert_eq!(b.add_sequence(user("f", Type::Any), Modifiers::user_default()).unwrap(), 0);
    }

    #[test]
    fn short_description_in_creation_order() {
        let ctx = ExecutionContext::new();
        ctx.add_sequence(user("b", Type::Numeric), Modifiers::user_default()).unwrap();
        ctx.add_sequence(user("a", Type::String), Modifiers::NONE).unwrap();
        let text = ctx.get_context_sequences_short_description();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#0 b(NUMERIC x) [deletable overridable overloadable]");
        assert_eq!(lines[1], "#1 a(STRING x) []");
    }

    #[test]
    fn queue_is_fifo() {
        let mut ctx = ExecutionContext::new();
        ctx.enqueue(Value::from(1));
        ctx.enqueue(Value::from(2));
        assert_eq!(ctx.dequeue(), Some(Value::from(1)));
        assert_eq!(ctx.queue_len(), 1);
    }
}
