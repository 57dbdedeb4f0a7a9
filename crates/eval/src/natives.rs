//! Built-in callable library.
//!
//! Natives register through [`ExecutionContext::add_sequence`] like any
//! program-defined callable and are dispatched the same way. Each reads
//! its arguments positionally from the callee context's binding table.

use std::rc::Rc;

use crate::context::{ExecutionContext, Modifiers};
use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::invoke::InvokeOperation;
use crate::signature::{FormalParameter, Signature, Type};
use crate::stack::CallStack;
use crate::value::{Graph, Value};

fn params(types: &[(Type, &str)]) -> Vec<FormalParameter> {
    types
        .iter()
        .map(|(ty, name)| FormalParameter::named(*ty, *name))
        .collect()
}

fn register<F>(
    context: &ExecutionContext,
    name: &str,
    signature: Signature,
    f: F,
) -> Result<(), EvalError>
where
    F: Fn(&mut ExecutionContext, &mut CallStack) -> Result<Value, EvalError> + 'static,
{
    let invocable = Invocable::native(name, signature, f);
    context.add_sequence(Rc::new(invocable), Modifiers::native_default())?;
    Ok(())
}

fn binary<F>(context: &ExecutionContext, name: &str, ty: Type, f: F) -> Result<(), EvalError>
where
    F: Fn(&Value, &Value) -> Result<Value, EvalError> + 'static,
{
    register(
        context,
        name,
        Signature::new(params(&[(ty, "a"), (ty, "b")])),
        move |ctx, _| {
            let args = ctx.variables();
            f(args.value_at(0)?, args.value_at(1)?)
        },
    )
}

fn numeric<F>(context: &ExecutionContext, name: &str, f: F) -> Result<(), EvalError>
where
    F: Fn(f64, f64) -> Result<f64, EvalError> + 'static,
{
    binary(context, name, Type::Numeric, move |a, b| {
        f(a.as_numeric(), b.as_numeric()).map(Value::Numeric)
    })
}

/// Register the built-in library into `context`'s callable table.
pub fn install(context: &ExecutionContext) -> Result<(), EvalError> {
    // ── Output ───────────────────────────────────────────────────────────
    register(context, "Print", Signature::varargs(Vec::new()), |ctx, _| {
        let parts: Vec<String> = ctx
            .variables()
            .varargs()
            .iter()
            .map(Value::as_string)
            .collect();
        let line = parts.join(" ");
        ctx.print(&line)?;
        Ok(Value::string(line))
    })?;

    // ── Arithmetic ───────────────────────────────────────────────────────
    numeric(context, "Add", |a, b| Ok(a + b))?;
    binary(context, "Add", Type::String, |a, b| {
        Ok(Value::string(format!("{}{}", a.as_string(), b.as_string())))
    })?;
    binary(context, "Add", Type::List, |a, b| {
        let mut items = a.as_list().borrow().clone();
        items.extend(b.as_list().borrow().iter().cloned());
        Ok(Value::list(items))
    })?;
    numeric(context, "Sub", |a, b| Ok(a - b))?;
    numeric(context, "Mul", |a, b| Ok(a * b))?;
    numeric(context, "Div", |a, b| {
        if b == 0.0 {
            Err(EvalError::invocation("division by zero"))
        } else {
            Ok(a / b)
        }
    })?;

    // ── Comparison ───────────────────────────────────────────────────────
    binary(context, "Equals", Type::Any, |a, b| {
        Ok(Value::Boolean(a.equals_to(b)))
    })?;
    binary(context, "Compare", Type::Any, |a, b| Ok(a.compares_to(b)))?;
    binary(context, "Less", Type::Any, |a, b| {
        Ok(Value::Boolean(a.compare(b).is_lt()))
    })?;
    binary(context, "Greater", Type::Any, |a, b| {
        Ok(Value::Boolean(a.compare(b).is_gt()))
    })?;

    // ── Values ───────────────────────────────────────────────────────────
    let one = |name: &str| Signature::new(params(&[(Type::Any, name)]));

    register(context, "Size", one("value"), |ctx, _| {
        let value = ctx.variables().value_at(0)?;
        let size = match value.unwrap_json() {
            Value::Null | Value::String(None) => 0,
            Value::String(Some(s)) => s.chars().count(),
            Value::List(items) => items.borrow().len(),
            Value::Map(entries) => entries.borrow().len(),
            Value::Graph(g) => g.borrow().node_count(),
            _ => 1,
        };
        Ok(Value::Numeric(size as f64))
    })?;
    register(context, "Clone", one("value"), |ctx, _| {
        ctx.variables().value_at(0)?.clone_value()
    })?;
    register(context, "ToJson", one("value"), |ctx, _| {
        let text = ctx.variables().value_at(0)?.to_json_string(false)?;
        Ok(Value::string(text))
    })?;
    register(
        context,
        "ParseJson",
        Signature::new(params(&[(Type::String, "text")])),
        |ctx, _| Value::parse_json(&ctx.variables().string_at(0)?),
    )?;
    register(
        context,
        "Graph",
        Signature::new(params(&[(Type::List, "triples")])),
        |ctx, _| {
            let items = ctx.variables().list_at(0)?;
            let graph = Graph::from_values(&items.borrow());
            Ok(Value::graph(graph))
        },
    )?;

    // ── Higher order ─────────────────────────────────────────────────────
    register(context, "Call", one("invocation"), |ctx, stack| {
        match ctx.variables().value_at(0)?.clone() {
            Value::Invocation(call) => call.execute_reentrant(ctx, stack),
            other => Err(EvalError::invocation(format!(
                "Call expects an invocation, got {}",
                other.type_name()
            ))),
        }
    })?;
    register(
        context,
        "Apply",
        Signature::varargs(params(&[(Type::Any, "target")])),
        |ctx, stack| {
            let target = ctx.variables().value_at(0)?.clone();
            let args = ctx.variables().varargs();
            match target.unwrap_json() {
                Value::Invocable(invocable) => invocable.invoke(ctx, stack, &args),
                Value::String(Some(name)) => {
                    let candidates = ctx.candidates(name);
                    InvokeOperation::dispatch(name, &candidates, ctx, stack, &args)
                }
                other => Err(EvalError::invocation(format!(
                    "Apply expects an invocable or a predicate name, got {}",
                    other.type_name()
                ))),
            }
        },
    )?;
    register(
        context,
        "Fail",
        Signature::new(params(&[(Type::String, "message")])),
        |ctx, _| Err(EvalError::invocation(ctx.variables().string_at(0)?)),
    )?;

    Ok(())
}
