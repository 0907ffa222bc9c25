//! Fixed operation catalog: name → (legality predicate, apply function).
//!
//! Dispatch is a single table lookup followed by a predicate check — no
//! name-based reflection. The catalog is built once at registry construction
//! and never mutated afterwards, so a shared `Registry` needs no locking.

use crate::value::Value;
use std::collections::HashMap;

/// One registered operation. `apply` is only ever invoked on stacks where
/// `legal` holds, and is written defensively anyway.
#[derive(Clone, Copy)]
pub struct Op {
    pub name: &'static str,
    pub legal: fn(&[Value]) -> bool,
    pub apply: fn(&mut Vec<Value>),
}

pub struct Registry {
    ops: HashMap<&'static str, Op>,
    catalog: Vec<&'static str>,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self {
            ops: HashMap::new(),
            catalog: Vec::new(),
        };

        // === Stack shufflers ===
        registry.insert("pop", legal_one, apply_pop);
        registry.insert("dup", legal_one, apply_dup);
        registry.insert("swap", legal_two, apply_swap);
        registry.insert("over", legal_two, apply_over);
        registry.insert("rot", legal_three, apply_rot);

        // === Literals (legal on every stack) ===
        registry.insert("zero", legal_always, apply_zero);
        registry.insert("true", legal_always, apply_true);
        registry.insert("false", legal_always, apply_false);

        // === Arithmetic ===
        registry.insert("succ", legal_top_numeric, apply_succ);
        registry.insert("pred", legal_top_numeric, apply_pred);
        registry.insert("add", legal_two_numeric, apply_add);
        registry.insert("sub", legal_two_numeric, apply_sub);
        registry.insert("mul", legal_two_numeric, apply_mul);
        registry.insert("div", legal_div, apply_div);

        // === Logic ===
        registry.insert("not", legal_top_bool, apply_not);
        registry.insert("and", legal_two_bool, apply_and);
        registry.insert("or", legal_two_bool, apply_or);
        registry.insert("eq", legal_two, apply_eq);
        registry.insert("neq", legal_two, apply_neq);
        registry.insert("gt", legal_two_numeric, apply_gt);

        // === Numeric conversion ===
        registry.insert("to_float", legal_top_int, apply_to_float);
        registry.insert("round", legal_top_float, apply_round);
        registry.insert("floor", legal_top_float, apply_floor);
        registry.insert("ceiling", legal_top_float, apply_ceiling);
        registry.insert("to_int", legal_to_int, apply_to_int);

        registry
    }

    fn insert(&mut self, name: &'static str, legal: fn(&[Value]) -> bool, apply: fn(&mut Vec<Value>)) {
        self.catalog.push(name);
        self.ops.insert(name, Op { name, legal, apply });
    }

    pub fn get(&self, name: &str) -> Option<&Op> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Catalog order: the order operations were registered in.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.catalog.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── legality predicates ─────────────────────────────────────────────────────

fn legal_always(_stack: &[Value]) -> bool {
    true
}

fn legal_one(stack: &[Value]) -> bool {
    !stack.is_empty()
}

fn legal_two(stack: &[Value]) -> bool {
    stack.len() >= 2
}

fn legal_three(stack: &[Value]) -> bool {
    stack.len() >= 3
}

fn legal_top_numeric(stack: &[Value]) -> bool {
    stack.last().is_some_and(Value::is_numeric)
}

fn legal_two_numeric(stack: &[Value]) -> bool {
    stack.len() >= 2
        && stack[stack.len() - 1].is_numeric()
        && stack[stack.len() - 2].is_numeric()
}

fn legal_div(stack: &[Value]) -> bool {
    if !legal_two_numeric(stack) {
        return false;
    }
    match stack[stack.len() - 1] {
        Value::Int(n) => n != 0,
        Value::Float(f) => f != 0.0,
        Value::Bool(_) => false,
    }
}

fn legal_top_bool(stack: &[Value]) -> bool {
    stack.last().is_some_and(Value::is_bool)
}

fn legal_two_bool(stack: &[Value]) -> bool {
    stack.len() >= 2
        && stack[stack.len() - 1].is_bool()
        && stack[stack.len() - 2].is_bool()
}

fn legal_top_int(stack: &[Value]) -> bool {
    matches!(stack.last(), Some(Value::Int(_)))
}

fn legal_top_float(stack: &[Value]) -> bool {
    matches!(stack.last(), Some(Value::Float(_)))
}

fn legal_to_int(stack: &[Value]) -> bool {
    match stack.last() {
        Some(Value::Float(f)) => {
            f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64
        }
        _ => false,
    }
}

// ─── apply functions ─────────────────────────────────────────────────────────

fn apply_pop(stack: &mut Vec<Value>) {
    stack.pop();
}

fn apply_dup(stack: &mut Vec<Value>) {
    let Some(top) = stack.last().cloned() else {
        return;
    };
    stack.push(top);
}

fn apply_swap(stack: &mut Vec<Value>) {
    let len = stack.len();
    if len >= 2 {
        stack.swap(len - 1, len - 2);
    }
}

fn apply_over(stack: &mut Vec<Value>) {
    let len = stack.len();
    if len >= 2 {
        let below = stack[len - 2].clone();
        stack.push(below);
    }
}

// ( x b a -- b a x )
fn apply_rot(stack: &mut Vec<Value>) {
    let len = stack.len();
    if len >= 3 {
        let third = stack.remove(len - 3);
        stack.push(third);
    }
}

fn apply_zero(stack: &mut Vec<Value>) {
    stack.push(Value::Int(0));
}

fn apply_true(stack: &mut Vec<Value>) {
    stack.push(Value::Bool(true));
}

fn apply_false(stack: &mut Vec<Value>) {
    stack.push(Value::Bool(false));
}

fn apply_succ(stack: &mut Vec<Value>) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Int(n) => Value::Int(n.wrapping_add(1)),
        Value::Float(f) => Value::Float(f + 1.0),
        other => other,
    });
}

fn apply_pred(stack: &mut Vec<Value>) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Int(n) => Value::Int(n.wrapping_sub(1)),
        Value::Float(f) => Value::Float(f - 1.0),
        other => other,
    });
}

fn apply_add(stack: &mut Vec<Value>) {
    binary_numeric(stack, i64::wrapping_add, |b, a| b + a);
}

fn apply_sub(stack: &mut Vec<Value>) {
    binary_numeric(stack, i64::wrapping_sub, |b, a| b - a);
}

fn apply_mul(stack: &mut Vec<Value>) {
    binary_numeric(stack, i64::wrapping_mul, |b, a| b * a);
}

fn apply_div(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    // Divisor is nonzero here: the legality predicate excludes Int(0) and
    // Float(0.0) before apply runs.
    stack.push(match (&b, &a) {
        (Value::Int(x), Value::Int(y)) => Value::Int(floor_div(*x, *y)),
        _ => Value::Float(b.as_f64().unwrap_or(0.0) / a.as_f64().unwrap_or(0.0)),
    });
}

fn apply_not(stack: &mut Vec<Value>) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Bool(b) => Value::Bool(!b),
        other => other,
    });
}

fn apply_and(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    let (x, y) = (b.as_bool().unwrap_or(false), a.as_bool().unwrap_or(false));
    stack.push(Value::Bool(x && y));
}

fn apply_or(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    let (x, y) = (b.as_bool().unwrap_or(false), a.as_bool().unwrap_or(false));
    stack.push(Value::Bool(x || y));
}

fn apply_eq(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    stack.push(Value::Bool(b == a));
}

fn apply_neq(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    stack.push(Value::Bool(b != a));
}

fn apply_gt(stack: &mut Vec<Value>) {
    let Some((b, a)) = pop_pair(stack) else { return };
    let gt = match (b.as_f64(), a.as_f64()) {
        (Some(x), Some(y)) => x > y,
        _ => false,
    };
    stack.push(Value::Bool(gt));
}

fn apply_to_float(stack: &mut Vec<Value>) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Int(n) => Value::Float(n as f64),
        other => other,
    });
}

fn apply_round(stack: &mut Vec<Value>) {
    map_float(stack, f64::round);
}

fn apply_floor(stack: &mut Vec<Value>) {
    map_float(stack, f64::floor);
}

fn apply_ceiling(stack: &mut Vec<Value>) {
    map_float(stack, f64::ceil);
}

fn apply_to_int(stack: &mut Vec<Value>) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Float(f) => Value::Int(f as i64),
        other => other,
    });
}

// ─── helpers ─────────────────────────────────────────────────────────────────

/// Pops `(below, top)`.
fn pop_pair(stack: &mut Vec<Value>) -> Option<(Value, Value)> {
    let a = stack.pop()?;
    let Some(b) = stack.pop() else {
        stack.push(a);
        return None;
    };
    Some((b, a))
}

fn binary_numeric(
    stack: &mut Vec<Value>,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) {
    let Some((b, a)) = pop_pair(stack) else { return };
    stack.push(match (&b, &a) {
        (Value::Int(x), Value::Int(y)) => Value::Int(int_op(*x, *y)),
        _ => Value::Float(float_op(
            b.as_f64().unwrap_or(0.0),
            a.as_f64().unwrap_or(0.0),
        )),
    });
}

fn map_float(stack: &mut Vec<Value>, op: fn(f64) -> f64) {
    let Some(top) = stack.pop() else { return };
    stack.push(match top {
        Value::Float(f) => Value::Float(op(f)),
        other => other,
    });
}

/// Floor division: rounds toward negative infinity, unlike Rust's `/` which
/// truncates toward zero.
fn floor_div(b: i64, a: i64) -> i64 {
    let q = b.wrapping_div(a);
    if b.wrapping_rem(a) != 0 && (b < 0) != (a < 0) {
        q.wrapping_sub(1)
    } else {
        q
    }
}
