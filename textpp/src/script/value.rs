//! Runtime value type for the embedded language.
//!
//! Values follow Python conventions closely enough that documents written for
//! a Python-hosted preprocessor keep producing the same text: `str(True)` is
//! `True`, floats always carry a fractional part, and lists are shared
//! mutable objects.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::builtins::Builtin;
use super::interp::Function;
use super::libs::Module;
use crate::store::VarStore;

/// Largest string or list storage, in bytes, that an operation may build.
pub const MAX_SIZE: usize = 1 << 28;

/// Container nesting followed by `==` and `<` before a `RecursionError`.
pub const MAX_NESTING: usize = 1000;

/// A host-provided computed value: invoked with the variable store whenever
/// the value is read through macro substitution.
#[derive(Clone)]
pub struct NativeFn(pub Rc<dyn Fn(&VarStore) -> String>);

impl NativeFn {
    pub fn new(f: impl Fn(&VarStore) -> String + 'static) -> Self {
        NativeFn(Rc::new(f))
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn")
    }
}

/// An embedded-language runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Range { start: i64, stop: i64, step: i64 },
    Func(Rc<Function>),
    Native(NativeFn),
    Builtin(Builtin),
    Module(Module),
    /// Handle onto the shared variable store (`d` / `defines`).
    Vars,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    /// Python truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Range { .. } => "range",
            Value::Func(_) => "function",
            Value::Native(_) => "native_function",
            Value::Builtin(_) => "builtin_function",
            Value::Module(_) => "module",
            Value::Vars => "defines",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Func(_) | Value::Native(_) | Value::Builtin(_)
        )
    }

    /// Python `repr()`: strings are quoted, everything else formats as `str()`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote_str(s),
            _ => self.to_string(),
        }
    }

    // ── Coercions ─────────────────────────────────────────────────────────────

    /// Integer view for indexes, counts and `int` arithmetic.
    pub fn as_int(&self) -> Result<i64, String> {
        match self {
            Value::Bool(b) => Ok(*b as i64),
            Value::Int(n) => Ok(*n),
            other => Err(format!(
                "TypeError: expected an integer, got {}",
                other.type_name()
            )),
        }
    }

    pub fn as_float(&self) -> Result<f64, String> {
        match self {
            Value::Bool(b) => Ok(*b as i64 as f64),
            Value::Int(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            other => Err(format!(
                "TypeError: expected a number, got {}",
                other.type_name()
            )),
        }
    }

    pub fn as_str(&self) -> Result<&str, String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(format!(
                "TypeError: expected a string, got {}",
                other.type_name()
            )),
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    // ── Sequences ─────────────────────────────────────────────────────────────

    pub fn len(&self) -> Result<usize, String> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.borrow().len()),
            Value::Tuple(items) => Ok(items.len()),
            Value::Range { start, stop, step } => usize::try_from(range_len(*start, *stop, *step))
                .ok()
                .filter(|&n| n <= i64::MAX as usize)
                .ok_or_else(|| "OverflowError: range has too many items".to_owned()),
            other => Err(format!(
                "TypeError: object of type '{}' has no len()",
                other.type_name()
            )),
        }
    }

    /// Iterate the value the way a `for` loop does.  Lists are snapshotted.
    pub fn iterate(&self) -> Result<Box<dyn Iterator<Item = Value>>, String> {
        match self {
            Value::Str(s) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                Ok(Box::new(chars.into_iter()))
            }
            Value::List(items) => Ok(Box::new(items.borrow().clone().into_iter())),
            Value::Tuple(items) => Ok(Box::new(items.as_ref().clone().into_iter())),
            Value::Range { start, stop, step } => {
                let (start, stop, step) = (*start, *stop, *step);
                Ok(Box::new(
                    (0..range_len(start, stop, step)).map(move |i| Value::Int(range_item(start, step, i))),
                ))
            }
            other => Err(format!(
                "TypeError: '{}' object is not iterable",
                other.type_name()
            )),
        }
    }

    pub fn collect_items(&self) -> Result<Vec<Value>, String> {
        if let Value::Range { start, stop, step } = self {
            check_items(usize::try_from(range_len(*start, *stop, *step)).unwrap_or(usize::MAX))?;
        }
        Ok(self.iterate()?.collect())
    }

    pub fn get_item(&self, index: &Value) -> Result<Value, String> {
        let len = self.len()?;
        let i = index.as_int()?;
        let pos = normalize_index(i, len)
            .ok_or_else(|| format!("IndexError: {} index out of range", self.type_name()))?;
        match self {
            Value::Str(s) => Ok(Value::Str(
                s.chars().nth(pos).map(String::from).unwrap_or_default(),
            )),
            Value::List(items) => Ok(items.borrow()[pos].clone()),
            Value::Tuple(items) => Ok(items[pos].clone()),
            Value::Range { start, step, .. } => Ok(Value::Int(range_item(*start, *step, pos as u64))),
            other => Err(format!(
                "TypeError: '{}' object is not subscriptable",
                other.type_name()
            )),
        }
    }

    pub fn set_item(&self, index: &Value, value: Value) -> Result<(), String> {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let pos = normalize_index(index.as_int()?, items.len())
                    .ok_or_else(|| "IndexError: list assignment index out of range".to_owned())?;
                items[pos] = value;
                Ok(())
            }
            other => Err(format!(
                "TypeError: '{}' object does not support item assignment",
                other.type_name()
            )),
        }
    }

    pub fn slice(&self, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Result<Value, String> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err("ValueError: slice step cannot be zero".into());
        }
        if !matches!(self, Value::Str(_) | Value::List(_) | Value::Tuple(_)) {
            return Err(format!(
                "TypeError: '{}' object is not subscriptable",
                self.type_name()
            ));
        }
        let positions = slice_positions(self.len()?, start, stop, step);
        match self {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(positions.iter().map(|&p| chars[p]).collect()))
            }
            Value::List(items) => {
                let items = items.borrow();
                Ok(Value::list(positions.iter().map(|&p| items[p].clone()).collect()))
            }
            Value::Tuple(items) => Ok(Value::tuple(
                positions.iter().map(|&p| items[p].clone()).collect(),
            )),
            other => Err(format!(
                "TypeError: '{}' object is not subscriptable",
                other.type_name()
            )),
        }
    }

    /// Python `item in self`.
    pub fn contains(&self, item: &Value) -> Result<bool, String> {
        match self {
            Value::Str(s) => Ok(s.contains(item.as_str()?)),
            Value::List(items) => contains_item(&items.borrow(), item),
            Value::Tuple(items) => contains_item(items, item),
            Value::Range { start, stop, step } => {
                let Ok(n) = item.as_int() else { return Ok(false) };
                let (n, start, stop, step) = (n as i128, *start as i128, *stop as i128, *step as i128);
                let in_bounds = if step > 0 {
                    n >= start && n < stop
                } else {
                    n <= start && n > stop
                };
                Ok(in_bounds && (n - start) % step == 0)
            }
            other => Err(format!(
                "TypeError: argument of type '{}' is not iterable",
                other.type_name()
            )),
        }
    }

    // ── Comparison ────────────────────────────────────────────────────────────

    /// Python `==`.  Fails only when nesting runs past [`MAX_NESTING`].
    pub fn equals(&self, rhs: &Value) -> Result<bool, String> {
        self.equals_at(rhs, 0)
    }

    fn equals_at(&self, rhs: &Value, depth: usize) -> Result<bool, String> {
        if depth > MAX_NESTING {
            return Err("RecursionError: maximum recursion depth exceeded in comparison".into());
        }
        match (self, rhs) {
            (a, b) if a.is_number() && b.is_number() => {
                Ok(matches!(a.compare(b), Ok(Ordering::Equal)))
            }
            (Value::None, Value::None) => Ok(true),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                equals_seq(&a.borrow(), &b.borrow(), depth)
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                equals_seq(a, b, depth)
            }
            (
                Value::Range { start: a0, stop: a1, step: a2 },
                Value::Range { start: b0, stop: b1, step: b2 },
            ) => Ok((a0, a1, a2) == (b0, b1, b2)),
            (Value::Native(a), Value::Native(b)) => Ok(Rc::ptr_eq(&a.0, &b.0)),
            _ => Ok(self.is(rhs)),
        }
    }

    /// Ordering used by `<`, `sorted`, `min` and `max`.
    pub fn compare(&self, rhs: &Value) -> Result<Ordering, String> {
        self.compare_at(rhs, 0)
    }

    fn compare_at(&self, rhs: &Value, depth: usize) -> Result<Ordering, String> {
        if depth > MAX_NESTING {
            return Err("RecursionError: maximum recursion depth exceeded in comparison".into());
        }
        match (self, rhs) {
            (a, b) if a.is_number() && b.is_number() => {
                if let (Ok(x), Ok(y), false, false) = (a.as_int(), b.as_int(), a.is_float(), b.is_float()) {
                    return Ok(x.cmp(&y));
                }
                let (x, y) = (a.as_float()?, b.as_float()?);
                x.partial_cmp(&y)
                    .ok_or_else(|| "ValueError: cannot order NaN".to_owned())
            }
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) if Rc::ptr_eq(a, b) => Ok(Ordering::Equal),
            (Value::List(a), Value::List(b)) => compare_seq(&a.borrow(), &b.borrow(), depth),
            (Value::Tuple(a), Value::Tuple(b)) => compare_seq(a, b, depth),
            (a, b) => Err(format!(
                "TypeError: '<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            )),
        }
    }

    /// Python `is`: identity for shared objects, equality for immutables.
    pub fn is(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Vars, Value::Vars) => true,
            _ => false,
        }
    }

    // ── Arithmetic ────────────────────────────────────────────────────────────

    pub fn add(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => {
                check_size(a.len().saturating_add(b.len()))?;
                Ok(Value::Str(format!("{a}{b}")))
            }
            (Value::List(a), Value::List(b)) => {
                check_items(a.borrow().len().saturating_add(b.borrow().len()))?;
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                check_items(a.len().saturating_add(b.len()))?;
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::tuple(items))
            }
            _ => numeric(self, rhs, "+", i64::checked_add, |x, y| x + y),
        }
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, String> {
        numeric(self, rhs, "-", i64::checked_sub, |x, y| x - y)
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Str(s), n @ (Value::Int(_) | Value::Bool(_)))
            | (n @ (Value::Int(_) | Value::Bool(_)), Value::Str(s)) => {
                let times = repeat_count(s.len(), n.as_int()?)?;
                Ok(Value::Str(s.repeat(times)))
            }
            (Value::List(items), n @ (Value::Int(_) | Value::Bool(_)))
            | (n @ (Value::Int(_) | Value::Bool(_)), Value::List(items)) => {
                let items = items.borrow();
                let unit = items.len().saturating_mul(std::mem::size_of::<Value>());
                let times = repeat_count(unit, n.as_int()?)?;
                let mut out = Vec::with_capacity(items.len() * times);
                for _ in 0..times {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::list(out))
            }
            _ => numeric(self, rhs, "*", i64::checked_mul, |x, y| x * y),
        }
    }

    /// True division always yields a float.
    pub fn div(&self, rhs: &Value) -> Result<Value, String> {
        let (x, y) = float_operands(self, rhs, "/")?;
        if y == 0.0 {
            return Err("ZeroDivisionError: division by zero".into());
        }
        Ok(Value::Float(x / y))
    }

    pub fn floor_div(&self, rhs: &Value) -> Result<Value, String> {
        if let (Some(a), Some(b)) = (int_operand(self), int_operand(rhs)) {
            if b == 0 {
                return Err("ZeroDivisionError: integer division by zero".into());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let q = if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q };
            return Ok(Value::Int(q));
        }
        let (x, y) = float_operands(self, rhs, "//")?;
        if y == 0.0 {
            return Err("ZeroDivisionError: float floor division by zero".into());
        }
        Ok(Value::Float((x / y).floor()))
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value, String> {
        if let (Some(a), Some(b)) = (int_operand(self), int_operand(rhs)) {
            if b == 0 {
                return Err("ZeroDivisionError: integer modulo by zero".into());
            }
            // Only i64::MIN % -1 wraps, and its remainder is 0.
            let r = a.wrapping_rem(b);
            let r = if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r };
            return Ok(Value::Int(r));
        }
        let (x, y) = float_operands(self, rhs, "%")?;
        if y == 0.0 {
            return Err("ZeroDivisionError: float modulo".into());
        }
        let r = x % y;
        Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
    }

    pub fn pow(&self, rhs: &Value) -> Result<Value, String> {
        if let (Some(a), Some(b)) = (int_operand(self), int_operand(rhs)) {
            if b >= 0 {
                let exp = u32::try_from(b).map_err(|_| overflow())?;
                return a.checked_pow(exp).map(Value::Int).ok_or_else(overflow);
            }
        }
        let (x, y) = float_operands(self, rhs, "**")?;
        if x == 0.0 && y < 0.0 {
            return Err("ZeroDivisionError: 0.0 cannot be raised to a negative power".into());
        }
        Ok(Value::Float(x.powf(y)))
    }

    pub fn neg(&self) -> Result<Value, String> {
        match self {
            Value::Float(x) => Ok(Value::Float(-x)),
            v => match int_operand(v) {
                Some(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
                None => Err(format!("TypeError: bad operand type for unary -: '{}'", v.type_name())),
            },
        }
    }

    pub fn bit_op(&self, rhs: &Value, op: &str) -> Result<Value, String> {
        let (Some(a), Some(b)) = (int_operand(self), int_operand(rhs)) else {
            return Err(format!(
                "TypeError: unsupported operand type(s) for {op}: '{}' and '{}'",
                self.type_name(),
                rhs.type_name()
            ));
        };
        Ok(Value::Int(match op {
            "&" => a & b,
            "|" => a | b,
            "^" => a ^ b,
            "<<" | ">>" if b < 0 => return Err("ValueError: negative shift count".into()),
            "<<" if a == 0 => 0,
            "<<" => u32::try_from(b)
                .ok()
                .and_then(|shift| a.checked_shl(shift).filter(|r| r >> shift == a))
                .ok_or_else(overflow)?,
            ">>" => a >> b.min(63),
            _ => return Err(format!("unknown bitwise operator {op}")),
        }))
    }
}

// ── Arithmetic helpers ────────────────────────────────────────────────────────

fn overflow() -> String {
    "OverflowError: integer result out of range".into()
}

fn int_operand(v: &Value) -> Option<i64> {
    match v {
        Value::Bool(b) => Some(*b as i64),
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

fn float_operands(a: &Value, b: &Value, op: &str) -> Result<(f64, f64), String> {
    match (a.as_float(), b.as_float()) {
        (Ok(x), Ok(y)) => Ok((x, y)),
        _ => Err(format!(
            "TypeError: unsupported operand type(s) for {op}: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )),
    }
}

fn numeric(
    a: &Value,
    b: &Value,
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    if let (Some(x), Some(y)) = (int_operand(a), int_operand(b)) {
        return int_op(x, y).map(Value::Int).ok_or_else(overflow);
    }
    let (x, y) = float_operands(a, b, op)?;
    Ok(Value::Float(float_op(x, y)))
}

/// Fail with `MemoryError` when a result of `len` bytes or items is too big.
pub(crate) fn check_size(len: usize) -> Result<(), String> {
    if len > MAX_SIZE {
        return Err(format!("MemoryError: result of size {len} exceeds the limit of {MAX_SIZE}"));
    }
    Ok(())
}

/// Fail with `MemoryError` when `count` list or tuple items would take more
/// than [`MAX_SIZE`] bytes.
pub(crate) fn check_items(count: usize) -> Result<(), String> {
    check_size(count.saturating_mul(std::mem::size_of::<Value>()))
}

/// Repetitions for `seq * n`, with negative counts meaning none.
fn repeat_count(unit: usize, n: i64) -> Result<usize, String> {
    if unit == 0 || n <= 0 {
        return Ok(0);
    }
    let times = usize::try_from(n).map_err(|_| overflow())?;
    check_size(unit.saturating_mul(times))?;
    Ok(times)
}

fn contains_item(items: &[Value], item: &Value) -> Result<bool, String> {
    for v in items {
        if v.is(item) || v.equals(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn equals_seq(a: &[Value], b: &[Value], depth: usize) -> Result<bool, String> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.is(y) && !super::grow(|| x.equals_at(y, depth + 1))? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare_seq(a: &[Value], b: &[Value], depth: usize) -> Result<Ordering, String> {
    for (x, y) in a.iter().zip(b) {
        if x.is(y) {
            continue;
        }
        match super::grow(|| x.compare_at(y, depth + 1))? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

// ── Index helpers ─────────────────────────────────────────────────────────────

/// Number of items in `range(start, stop, step)`.  Always fits in a `u64`.
pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> u64 {
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let n = if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    };
    n as u64
}

/// Item `i` of a range.  The true value lies between `start` and `stop`, so
/// wrapping arithmetic gives it exactly.
fn range_item(start: i64, step: i64, i: u64) -> i64 {
    start.wrapping_add((i as i64).wrapping_mul(step))
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    (0..len).contains(&i).then_some(i as usize)
}

/// Positions selected by `seq[start:stop:step]`.
fn slice_positions(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let clamp = |v: i64, lo: i64, hi: i64| {
        let v = if v < 0 { v + len } else { v };
        v.clamp(lo, hi)
    };
    let mut out = Vec::new();
    if step > 0 {
        let (mut i, end) = (
            start.map_or(0, |s| clamp(s, 0, len)),
            stop.map_or(len, |s| clamp(s, 0, len)),
        );
        while i < end {
            out.push(i as usize);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    } else {
        let (mut i, end) = (
            start.map_or(len - 1, |s| clamp(s, -1, len - 1)),
            stop.map_or(-1, |s| clamp(s, -1, len - 1)),
        );
        while i > end {
            out.push(i as usize);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    }
    out
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python-style float formatting: `2.0`, `0.5`, `1e+20`, `inf`.
pub(crate) fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let a = x.abs();
    if a != 0.0 && !(1e-4..1e16).contains(&a) {
        let s = format!("{x:e}");
        let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exp),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Lists currently being written, outermost first.  A list met again while
/// open is printed as `[...]`.
type OpenLists = Vec<*const RefCell<Vec<Value>>>;

fn write_list(f: &mut fmt::Formatter<'_>, items: &Rc<RefCell<Vec<Value>>>, open: &mut OpenLists) -> fmt::Result {
    let ptr = Rc::as_ptr(items);
    if open.contains(&ptr) {
        return f.write_str("[...]");
    }
    open.push(ptr);
    f.write_str("[")?;
    let written = write_items(f, &items.borrow(), open);
    open.pop();
    written?;
    f.write_str("]")
}

fn write_tuple(f: &mut fmt::Formatter<'_>, items: &[Value], open: &mut OpenLists) -> fmt::Result {
    f.write_str("(")?;
    write_items(f, items, open)?;
    if items.len() == 1 {
        f.write_str(",")?;
    }
    f.write_str(")")
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value], open: &mut OpenLists) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        super::grow(|| match item {
            Value::Str(s) => f.write_str(&quote_str(s)),
            Value::List(inner) => write_list(f, inner, open),
            Value::Tuple(inner) => write_tuple(f, inner, open),
            other => write!(f, "{other}"),
        })?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => write_list(f, items, &mut Vec::new()),
            Value::Tuple(items) => write_tuple(f, items, &mut Vec::new()),
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    write!(f, "range({start}, {stop})")
                } else {
                    write!(f, "range({start}, {stop}, {step})")
                }
            }
            Value::Func(func) => write!(f, "<function {}>", func.name()),
            Value::Native(_) => f.write_str("<native function>"),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::Module(m) => write!(f, "<module '{}'>", m.name()),
            Value::Vars => f.write_str("<defines>"),
        }
    }
}

/// Python `==`; values nested too deeply to compare are unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
