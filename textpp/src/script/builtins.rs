//! Built-in functions and methods available to embedded code.
//!
//! Only pure functions live here.  Each receives already-evaluated arguments
//! and returns `Result<Value, String>`; the interpreter turns the error string
//! into a runtime error carrying the current line.  Built-ins that need the
//! host (`out`, `include`, attribute access on the store) or that call back
//! into script functions (`map`, `filter`) are handled by the interpreter.

use std::cell::RefCell;
use std::cmp::Ordering;

use super::value::{check_items, check_size, format_float, Value};

// ── Builtin table ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Out,
    Include,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    Len,
    Range,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    Reversed,
    Enumerate,
    Zip,
    List,
    Tuple,
    Round,
    Ord,
    Chr,
    Hex,
    Oct,
    Bin,
    Any,
    All,
    Divmod,
    Pow,
    Format,
    Map,
    Filter,
    Callable,
    Getattr,
    Hasattr,
    Setattr,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("out", Builtin::Out),
    ("include", Builtin::Include),
    ("str", Builtin::Str),
    ("repr", Builtin::Repr),
    ("int", Builtin::Int),
    ("float", Builtin::Float),
    ("bool", Builtin::Bool),
    ("len", Builtin::Len),
    ("range", Builtin::Range),
    ("abs", Builtin::Abs),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("sum", Builtin::Sum),
    ("sorted", Builtin::Sorted),
    ("reversed", Builtin::Reversed),
    ("enumerate", Builtin::Enumerate),
    ("zip", Builtin::Zip),
    ("list", Builtin::List),
    ("tuple", Builtin::Tuple),
    ("round", Builtin::Round),
    ("ord", Builtin::Ord),
    ("chr", Builtin::Chr),
    ("hex", Builtin::Hex),
    ("oct", Builtin::Oct),
    ("bin", Builtin::Bin),
    ("any", Builtin::Any),
    ("all", Builtin::All),
    ("divmod", Builtin::Divmod),
    ("pow", Builtin::Pow),
    ("format", Builtin::Format),
    ("map", Builtin::Map),
    ("filter", Builtin::Filter),
    ("callable", Builtin::Callable),
    ("getattr", Builtin::Getattr),
    ("hasattr", Builtin::Hasattr),
    ("setattr", Builtin::Setattr),
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }

    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(format!(
            "TypeError: {name}() takes {expected} argument(s) ({} given)",
            args.len()
        ));
    }
    Ok(())
}

fn get_str<'a>(args: &'a [Value], idx: usize, name: &str) -> Result<&'a str, String> {
    args.get(idx)
        .ok_or_else(|| format!("{name}: argument {idx} missing"))?
        .as_str()
}

fn get_int(args: &[Value], idx: usize, name: &str) -> Result<i64, String> {
    args.get(idx)
        .ok_or_else(|| format!("{name}: argument {idx} missing"))?
        .as_int()
}

/// Sort in place with Python ordering, reporting the first incomparable pair.
pub(crate) fn sort_values(items: &mut [Value]) -> Result<(), String> {
    let mut err = None;
    items.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|e| {
            err.get_or_insert(e);
            Ordering::Equal
        })
    });
    err.map_or(Ok(()), Err)
}

fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, String> {
    let items = if args.len() == 1 {
        args[0].collect_items()?
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| format!("ValueError: {name}() arg is an empty sequence"))?;
    for item in iter {
        if item.compare(&best)? == want {
            best = item;
        }
    }
    Ok(best)
}

/// Largest precision accepted by format specs and `%` conversions.
const MAX_PRECISION: usize = u16::MAX as usize;

/// Convert an integral float to `int`, failing outside the 64-bit range.
pub(crate) fn float_to_int(x: f64) -> Result<i64, String> {
    if x.is_nan() {
        return Err("ValueError: cannot convert float NaN to integer".into());
    }
    if x.is_infinite() {
        return Err("OverflowError: cannot convert float infinity to integer".into());
    }
    // 2^63 is exact as an f64; every float below it and at or above -2^63 fits.
    if !(-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&x) {
        return Err(format!("OverflowError: float {} is out of the int range", format_float(x)));
    }
    Ok(x as i64)
}

fn code_point(n: i64, what: &str) -> Result<char, String> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("ValueError: {what} arg not in range(0x110000)"))
}

/// `round(x, ndigits)` for floats.
fn round_to(x: f64, ndigits: i64) -> f64 {
    if !x.is_finite() || ndigits > 308 {
        return x;
    }
    if ndigits < -308 {
        return 0.0f64.copysign(x);
    }
    let scale = 10f64.powi(ndigits as i32);
    let scaled = x * scale;
    if !scaled.is_finite() {
        return x;
    }
    round_half_even(scaled) / scale
}

/// Width for `ljust`, `rjust`, `center` and `zfill`.
fn pad_width(n: i64) -> Result<usize, String> {
    let width = usize::try_from(n.max(0)).map_err(|_| "OverflowError: width too large".to_owned())?;
    check_size(width)?;
    Ok(width)
}

/// A run of decimal digits in a format spec.
fn spec_number(chars: &[char], i: &mut usize) -> Result<usize, String> {
    let mut n = 0usize;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(d as usize))
            .ok_or_else(|| "ValueError: Too many decimal digits in format string".to_owned())?;
        *i += 1;
    }
    Ok(n)
}

fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        r
    }
}

fn radix_string(n: i64, prefix: &str, radix: u32) -> String {
    let digits = match radix {
        16 => format!("{:x}", n.unsigned_abs()),
        8 => format!("{:o}", n.unsigned_abs()),
        _ => format!("{:b}", n.unsigned_abs()),
    };
    let sign = if n < 0 { "-" } else { "" };
    format!("{sign}{prefix}{digits}")
}

fn parse_int(s: &str, base: u32) -> Result<i64, String> {
    let t = s.trim().replace('_', "");
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(&t)),
    };
    let digits = match base {
        16 => digits.trim_start_matches("0x").trim_start_matches("0X"),
        8 => digits.trim_start_matches("0o").trim_start_matches("0O"),
        2 => digits.trim_start_matches("0b").trim_start_matches("0B"),
        _ => digits,
    };
    let magnitude = i64::from_str_radix(digits, base)
        .map_err(|_| format!("ValueError: invalid literal for int() with base {base}: {s:?}"))?;
    Ok(if neg { -magnitude } else { magnitude })
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Call a pure built-in.  Host-dependent built-ins return an error here.
pub fn call_builtin(b: Builtin, args: Vec<Value>) -> Result<Value, String> {
    let name = b.name();
    Ok(match b {
        Builtin::Str => {
            arity(name, &args, 0, 1)?;
            Value::Str(args.first().map(Value::to_string).unwrap_or_default())
        }
        Builtin::Repr => {
            arity(name, &args, 1, 1)?;
            Value::Str(args[0].repr())
        }
        Builtin::Int => {
            arity(name, &args, 0, 2)?;
            match args.first() {
                None => Value::Int(0),
                Some(Value::Str(s)) => {
                    let base = if args.len() == 2 { get_int(&args, 1, name)? } else { 10 };
                    if !(2..=36).contains(&base) {
                        return Err("ValueError: int() base must be >= 2 and <= 36".into());
                    }
                    Value::Int(parse_int(s, base as u32)?)
                }
                Some(Value::Float(x)) => Value::Int(float_to_int(x.trunc())?),
                Some(v) => Value::Int(v.as_int()?),
            }
        }
        Builtin::Float => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Value::Float(0.0),
                Some(Value::Str(s)) => Value::Float(
                    s.trim()
                        .parse()
                        .map_err(|_| format!("ValueError: could not convert string to float: {s:?}"))?,
                ),
                Some(v) => Value::Float(v.as_float()?),
            }
        }
        Builtin::Bool => {
            arity(name, &args, 0, 1)?;
            Value::Bool(args.first().map(Value::truthy).unwrap_or(false))
        }
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            Value::Int(args[0].len()? as i64)
        }
        Builtin::Range => {
            arity(name, &args, 1, 3)?;
            let (start, stop, step) = match args.len() {
                1 => (0, get_int(&args, 0, name)?, 1),
                2 => (get_int(&args, 0, name)?, get_int(&args, 1, name)?, 1),
                _ => (
                    get_int(&args, 0, name)?,
                    get_int(&args, 1, name)?,
                    get_int(&args, 2, name)?,
                ),
            };
            if step == 0 {
                return Err("ValueError: range() arg 3 must not be zero".into());
            }
            Value::Range { start, stop, step }
        }
        Builtin::Abs => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Float(x) => Value::Float(x.abs()),
                v => Value::Int(
                    v.as_int()?
                        .checked_abs()
                        .ok_or("OverflowError: integer result out of range")?,
                ),
            }
        }
        Builtin::Min => extreme(name, args, Ordering::Less)?,
        Builtin::Max => extreme(name, args, Ordering::Greater)?,
        Builtin::Sum => {
            arity(name, &args, 1, 2)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            for item in args[0].iterate()? {
                total = total.add(&item)?;
            }
            total
        }
        Builtin::Sorted => {
            arity(name, &args, 1, 1)?;
            let mut items = args[0].collect_items()?;
            sort_values(&mut items)?;
            Value::list(items)
        }
        Builtin::Reversed => {
            arity(name, &args, 1, 1)?;
            let mut items = args[0].collect_items()?;
            items.reverse();
            Value::list(items)
        }
        Builtin::Enumerate => {
            arity(name, &args, 1, 2)?;
            let start = if args.len() == 2 { get_int(&args, 1, name)? } else { 0 };
            Value::list(
                args[0]
                    .iterate()?
                    .zip(start..)
                    .map(|(v, i)| Value::tuple(vec![Value::Int(i), v]))
                    .collect(),
            )
        }
        Builtin::Zip => {
            let mut columns = args
                .iter()
                .map(Value::iterate)
                .collect::<Result<Vec<_>, _>>()?;
            let mut rows = Vec::new();
            if !columns.is_empty() {
                'rows: loop {
                    let mut row = Vec::with_capacity(columns.len());
                    for col in columns.iter_mut() {
                        match col.next() {
                            Some(v) => row.push(v),
                            None => break 'rows,
                        }
                    }
                    rows.push(Value::tuple(row));
                }
            }
            Value::list(rows)
        }
        Builtin::List => {
            arity(name, &args, 0, 1)?;
            Value::list(match args.first() {
                Some(v) => v.collect_items()?,
                None => Vec::new(),
            })
        }
        Builtin::Tuple => {
            arity(name, &args, 0, 1)?;
            Value::tuple(match args.first() {
                Some(v) => v.collect_items()?,
                None => Vec::new(),
            })
        }
        Builtin::Round => {
            arity(name, &args, 1, 2)?;
            match (&args[0], args.get(1)) {
                (Value::Float(x), None) => Value::Int(float_to_int(round_half_even(*x))?),
                (Value::Float(x), Some(n)) => Value::Float(round_to(*x, n.as_int()?)),
                (v, _) => Value::Int(v.as_int()?),
            }
        }
        Builtin::Ord => {
            arity(name, &args, 1, 1)?;
            let s = get_str(&args, 0, name)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Int(c as i64),
                _ => {
                    return Err(format!(
                        "TypeError: ord() expected a character, but string of length {} found",
                        s.chars().count()
                    ))
                }
            }
        }
        Builtin::Chr => {
            arity(name, &args, 1, 1)?;
            Value::Str(code_point(get_int(&args, 0, name)?, "chr()")?.to_string())
        }
        Builtin::Hex => {
            arity(name, &args, 1, 1)?;
            Value::Str(radix_string(get_int(&args, 0, name)?, "0x", 16))
        }
        Builtin::Oct => {
            arity(name, &args, 1, 1)?;
            Value::Str(radix_string(get_int(&args, 0, name)?, "0o", 8))
        }
        Builtin::Bin => {
            arity(name, &args, 1, 1)?;
            Value::Str(radix_string(get_int(&args, 0, name)?, "0b", 2))
        }
        Builtin::Any => {
            arity(name, &args, 1, 1)?;
            Value::Bool(args[0].iterate()?.any(|v| v.truthy()))
        }
        Builtin::All => {
            arity(name, &args, 1, 1)?;
            Value::Bool(args[0].iterate()?.all(|v| v.truthy()))
        }
        Builtin::Divmod => {
            arity(name, &args, 2, 2)?;
            Value::tuple(vec![args[0].floor_div(&args[1])?, args[0].rem(&args[1])?])
        }
        Builtin::Pow => {
            arity(name, &args, 2, 3)?;
            match args.get(2) {
                None => args[0].pow(&args[1])?,
                Some(m) => Value::Int(mod_pow(args[0].as_int()?, args[1].as_int()?, m.as_int()?)?),
            }
        }
        Builtin::Format => {
            arity(name, &args, 1, 2)?;
            let spec = if args.len() == 2 { get_str(&args, 1, name)? } else { "" };
            Value::Str(format_value(&args[0], spec)?)
        }
        Builtin::Callable => {
            arity(name, &args, 1, 1)?;
            Value::Bool(args[0].is_callable())
        }
        Builtin::Out
        | Builtin::Include
        | Builtin::Map
        | Builtin::Filter
        | Builtin::Getattr
        | Builtin::Hasattr
        | Builtin::Setattr => {
            return Err(format!("{name}() needs the interpreter"));
        }
    })
}

fn mod_pow(base: i64, exp: i64, m: i64) -> Result<i64, String> {
    if m == 0 {
        return Err("ValueError: pow() 3rd argument cannot be 0".into());
    }
    if exp < 0 {
        return Err("ValueError: pow() 2nd argument cannot be negative when 3rd argument specified".into());
    }
    let m128 = m as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m128);
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m128);
        }
        b = (b * b).rem_euclid(m128);
        e >>= 1;
    }
    // Python gives the result the sign of the modulus.
    if m < 0 && result > 0 {
        result += m128;
    }
    Ok(result as i64)
}

// ── String methods ────────────────────────────────────────────────────────────

/// Call a `str` method.  Returns `None` if `name` is not a string method.
pub fn call_str_method(s: &str, name: &str, args: Vec<Value>) -> Option<Result<Value, String>> {
    fn inner(s: &str, name: &str, args: Vec<Value>) -> Result<Option<Value>, String> {
        let method = format!("str.{name}");
        Ok(Some(match name {
            "upper" => Value::Str(s.to_uppercase()),
            "lower" => Value::Str(s.to_lowercase()),
            "strip" | "lstrip" | "rstrip" => {
                arity(&method, &args, 0, 1)?;
                let chars: Option<Vec<char>> = match args.first() {
                    Some(Value::None) | None => None,
                    Some(v) => Some(v.as_str()?.chars().collect()),
                };
                let pred = |c: char| match &chars {
                    Some(set) => set.contains(&c),
                    None => c.is_whitespace(),
                };
                Value::Str(match name {
                    "strip" => s.trim_matches(pred),
                    "lstrip" => s.trim_start_matches(pred),
                    _ => s.trim_end_matches(pred),
                }
                .to_owned())
            }
            "split" => {
                arity(&method, &args, 0, 2)?;
                let max = if args.len() == 2 { get_int(&args, 1, &method)? } else { -1 };
                let parts: Vec<Value> = match args.first() {
                    Some(Value::None) | None => {
                        let words = s.split_whitespace();
                        if max < 0 {
                            words.map(Value::from).collect()
                        } else {
                            split_whitespace_n(s, max as usize)
                        }
                    }
                    Some(sep) => {
                        let sep = sep.as_str()?;
                        if sep.is_empty() {
                            return Err("ValueError: empty separator".into());
                        }
                        if max < 0 {
                            s.split(sep).map(Value::from).collect()
                        } else {
                            s.splitn(max as usize + 1, sep).map(Value::from).collect()
                        }
                    }
                };
                Value::list(parts)
            }
            "splitlines" => Value::list(s.lines().map(Value::from).collect()),
            "join" => {
                arity(&method, &args, 1, 1)?;
                let parts = args[0]
                    .iterate()?
                    .map(|v| match v {
                        Value::Str(p) => Ok(p),
                        other => Err(format!(
                            "TypeError: sequence item: expected str instance, {} found",
                            other.type_name()
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let total = parts
                    .iter()
                    .fold(s.len().saturating_mul(parts.len()), |n, p| n.saturating_add(p.len()));
                check_size(total)?;
                Value::Str(parts.join(s))
            }
            "replace" => {
                arity(&method, &args, 2, 3)?;
                let from = get_str(&args, 0, &method)?;
                let to = get_str(&args, 1, &method)?;
                if to.len() > from.len() {
                    let hits = if from.is_empty() { s.chars().count() + 1 } else { s.matches(from).count() };
                    check_size(s.len().saturating_add(hits.saturating_mul(to.len())))?;
                }
                match args.get(2) {
                    Some(n) if n.as_int()? >= 0 => Value::Str(s.replacen(from, to, n.as_int()? as usize)),
                    _ => Value::Str(s.replace(from, to)),
                }
            }
            "startswith" | "endswith" => {
                arity(&method, &args, 1, 1)?;
                let candidates = match &args[0] {
                    Value::Tuple(items) => items.iter().map(|v| v.as_str().map(str::to_owned)).collect::<Result<Vec<_>, _>>()?,
                    v => vec![v.as_str()?.to_owned()],
                };
                Value::Bool(candidates.iter().any(|c| {
                    if name == "startswith" {
                        s.starts_with(c.as_str())
                    } else {
                        s.ends_with(c.as_str())
                    }
                }))
            }
            "find" => {
                arity(&method, &args, 1, 1)?;
                let needle = get_str(&args, 0, &method)?;
                Value::Int(match s.find(needle) {
                    Some(byte) => s[..byte].chars().count() as i64,
                    None => -1,
                })
            }
            "count" => {
                arity(&method, &args, 1, 1)?;
                let needle = get_str(&args, 0, &method)?;
                Value::Int(if needle.is_empty() {
                    s.chars().count() as i64 + 1
                } else {
                    s.matches(needle).count() as i64
                })
            }
            "title" => {
                let mut out = String::with_capacity(s.len());
                let mut prev_alpha = false;
                for c in s.chars() {
                    if prev_alpha {
                        out.extend(c.to_lowercase());
                    } else {
                        out.extend(c.to_uppercase());
                    }
                    prev_alpha = c.is_alphabetic();
                }
                Value::Str(out)
            }
            "capitalize" => {
                let mut chars = s.chars();
                Value::Str(match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                    None => String::new(),
                })
            }
            "ljust" | "rjust" | "center" => {
                arity(&method, &args, 1, 2)?;
                let width = pad_width(get_int(&args, 0, &method)?)?;
                let fill = match args.get(1) {
                    Some(v) => single_char(v.as_str()?)?,
                    None => ' ',
                };
                let align = match name {
                    "ljust" => '<',
                    "rjust" => '>',
                    _ => '^',
                };
                Value::Str(pad(s, width, fill, align))
            }
            "zfill" => {
                arity(&method, &args, 1, 1)?;
                let width = pad_width(get_int(&args, 0, &method)?)?;
                let (sign, digits) = match s.chars().next() {
                    Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                    _ => (String::new(), s),
                };
                let len = sign.len() + digits.chars().count();
                let zeros = "0".repeat(width.saturating_sub(len));
                Value::Str(format!("{sign}{zeros}{digits}"))
            }
            "isdigit" => Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())),
            "isalpha" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
            "isspace" => Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)),
            "format" => Value::Str(format_braces(s, &args)?),
            _ => return Ok(None),
        }))
    }
    inner(s, name, args).transpose()
}

fn split_whitespace_n(s: &str, max: usize) -> Vec<Value> {
    let mut out = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if out.len() == max {
            out.push(Value::from(rest));
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        out.push(Value::from(&rest[..end]));
        rest = rest[end..].trim_start();
    }
    out
}

fn single_char(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("TypeError: the fill character must be exactly one character long".into()),
    }
}

fn pad(s: &str, width: usize, fill: char, align: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_owned();
    }
    let total = width - len;
    let (left, right) = match align {
        '<' => (0, total),
        '^' => (total / 2, total - total / 2),
        _ => (total, 0),
    };
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat(fill).take(left));
    out.push_str(s);
    out.extend(std::iter::repeat(fill).take(right));
    out
}

// ── List methods ──────────────────────────────────────────────────────────────

/// Call a `list` method.  Returns `None` if `name` is not a list method.
pub fn call_list_method(
    items: &RefCell<Vec<Value>>,
    name: &str,
    args: Vec<Value>,
) -> Option<Result<Value, String>> {
    fn inner(items: &RefCell<Vec<Value>>, name: &str, mut args: Vec<Value>) -> Result<Option<Value>, String> {
        let method = format!("list.{name}");
        Ok(Some(match name {
            "append" => {
                arity(&method, &args, 1, 1)?;
                items.borrow_mut().extend(args.pop());
                Value::None
            }
            "extend" => {
                arity(&method, &args, 1, 1)?;
                let new = args[0].collect_items()?;
                check_items(items.borrow().len().saturating_add(new.len()))?;
                items.borrow_mut().extend(new);
                Value::None
            }
            "insert" => {
                arity(&method, &args, 2, 2)?;
                let mut items = items.borrow_mut();
                let len = items.len() as i64;
                let i = get_int(&args, 0, &method)?;
                let i = if i < 0 { (i + len).max(0) } else { i.min(len) };
                items.insert(i as usize, args.pop().unwrap_or_default());
                Value::None
            }
            "pop" => {
                arity(&method, &args, 0, 1)?;
                let mut items = items.borrow_mut();
                let len = items.len() as i64;
                if len == 0 {
                    return Err("IndexError: pop from empty list".into());
                }
                let i = if args.is_empty() { -1 } else { get_int(&args, 0, &method)? };
                let i = if i < 0 { i + len } else { i };
                if !(0..len).contains(&i) {
                    return Err("IndexError: pop index out of range".into());
                }
                items.remove(i as usize)
            }
            "index" => {
                arity(&method, &args, 1, 1)?;
                let pos = items
                    .borrow()
                    .iter()
                    .position(|v| *v == args[0])
                    .ok_or_else(|| format!("ValueError: {} is not in list", args[0].repr()))?;
                Value::Int(pos as i64)
            }
            "count" => {
                arity(&method, &args, 1, 1)?;
                Value::Int(items.borrow().iter().filter(|v| **v == args[0]).count() as i64)
            }
            "reverse" => {
                items.borrow_mut().reverse();
                Value::None
            }
            "sort" => {
                arity(&method, &args, 0, 0)?;
                sort_values(&mut items.borrow_mut())?;
                Value::None
            }
            _ => return Ok(None),
        }))
    }
    inner(items, name, args).transpose()
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// `format(value, spec)` with the common subset of Python's mini-language:
/// `[[fill]align][sign][0][width][,][.precision][type]`.
pub fn format_value(v: &Value, spec: &str) -> Result<String, String> {
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if matches!(chars.first(), Some('<' | '>' | '^' | '=')) {
        align = Some(chars[0]);
        i = 1;
    }
    let mut sign = '-';
    if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
        sign = c;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if align.is_none() {
            fill = '0';
            align = Some('=');
        }
        i += 1;
    }
    let width = spec_number(&chars, &mut i)?;
    check_size(width)?;
    let grouping = chars.get(i) == Some(&',');
    if grouping {
        i += 1;
    }
    let mut precision = None;
    if chars.get(i) == Some(&'.') {
        i += 1;
        let p = spec_number(&chars, &mut i)?;
        if p > MAX_PRECISION {
            return Err("ValueError: precision too big".into());
        }
        precision = Some(p);
    }
    let ty = chars.get(i).copied();
    if chars.len() > i + 1 {
        return Err(format!("ValueError: invalid format specifier {spec:?}"));
    }

    let numeric = matches!(v, Value::Int(_) | Value::Float(_)) || (matches!(v, Value::Bool(_)) && ty.is_some());
    let (negative, mut body) = match ty {
        None | Some('s') if !numeric || ty == Some('s') => {
            if ty == Some('s') && numeric {
                return Err(format!("ValueError: Unknown format code 's' for object of type '{}'", v.type_name()));
            }
            let s = v.to_string();
            let s = match precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            };
            (false, s)
        }
        None => match (v, precision) {
            (Value::Float(x), Some(p)) => (x.is_sign_negative(), format!("{:.*}", p, x.abs())),
            (Value::Float(x), None) => (x.is_sign_negative(), format_float(x.abs())),
            _ => {
                let n = v.as_int()?;
                (n < 0, n.unsigned_abs().to_string())
            }
        },
        Some('d') => {
            if matches!(v, Value::Float(_)) {
                return Err("ValueError: Unknown format code 'd' for object of type 'float'".into());
            }
            let n = v.as_int()?;
            (n < 0, n.unsigned_abs().to_string())
        }
        Some(t @ ('x' | 'X' | 'o' | 'b')) => {
            let n = v.as_int()?;
            let m = n.unsigned_abs();
            let s = match t {
                'x' => format!("{m:x}"),
                'X' => format!("{m:X}"),
                'o' => format!("{m:o}"),
                _ => format!("{m:b}"),
            };
            (n < 0, s)
        }
        Some('c') => (false, code_point(v.as_int()?, "%c")?.to_string()),
        Some('f' | 'F') => {
            let x = v.as_float()?;
            (x.is_sign_negative() && x != 0.0, format!("{:.*}", precision.unwrap_or(6), x.abs()))
        }
        Some('e' | 'E') => {
            let x = v.as_float()?;
            let s = format!("{:.*e}", precision.unwrap_or(6), x.abs());
            let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
            let (esign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            let s = format!("{mantissa}e{esign}{digits:0>2}");
            (x.is_sign_negative() && x != 0.0, if ty == Some('E') { s.to_uppercase() } else { s })
        }
        Some('g' | 'G') => {
            let x = v.as_float()?;
            (x.is_sign_negative() && x != 0.0, format_float(x.abs()))
        }
        Some('%') => {
            let x = v.as_float()? * 100.0;
            (x.is_sign_negative() && x != 0.0, format!("{:.*}%", precision.unwrap_or(6), x.abs()))
        }
        Some(other) => {
            return Err(format!(
                "ValueError: Unknown format code '{other}' for object of type '{}'",
                v.type_name()
            ))
        }
    };

    if grouping {
        let (int_part, rest) = match body.find(|c: char| !c.is_ascii_digit()) {
            Some(pos) => body.split_at(pos),
            None => (body.as_str(), ""),
        };
        let mut grouped = String::new();
        for (n, c) in int_part.chars().enumerate() {
            if n > 0 && (int_part.len() - n) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        body = format!("{grouped}{rest}");
    }

    let sign_str = match (negative, sign) {
        (true, _) => "-",
        (false, '+') if numeric => "+",
        (false, ' ') if numeric => " ",
        _ => "",
    };
    let align = align.unwrap_or(if numeric && ty != Some('s') { '>' } else { '<' });
    if align == '=' {
        let len = sign_str.len() + body.chars().count();
        let padding: String = std::iter::repeat(fill).take(width.saturating_sub(len)).collect();
        return Ok(format!("{sign_str}{padding}{body}"));
    }
    Ok(pad(&format!("{sign_str}{body}"), width, fill, align))
}

/// `str.format`: `{}` / `{0}` fields with optional `:spec`, `{{` / `}}` escapes.
pub fn format_braces(template: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err("ValueError: unmatched '{' in format string".into()),
                    }
                }
                let (index, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let idx = if index.is_empty() {
                    auto += 1;
                    auto - 1
                } else {
                    index
                        .parse::<usize>()
                        .map_err(|_| format!("KeyError: {index:?}"))?
                };
                let value = args
                    .get(idx)
                    .ok_or_else(|| format!("IndexError: replacement index {idx} out of range"))?;
                out.push_str(&format_value(value, spec)?);
            }
            '}' => return Err("ValueError: single '}' encountered in format string".into()),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// printf-style `template % args`.
pub fn percent_format(template: &str, args: &Value) -> Result<String, String> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut next = values.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut flags = String::new();
        while let Some(&f @ ('-' | '+' | ' ' | '0' | '#')) = chars.peek() {
            flags.push(f);
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|c| c.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        let mut precision = String::new();
        if chars.peek() == Some(&'.') {
            chars.next();
            precision.push('.');
            while let Some(&d) = chars.peek().filter(|c| c.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
        }
        let conv = chars
            .next()
            .ok_or_else(|| "ValueError: incomplete format".to_owned())?;
        if conv == '%' {
            out.push('%');
            continue;
        }
        let value = next
            .next()
            .ok_or_else(|| "TypeError: not enough arguments for format string".to_owned())?;
        let align = if flags.contains('-') { "<" } else { "" };
        let sign = if flags.contains('+') {
            "+"
        } else if flags.contains(' ') {
            " "
        } else {
            ""
        };
        let zero = if flags.contains('0') && !flags.contains('-') { "0" } else { "" };
        let (value, ty) = match conv {
            's' => (Value::Str(value.to_string()), "s"),
            'r' => (Value::Str(value.repr()), "s"),
            'd' | 'i' | 'u' => match value {
                Value::Float(x) => (Value::Int(float_to_int(x.trunc())?), "d"),
                v => (v, "d"),
            },
            'f' | 'F' => (value, "f"),
            'e' => (value, "e"),
            'E' => (value, "E"),
            'g' | 'G' => (value, "g"),
            'x' => (value, "x"),
            'X' => (value, "X"),
            'o' => (value, "o"),
            'c' => match value {
                Value::Str(s) => (Value::Str(s), "s"),
                v => (v, "c"),
            },
            other => return Err(format!("ValueError: unsupported format character '{other}'")),
        };
        let spec = format!("{align}{sign}{zero}{width}{precision}{ty}");
        out.push_str(&format_value(&value, &spec)?);
    }
    if next.next().is_some() {
        return Err("TypeError: not all arguments converted during string formatting".into());
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        let b = Builtin::from_name(name).expect("unknown builtin");
        call_builtin(b, args).expect("builtin failed")
    }

    fn strm(s: &str, name: &str, args: Vec<Value>) -> Value {
        call_str_method(s, name, args)
            .expect("unknown method")
            .expect("method failed")
    }

    #[test]
    fn conversions() {
        assert_eq!(call("str", vec![Value::Int(2)]), "2".into());
        assert_eq!(call("int", vec![" 42 ".into()]), Value::Int(42));
        assert_eq!(call("int", vec!["ff".into(), Value::Int(16)]), Value::Int(255));
        assert_eq!(call("int", vec![Value::Float(-3.9)]), Value::Int(-3));
        assert_eq!(call("float", vec!["2.5".into()]), Value::Float(2.5));
        assert_eq!(call("bool", vec!["".into()]), Value::Bool(false));
        assert!(call_builtin(Builtin::Int, vec!["abc".into()]).is_err());
    }

    #[test]
    fn sequences() {
        assert_eq!(call("len", vec!["héllo".into()]), Value::Int(5));
        assert_eq!(
            call("sorted", vec![Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)])]),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(call("sum", vec![Value::Range { start: 1, stop: 5, step: 1 }]), Value::Int(10));
        assert_eq!(call("max", vec![Value::Int(3), Value::Int(9), Value::Int(4)]), Value::Int(9));
        assert_eq!(call("min", vec!["bca".into()]), "a".into());
        assert!(call_builtin(Builtin::Max, vec![Value::list(vec![])]).is_err());
        assert!(call_builtin(Builtin::Sorted, vec![Value::list(vec![Value::Int(1), "a".into()])]).is_err());
    }

    #[test]
    fn enumerate_and_zip() {
        assert_eq!(
            call("enumerate", vec!["ab".into()]).to_string(),
            "[(0, 'a'), (1, 'b')]"
        );
        assert_eq!(
            call("zip", vec![Value::list(vec![Value::Int(1), Value::Int(2)]), "xyz".into()]).to_string(),
            "[(1, 'x'), (2, 'y')]"
        );
    }

    #[test]
    fn rounding_is_bankers() {
        assert_eq!(call("round", vec![Value::Float(2.5)]), Value::Int(2));
        assert_eq!(call("round", vec![Value::Float(3.5)]), Value::Int(4));
        assert_eq!(call("round", vec![Value::Float(1.2345), Value::Int(2)]), Value::Float(1.23));
    }

    #[test]
    fn radix_and_chars() {
        assert_eq!(call("hex", vec![Value::Int(255)]), "0xff".into());
        assert_eq!(call("bin", vec![Value::Int(-5)]), "-0b101".into());
        assert_eq!(call("ord", vec!["A".into()]), Value::Int(65));
        assert_eq!(call("chr", vec![Value::Int(233)]), "é".into());
        assert_eq!(call("pow", vec![Value::Int(3), Value::Int(4), Value::Int(5)]), Value::Int(1));
    }

    #[test]
    fn string_methods() {
        assert_eq!(strm("  hi  ", "strip", vec![]), "hi".into());
        assert_eq!(strm("xxhixx", "strip", vec!["x".into()]), "hi".into());
        assert_eq!(strm("a,b,,c", "split", vec![",".into()]).to_string(), "['a', 'b', '', 'c']");
        assert_eq!(strm(" a  b ", "split", vec![]).to_string(), "['a', 'b']");
        assert_eq!(strm("a b c", "split", vec![Value::None, Value::Int(1)]).to_string(), "['a', 'b c']");
        assert_eq!(strm(", ", "join", vec![Value::list(vec!["a".into(), "b".into()])]), "a, b".into());
        assert_eq!(strm("hello world", "title", vec![]), "Hello World".into());
        assert_eq!(strm("7", "zfill", vec![Value::Int(3)]), "007".into());
        assert_eq!(strm("ab", "center", vec![Value::Int(6), "*".into()]), "**ab**".into());
        assert_eq!(strm("héllo", "find", vec!["l".into()]), Value::Int(2));
        assert!(call_str_method("x", "no_such_method", vec![]).is_none());
        assert!(call_str_method(",", "join", vec![Value::list(vec![Value::Int(1)])]).unwrap().is_err());
    }

    #[test]
    fn list_methods() {
        let items = RefCell::new(vec![Value::Int(3), Value::Int(1)]);
        call_list_method(&items, "append", vec![Value::Int(2)]).unwrap().unwrap();
        call_list_method(&items, "sort", vec![]).unwrap().unwrap();
        assert_eq!(*items.borrow(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(call_list_method(&items, "pop", vec![]).unwrap(), Ok(Value::Int(3)));
        assert_eq!(call_list_method(&items, "index", vec![Value::Int(2)]).unwrap(), Ok(Value::Int(1)));
        assert!(call_list_method(&items, "index", vec![Value::Int(9)]).unwrap().is_err());
    }

    #[test]
    fn format_mini_language() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int(42), "5d").unwrap(), "   42");
        assert_eq!(format_value(&Value::Int(42), "<5").unwrap(), "42   ");
        assert_eq!(format_value(&Value::Int(-42), "06d").unwrap(), "-00042");
        assert_eq!(format_value(&Value::Int(255), "x").unwrap(), "ff");
        assert_eq!(format_value(&Value::Int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&"ab".into(), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Float(0.25), ".0%").unwrap(), "25%");
        assert_eq!(format_value(&Value::Int(5), "+").unwrap(), "+5");
    }

    #[test]
    fn brace_and_percent_formatting() {
        assert_eq!(
            format_braces("{} + {} = {:.1f}", &[Value::Int(1), Value::Int(2), Value::Float(3.0)]).unwrap(),
            "1 + 2 = 3.0"
        );
        assert_eq!(format_braces("{1}{0}{{}}", &["a".into(), "b".into()]).unwrap(), "ba{}");
        assert!(format_braces("{2}", &[]).is_err());
        assert_eq!(
            percent_format("%s is %d years (%.1f%%)", &Value::tuple(vec!["Al".into(), Value::Int(30), Value::Float(12.34)])).unwrap(),
            "Al is 30 years (12.3%)"
        );
        assert_eq!(percent_format("[%-4s]", &"ab".into()).unwrap(), "[ab  ]");
        assert_eq!(percent_format("%05d", &Value::Int(42)).unwrap(), "00042");
        assert!(percent_format("%s %s", &"x".into()).is_err());
        assert!(percent_format("%s", &Value::tuple(vec!["a".into(), "b".into()])).is_err());
    }

    fn fails_with(result: Result<impl std::fmt::Debug, String>, prefix: &str) {
        match result {
            Err(e) => assert!(e.starts_with(prefix), "expected {prefix}, got {e}"),
            Ok(v) => panic!("expected {prefix}, got {v:?}"),
        }
    }

    #[test]
    fn huge_floats_do_not_saturate() {
        let b = |name| Builtin::from_name(name).unwrap();
        fails_with(call_builtin(b("int"), vec![Value::Float(1e300)]), "OverflowError");
        fails_with(call_builtin(b("int"), vec![Value::Float(-1e300)]), "OverflowError");
        fails_with(call_builtin(b("int"), vec![Value::Float(f64::NAN)]), "ValueError");
        fails_with(call_builtin(b("round"), vec![Value::Float(1e300)]), "OverflowError");
        fails_with(call_builtin(b("round"), vec![Value::Float(f64::INFINITY)]), "OverflowError");
        assert_eq!(call("int", vec![Value::Float(-9.2e18)]), Value::Int(-9_200_000_000_000_000_000));
        fails_with(percent_format("%d", &Value::Float(1e19)), "OverflowError");
    }

    #[test]
    fn rounding_with_extreme_digit_counts() {
        assert_eq!(call("round", vec![Value::Float(2.5), Value::Int(-i64::MAX)]), Value::Float(0.0));
        assert_eq!(call("round", vec![Value::Float(-2.5), Value::Int(i64::MIN)]), Value::Float(-0.0));
        assert_eq!(call("round", vec![Value::Float(2.5), Value::Int(i64::MAX)]), Value::Float(2.5));
        assert_eq!(call("round", vec![Value::Float(1e300), Value::Int(10)]), Value::Float(1e300));
    }

    #[test]
    fn code_points_outside_unicode_are_rejected() {
        let chr = Builtin::from_name("chr").unwrap();
        fails_with(call_builtin(chr, vec![Value::Int(0x110000)]), "ValueError: chr()");
        fails_with(call_builtin(chr, vec![Value::Int(-1)]), "ValueError: chr()");
        fails_with(percent_format("%c", &Value::Int(1_114_112)), "ValueError: %c");
        assert_eq!(percent_format("%c", &Value::Int(65)).unwrap(), "A");
    }

    #[test]
    fn oversized_padding_is_an_error() {
        let huge = Value::Int(i64::MAX);
        for method in ["center", "ljust", "rjust", "zfill"] {
            fails_with(call_str_method("ab", method, vec![huge.clone()]).unwrap(), "MemoryError");
        }
        assert_eq!(strm("ab", "ljust", vec![Value::Int(-5)]), "ab".into());
        fails_with(format_value(&Value::Int(1), "99999999999999"), "MemoryError");
        fails_with(percent_format("%99999999999999d", &Value::Int(1)), "MemoryError");
    }

    #[test]
    fn oversized_precision_is_an_error() {
        fails_with(percent_format("%.1000000000000f", &Value::Float(1.0)), "ValueError: precision too big");
        fails_with(format_value(&Value::Float(1.0), ".99999999999999"), "ValueError: precision too big");
        fails_with(
            format_value(&Value::Float(1.0), ".99999999999999999999999"),
            "ValueError: Too many decimal digits",
        );
        fails_with(
            format_braces("{:99999999999999999999999}", &[Value::Int(1)]),
            "ValueError: Too many decimal digits",
        );
        assert_eq!(format_value(&Value::Float(1.0), ".3f").unwrap(), "1.000");
    }
}
