//! The utility libraries exposed to embedded code as `math`, `time` and `re`.
//!
//! Modules are plain tags; attribute reads go through [`get_attr`] and
//! method-style calls (`math.sqrt(2)`) through [`call`].

use std::fmt::Write as _;

use chrono::{DateTime, Local, TimeZone, Utc};
use regex::Regex;

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Math,
    Time,
    Re,
}

impl Module {
    pub fn from_name(name: &str) -> Option<Module> {
        match name {
            "math" => Some(Module::Math),
            "time" => Some(Module::Time),
            "re" => Some(Module::Re),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Module::Math => "math",
            Module::Time => "time",
            Module::Re => "re",
        }
    }
}

/// Non-callable module attributes (constants).
pub fn get_attr(module: Module, name: &str) -> Result<Value, String> {
    let value = match (module, name) {
        (Module::Math, "pi") => Value::Float(std::f64::consts::PI),
        (Module::Math, "e") => Value::Float(std::f64::consts::E),
        (Module::Math, "tau") => Value::Float(std::f64::consts::TAU),
        (Module::Math, "inf") => Value::Float(f64::INFINITY),
        (Module::Math, "nan") => Value::Float(f64::NAN),
        _ => {
            return Err(format!(
                "AttributeError: module '{}' has no attribute '{name}'",
                module.name()
            ))
        }
    };
    Ok(value)
}

pub fn call(module: Module, name: &str, args: &[Value]) -> Result<Value, String> {
    match module {
        Module::Math => math(name, args),
        Module::Time => time(name, args),
        Module::Re => re(name, args),
    }
}

fn want(module: &str, name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        return Err(format!(
            "TypeError: {module}.{name}() got {} argument(s)",
            args.len()
        ));
    }
    Ok(())
}

fn missing(module: &str, name: &str) -> String {
    format!("AttributeError: module '{module}' has no attribute '{name}'")
}

// ── math ──────────────────────────────────────────────────────────────────────

fn domain_error() -> String {
    "ValueError: math domain error".into()
}

fn float_to_int(x: f64) -> Result<Value, String> {
    super::builtins::float_to_int(x).map(Value::Int)
}

fn math(name: &str, args: &[Value]) -> Result<Value, String> {
    let unary = |f: fn(f64) -> f64| -> Result<Value, String> {
        want("math", name, args, 1, 1)?;
        Ok(Value::Float(f(args[0].as_float()?)))
    };
    match name {
        "sqrt" => {
            want("math", name, args, 1, 1)?;
            let x = args[0].as_float()?;
            if x < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.sqrt()))
        }
        "floor" | "ceil" | "trunc" => {
            want("math", name, args, 1, 1)?;
            match &args[0] {
                v @ (Value::Int(_) | Value::Bool(_)) => Ok(Value::Int(v.as_int()?)),
                v => {
                    let x = v.as_float()?;
                    float_to_int(match name {
                        "floor" => x.floor(),
                        "ceil" => x.ceil(),
                        _ => x.trunc(),
                    })
                }
            }
        }
        "fabs" => unary(f64::abs),
        "exp" => unary(f64::exp),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "atan" => unary(f64::atan),
        "degrees" => unary(f64::to_degrees),
        "radians" => unary(f64::to_radians),
        "asin" | "acos" => {
            want("math", name, args, 1, 1)?;
            let x = args[0].as_float()?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain_error());
            }
            Ok(Value::Float(if name == "asin" { x.asin() } else { x.acos() }))
        }
        "log" | "log10" | "log2" => {
            want("math", name, args, 1, if name == "log" { 2 } else { 1 })?;
            let x = args[0].as_float()?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            let y = match (name, args.get(1)) {
                ("log10", _) => x.log10(),
                ("log2", _) => x.log2(),
                (_, Some(base)) => {
                    let b = base.as_float()?;
                    if b <= 0.0 || b == 1.0 {
                        return Err(domain_error());
                    }
                    x.ln() / b.ln()
                }
                _ => x.ln(),
            };
            Ok(Value::Float(y))
        }
        "pow" | "atan2" | "hypot" => {
            want("math", name, args, 2, 2)?;
            let (x, y) = (args[0].as_float()?, args[1].as_float()?);
            Ok(Value::Float(match name {
                "pow" => x.powf(y),
                "atan2" => x.atan2(y),
                _ => x.hypot(y),
            }))
        }
        "isnan" | "isinf" | "isfinite" => {
            want("math", name, args, 1, 1)?;
            let x = args[0].as_float()?;
            Ok(Value::Bool(match name {
                "isnan" => x.is_nan(),
                "isinf" => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        "gcd" => {
            let mut acc: i64 = 0;
            for arg in args {
                let mut b = arg.as_int()?.unsigned_abs();
                let mut a = acc.unsigned_abs();
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                acc = i64::try_from(a).map_err(|_| "OverflowError: gcd result out of range".to_owned())?;
            }
            Ok(Value::Int(acc))
        }
        "factorial" => {
            want("math", name, args, 1, 1)?;
            let n = args[0].as_int()?;
            if n < 0 {
                return Err("ValueError: factorial() not defined for negative values".into());
            }
            (1..=n)
                .try_fold(1i64, |acc, k| acc.checked_mul(k))
                .map(Value::Int)
                .ok_or_else(|| "OverflowError: factorial result out of range".into())
        }
        "isqrt" => {
            want("math", name, args, 1, 1)?;
            let n = args[0].as_int()?;
            if n < 0 {
                return Err("ValueError: isqrt() argument must be nonnegative".into());
            }
            let mut r = (n as f64).sqrt() as i64;
            while r * r > n {
                r -= 1;
            }
            while (r + 1).checked_mul(r + 1).map_or(false, |sq| sq <= n) {
                r += 1;
            }
            Ok(Value::Int(r))
        }
        _ => Err(missing("math", name)),
    }
}

// ── time ──────────────────────────────────────────────────────────────────────

fn local_time(args: &[Value], idx: usize) -> Result<DateTime<Local>, String> {
    match args.get(idx) {
        None | Some(Value::None) => Ok(Local::now()),
        Some(v) => {
            let secs = v.as_float()?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            Local
                .timestamp_opt(whole as i64, nanos)
                .single()
                .ok_or_else(|| "ValueError: timestamp out of range".to_owned())
        }
    }
}

fn strftime(when: &DateTime<Local>, fmt: &str) -> Result<String, String> {
    let mut out = String::new();
    write!(out, "{}", when.format(fmt)).map_err(|_| format!("ValueError: invalid format string {fmt:?}"))?;
    Ok(out)
}

fn time(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "time" => {
            want("time", name, args, 0, 0)?;
            let now = Utc::now();
            Ok(Value::Float(
                now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9,
            ))
        }
        "strftime" => {
            want("time", name, args, 1, 2)?;
            let fmt = args[0].as_str()?;
            Ok(Value::Str(strftime(&local_time(args, 1)?, fmt)?))
        }
        "ctime" => {
            want("time", name, args, 0, 1)?;
            Ok(Value::Str(strftime(&local_time(args, 0)?, "%a %b %e %H:%M:%S %Y")?))
        }
        _ => Err(missing("time", name)),
    }
}

// ── re ────────────────────────────────────────────────────────────────────────

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("re.error: {e}"))
}

fn re(name: &str, args: &[Value]) -> Result<Value, String> {
    let opt_str = |m: Option<regex::Match<'_>>| m.map_or(Value::None, |m| Value::from(m.as_str()));
    match name {
        "search" | "match" | "fullmatch" => {
            want("re", name, args, 2, 2)?;
            let pattern = args[0].as_str()?;
            let text = args[1].as_str()?;
            let re = match name {
                "search" => compile(pattern)?,
                "match" => compile(&format!(r"\A(?:{pattern})"))?,
                _ => compile(&format!(r"\A(?:{pattern})\z"))?,
            };
            Ok(opt_str(re.find(text)))
        }
        "findall" => {
            want("re", name, args, 2, 2)?;
            let re = compile(args[0].as_str()?)?;
            let text = args[1].as_str()?;
            let groups = re.captures_len() - 1;
            let found = re
                .captures_iter(text)
                .map(|caps| {
                    let group = |i: usize| caps.get(i).map_or(Value::from(""), |m| Value::from(m.as_str()));
                    match groups {
                        0 => group(0),
                        1 => group(1),
                        n => Value::tuple((1..=n).map(group).collect()),
                    }
                })
                .collect();
            Ok(Value::list(found))
        }
        "sub" => {
            want("re", name, args, 3, 4)?;
            let re = compile(args[0].as_str()?)?;
            let repl = args[1].as_str()?;
            let text = args[2].as_str()?;
            let limit = match args.get(3) {
                Some(n) => n.as_int()?.max(0) as usize,
                None => 0,
            };
            Ok(Value::Str(re.replacen(text, limit, repl).into_owned()))
        }
        "split" => {
            want("re", name, args, 2, 2)?;
            let re = compile(args[0].as_str()?)?;
            Ok(Value::list(re.split(args[1].as_str()?).map(Value::from).collect()))
        }
        "escape" => {
            want("re", name, args, 1, 1)?;
            Ok(Value::Str(regex::escape(args[0].as_str()?)))
        }
        _ => Err(missing("re", name)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn m(name: &str, args: &[Value]) -> Value {
        call(Module::Math, name, args).expect("math call failed")
    }

    #[test]
    fn math_functions() {
        assert_eq!(m("sqrt", &[Value::Int(16)]), Value::Float(4.0));
        assert_eq!(m("floor", &[Value::Float(-1.5)]), Value::Int(-2));
        assert_eq!(m("ceil", &[Value::Float(1.2)]), Value::Int(2));
        assert_eq!(m("gcd", &[Value::Int(12), Value::Int(18)]), Value::Int(6));
        assert_eq!(m("factorial", &[Value::Int(5)]), Value::Int(120));
        assert_eq!(m("isqrt", &[Value::Int(17)]), Value::Int(4));
        assert_eq!(m("log", &[Value::Int(8), Value::Int(2)]), Value::Float(3.0));
        assert!(call(Module::Math, "sqrt", &[Value::Int(-1)]).is_err());
        assert!(call(Module::Math, "factorial", &[Value::Int(30)]).is_err());
        assert!(call(Module::Math, "system", &[]).is_err());
    }

    #[test]
    fn math_constants() {
        assert_eq!(get_attr(Module::Math, "pi"), Ok(Value::Float(std::f64::consts::PI)));
        assert!(get_attr(Module::Math, "sqrt").is_err());
        assert!(get_attr(Module::Re, "compile").is_err());
    }

    #[test]
    fn time_formats_fixed_timestamp() {
        let year = call(Module::Time, "strftime", &["%Y".into(), Value::Int(86_400 * 365)]).unwrap();
        assert!(year == "1971".into() || year == "1970".into());
        let now = call(Module::Time, "time", &[]).unwrap();
        assert!(now.as_float().unwrap() > 1.0e9);
        assert!(call(Module::Time, "sleep", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn regex_functions() {
        let r = |name: &str, args: &[Value]| call(Module::Re, name, args).unwrap();
        assert_eq!(r("search", &[r"\d+".into(), "ab12cd".into()]), "12".into());
        assert_eq!(r("match", &[r"\d+".into(), "ab12".into()]), Value::None);
        assert_eq!(r("fullmatch", &["a.c".into(), "abc".into()]), "abc".into());
        assert_eq!(r("fullmatch", &["a.c".into(), "abcd".into()]), Value::None);
        assert_eq!(r("findall", &[r"\d".into(), "a1b2".into()]).to_string(), "['1', '2']");
        assert_eq!(r("findall", &[r"(\w)=(\d)".into(), "a=1 b=2".into()]).to_string(), "[('a', '1'), ('b', '2')]");
        assert_eq!(r("sub", &[r"(\w+)@".into(), "<$1>".into(), "me@x".into()]), "<me>x".into());
        assert_eq!(r("split", &[r",\s*".into(), "a, b,c".into()]).to_string(), "['a', 'b', 'c']");
        assert_eq!(r("escape", &["a.b".into()]), r"a\.b".into());
        assert!(call(Module::Re, "search", &["(".into(), "x".into()]).is_err());
    }
}
