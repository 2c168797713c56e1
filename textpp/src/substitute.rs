//! Inline macro substitution.
//!
//! For every inline prefix in turn, the whole line is split on that prefix.
//! Each segment after the first starts with a (possibly empty) run of macro
//! letters, `[A-Z0-9_]`, which is the key:
//!
//! - no key: the prefix is put back untouched;
//! - key not resolvable: prefix and key are put back and the miss is reported;
//! - key resolved: prefix and key are replaced by the value, and a directly
//!   following `` `' `` quote pair is swallowed so a macro can be glued to
//!   letters that would otherwise extend the key (`PyPP_NAME`'s`).

use tracing::warn;

use crate::error::Result;

/// Closing quote that ends a macro key without producing output.
pub const KEY_TERMINATOR: &str = "`'";

/// Result of substituting one line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Substitution {
    pub text: String,
    /// `prefix + key` for every reference that could not be resolved.
    pub unresolved: Vec<String>,
}

pub fn is_macro_letter(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_'
}

/// Substitute every inline macro in `line`.  `resolve` receives the key as
/// written (upper case) and returns its text, or `None` if it is unbound.
pub fn substitute<F>(line: &str, prefixes: &[String], mut resolve: F) -> Result<Substitution>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let mut text = line.to_owned();
    let mut unresolved = Vec::new();
    for prefix in prefixes {
        if !text.contains(prefix.as_str()) {
            continue;
        }
        let replaced = {
            let mut segments = text.split(prefix.as_str());
            let mut out = String::with_capacity(text.len());
            out.push_str(segments.next().unwrap_or_default());
            for seg in segments {
                let key_len = seg.bytes().take_while(|&b| is_macro_letter(b)).count();
                if key_len == 0 {
                    out.push_str(prefix);
                    out.push_str(seg);
                    continue;
                }
                let (key, rest) = seg.split_at(key_len);
                match resolve(key)? {
                    Some(value) => {
                        out.push_str(&value);
                        out.push_str(rest.strip_prefix(KEY_TERMINATOR).unwrap_or(rest));
                    }
                    None => {
                        warn!("Key \"{prefix}{key}\" not found");
                        unresolved.push(format!("{prefix}{key}"));
                        out.push_str(prefix);
                        out.push_str(seg);
                    }
                }
            }
            out
        };
        text = replaced;
    }
    Ok(Substitution { text, unresolved })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
