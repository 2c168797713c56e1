//! `textpp`: a line-oriented text preprocessor in the spirit of `m4` and `cpp`.
//!
//! Literal text flows through unchanged except for inline macro references
//! (`PyPP_NAME`, `M4_NAME`), which are replaced from a shared variable store.
//! Lines starting with an escape prefix (`### PyPP `, `/// PyPP `) are
//! directives: `divert` … `end` suppresses output, `exec` … `end` runs a block
//! of embedded code, and anything else is run as one line of embedded code.
//! Embedded code emits text with `out()`, pulls in other files with
//! `include()`, and reads and writes the store through `d` / `defines`.
//!
//! ```rust
//! use textpp::{process_str, Options};
//!
//! let doc = "\
//! /// PyPP exec
//! d.who = 'world'
//! /// PyPP end
//! Hello, PyPP_WHO!
//! ";
//! assert_eq!(process_str(doc, Options::default()).unwrap(), "Hello, world!\n");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod include;
pub mod machine;
pub mod output;
pub mod prefix;
pub mod script;
pub mod store;
pub mod substitute;

pub use config::{Options, Syntax};
pub use error::{Error, Result};
pub use include::{Fuse, SearchPath, Source};
pub use machine::{Mode, Preprocessor};
pub use output::OutputBuffer;
pub use script::{NativeFn, Value};
pub use store::{SharedVars, VarStore};

/// Preprocess a whole document held in memory and return the output text.
pub fn process_str(text: &str, options: Options) -> Result<String> {
    let mut pp = Preprocessor::new(options);
    pp.include(Source::text("<string>", text))?;
    pp.finish()?;
    Ok(pp.into_string())
}
