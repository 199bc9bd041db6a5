//! ein: lexer and parser for a small `{{ }}` templating language.
//!
//! This crate turns template source into an AST. It does not render; the tree
//! is meant to be walked by an evaluator that resolves identifiers through an
//! [`Environment`].
//!
//! Supported syntax:
//! - Literal text, copied verbatim into plaintext nodes.
//! - `{{name}}` interpolates a variable.
//! - `{{if cond}} ... {{end}}` and `{{if cond}} ... {{else}} ... {{end}}`,
//!   nested to any depth.
//!
//! Not supported:
//! - Loops. `for` is a reserved token kind, but the scanner never produces it.
//! - Escaping and whitespace trimming.
//! - Source positions in errors.
//!
//! Scanning and parsing run concurrently: the scanner is a producer thread that
//! hands tokens one at a time to the parser over a rendezvous channel. The
//! parser reads them through a [`TokenReader`] that can push tokens back, which
//! is how block ends are found by lookahead.
//!
//! ```
//! use ein::{parse_str, Node};
//!
//! let root = parse_str("Hello {{if name}}{{name}}{{else}}stranger{{end}}!").unwrap();
//! assert_eq!(root.children().len(), 3);
//! assert!(matches!(root.children()[1], Node::If(_)));
//! ```

pub mod ast;
pub mod env;
pub mod error;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod reader;

pub use ast::*;
pub use env::*;
pub use error::*;
pub use lexer::{lex_all, lex_str, Token, TokenKind};
pub use options::*;
pub use parser::{parse, parse_str, parse_tag, parse_with};
pub use reader::{Terminator, TokenReader};

use std::io::Read;

/// Compiles template source into its AST, returning the root list as a node.
pub fn compile<R>(source: R, options: &ParseOptions) -> EinResult<Node>
where
    R: Read + Send + 'static,
{
    tracing::dispatcher::with_default(&options.dispatch, || tracing::info!("compiling"));
    let root = parse_with(source, options)?;
    tracing::dispatcher::with_default(&options.dispatch, || {
        tracing::info!(children = root.children().len(), "done compiling")
    });
    Ok(Node::List(root))
}
