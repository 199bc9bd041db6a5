//! Error types for scanning and parsing templates.

use std::{fmt, io};

use thiserror::Error;

use crate::lexer::{Token, TokenKind};

/// The result of an ein operation.
pub type EinResult<T> = Result<T, EinError>;

/// An error produced while turning template source into an AST.
#[derive(pretty_error_debug::Debug, Error)]
pub enum EinError {
    /// The template source is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An implementation invariant was broken.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),

    /// The scanner thread could not be started.
    #[error("failed to start scanner: {0}")]
    Spawn(#[source] io::Error),
}

/// A user-facing failure caused by malformed template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The scanner reported a lexical error.
    #[error("lexical error: {0}")]
    Lexical(String),

    /// The token stream ended while looking for a token of the given kind.
    #[error("unexpected EOF while scanning for {0}")]
    UnexpectedEofScanning(TokenKind),

    /// A nested block was still open when the token stream ended.
    #[error("unexpected EOF")]
    UnexpectedEof,

    /// A token that cannot start a list item.
    #[error("unexpected {kind} token in parse: {0}", kind = .0.kind)]
    UnexpectedToken(Token),

    /// A tag with nothing between its delimiters.
    #[error("empty tag")]
    EmptyTag,

    /// An `if` tag with no condition.
    #[error("if tag has no condition")]
    MissingCondition,

    /// A tag whose tokens match no known tag shape.
    #[error("unrecognized tag: {}", TokenList(.0))]
    UnrecognizedTag(Vec<Token>),
}

/// A failure that means the parser itself is wrong, not its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InternalError {
    /// A token was requested after the scanner closed its channel.
    #[error("parsing a closed token stream")]
    StreamClosed,

    /// An if body finished without being followed by an end or else tag.
    #[error("if body ended without an end or else tag")]
    UnresolvedBranch,
}

struct TokenList<'a>(&'a [Token]);

impl EinError {
    /// Returns `true` if the error signals a broken invariant rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, EinError::Internal(_))
    }

    /// Returns the parse error, if that is what this is.
    pub fn as_parse(&self) -> Option<&ParseError> {
        match self {
            EinError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for TokenList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{token}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_tag_lists_its_tokens() {
        let err = ParseError::UnrecognizedTag(vec![
            Token::new(TokenKind::Identifier, "a"),
            Token::new(TokenKind::Identifier, "b"),
        ]);
        assert_eq!(err.to_string(), "unrecognized tag: [{ident: a} {ident: b}]");
    }

    #[test]
    fn internal_errors_are_distinguishable() {
        let internal = EinError::from(InternalError::StreamClosed);
        let parse = EinError::from(ParseError::EmptyTag);

        assert!(internal.is_internal());
        assert!(!parse.is_internal());
        assert_eq!(parse.as_parse(), Some(&ParseError::EmptyTag));
        assert_eq!(internal.to_string(), "internal error: parsing a closed token stream");
    }

    #[test]
    fn unexpected_token_names_its_kind() {
        let err = ParseError::UnexpectedToken(Token::right_meta());
        assert_eq!(err.to_string(), "unexpected rightM token in parse: {rightM: }}}");
    }
}
