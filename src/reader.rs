//! Rewindable cursor over the scanner's token channel, and the lookahead
//! predicates built on it.

use std::{fmt, sync::mpsc::Receiver};

use crate::{
    lexer::{Token, TokenKind},
    EinResult, InternalError, ParseError,
};

/// Pull-based view of a token channel with unbounded push-back.
///
/// Tokens that are [`unread`](TokenReader::unread) are replayed before anything
/// new is taken from the channel.
#[derive(Debug)]
pub struct TokenReader {
    source: Receiver<Token>,
    history: Vec<Token>,
}

/// A named lookahead that tells a list where its block ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// `{{end}}` comes next.
    BeforeEnd,

    /// `{{else}}` comes next.
    BeforeElse,
}

impl TokenReader {
    pub fn new(source: Receiver<Token>) -> Self {
        Self {
            source,
            history: Vec::with_capacity(8),
        }
    }

    /// Consumes the next token.
    ///
    /// Fails with [`InternalError::StreamClosed`] if the scanner closed the
    /// channel without its end-of-input token having been seen first.
    pub fn read(&mut self) -> Result<Token, InternalError> {
        if let Some(token) = self.history.pop() {
            return Ok(token);
        }
        self.source.recv().map_err(|_| InternalError::StreamClosed)
    }

    /// Consumes the next `n` tokens, in order.
    pub fn read_n(&mut self, n: usize) -> Result<Vec<Token>, InternalError> {
        (0..n).map(|_| self.read()).collect()
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, InternalError> {
        if self.history.is_empty() {
            let token = self.source.recv().map_err(|_| InternalError::StreamClosed)?;
            self.history.push(token);
        }
        Ok(&self.history[self.history.len() - 1])
    }

    /// Pushes tokens back so the following reads return them in the order given.
    pub fn unread(&mut self, tokens: Vec<Token>) {
        if tokens.is_empty() {
            return;
        }
        tracing::trace!(count = tokens.len(), "unread");
        self.history.extend(tokens.into_iter().rev());
    }

    /// Collects every token up to, but not including, the next token of `kind`.
    ///
    /// The terminal token is left on the cursor. Reaching end of input first is
    /// an error unless `kind` is [`TokenKind::EndOfInput`] itself.
    pub fn read_until(&mut self, kind: TokenKind) -> EinResult<Vec<Token>> {
        let mut out = Vec::with_capacity(8);
        loop {
            let token = self.read()?;
            if token.is(kind) {
                self.unread(vec![token]);
                return Ok(out);
            }
            if token.is(TokenKind::EndOfInput) {
                return Err(ParseError::UnexpectedEofScanning(kind).into());
            }
            out.push(token);
        }
    }
}

impl Terminator {
    pub fn name(self) -> &'static str {
        match self {
            Terminator::BeforeEnd => "beforeEnd",
            Terminator::BeforeElse => "beforeElse",
        }
    }

    /// The exact tokens this terminator looks for.
    pub fn sequence(self) -> [Token; 3] {
        let keyword = match self {
            Terminator::BeforeEnd => TokenKind::End,
            Terminator::BeforeElse => TokenKind::Else,
        };
        [Token::left_meta(), Token::keyword(keyword), Token::right_meta()]
    }

    /// Tests whether the cursor is positioned at this terminator's sequence.
    /// The cursor is left where it was.
    pub fn matches(self, reader: &mut TokenReader) -> Result<bool, InternalError> {
        lookahead(self.name(), &self.sequence(), reader)
    }
}

/// Tests whether `expected` comes next on the cursor, comparing kind and value.
///
/// Reading stops at the first mismatch so a predicate never reads past end of
/// input. Every token read is pushed back before returning.
pub fn lookahead(
    name: &str,
    expected: &[Token],
    reader: &mut TokenReader,
) -> Result<bool, InternalError> {
    let mut upcoming = Vec::with_capacity(expected.len());
    let mut matched = true;

    for want in expected {
        let token = match reader.read() {
            Ok(token) => token,
            Err(err) => {
                reader.unread(upcoming);
                return Err(err);
            }
        };
        let same = token == *want;
        upcoming.push(token);
        if !same {
            matched = false;
            break;
        }
    }

    tracing::debug!(name, matched, "lookahead");
    reader.unread(upcoming);
    Ok(matched)
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
