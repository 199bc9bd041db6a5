//! Rune-level scanner that turns template source into a token stream.
//!
//! The scanner runs on its own thread and hands tokens to the parser over a
//! rendezvous channel, so at most one token is ever in flight between the two.
//! Every scan ends with exactly one [`TokenKind::EndOfInput`] token, after which
//! the channel is closed.

use std::{
    fmt,
    io::{self, BufRead, BufReader, Cursor, Read},
    mem,
    ops::RangeInclusive,
    sync::mpsc::{self, Receiver, SyncSender},
    thread,
};

use unicode_properties::{GeneralCategory, GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::{EinError, EinResult, ParseOptions};

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Invalid,
    Error,
    EndOfInput,
    Plaintext,
    LeftMeta,  // {{
    RightMeta, // }}
    Identifier,

    // Keywords
    If,
    For, // reserved, never produced
    End,
    Else,
}

/// A lexical unit: a kind plus the literal text it was scanned from.
///
/// Error tokens carry a message instead of source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

/// Scanner state machine over a character stream.
///
/// A scanner is single use: [`Scanner::run`] consumes it and closes the channel
/// when it halts.
pub struct Scanner<R> {
    input: RuneReader<R>,
    out: SyncSender<Token>,
    buf: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plaintext,
    TagBody,
    Identifier,
}

/// Decodes UTF-8 from a byte stream one code point at a time, with room to push
/// a single rune back. Bytes that are not valid UTF-8 come out as U+FFFD.
struct RuneReader<R> {
    inner: BufReader<R>,
    pending: Option<char>,
}

impl TokenKind {
    /// Short diagnostic name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Invalid => "invalid",
            TokenKind::Error => "error",
            TokenKind::EndOfInput => "EOF",
            TokenKind::Plaintext => "text",
            TokenKind::LeftMeta => "leftM",
            TokenKind::RightMeta => "rightM",
            TokenKind::Identifier => "ident",
            TokenKind::If => "if",
            TokenKind::For => "for",
            TokenKind::End => "end",
            TokenKind::Else => "else",
        }
    }

    /// Maps an identifier to the keyword it spells, if any.
    ///
    /// `for` is reserved in the kind set but is not recognised here.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        match word {
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "end" => Some(TokenKind::End),
            _ => None,
        }
    }
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// The end-of-input sentinel.
    pub fn eof() -> Self {
        Self::new(TokenKind::EndOfInput, "EOF")
    }

    pub fn left_meta() -> Self {
        Self::new(TokenKind::LeftMeta, "{{")
    }

    pub fn right_meta() -> Self {
        Self::new(TokenKind::RightMeta, "}}")
    }

    /// A keyword token as the scanner would produce it, e.g. `{end: end}`.
    pub fn keyword(kind: TokenKind) -> Self {
        Self::new(kind, kind.name())
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl<R: Read> Scanner<R> {
    pub fn new(source: R, out: SyncSender<Token>) -> Self {
        Self {
            input: RuneReader::new(source),
            out,
            buf: String::with_capacity(32),
        }
    }

    /// Drives the state machine to completion, then sends the end-of-input token
    /// and closes the channel.
    ///
    /// If the receiving side hangs up, scanning stops at the next send.
    pub fn run(mut self) {
        let mut state = Some(State::Plaintext);
        while let Some(current) = state {
            tracing::trace!(?current, "lex state");
            state = match current {
                State::Plaintext => self.lex_plaintext(),
                State::TagBody => self.lex_tag_body(),
                State::Identifier => self.lex_identifier(),
            };
        }
        self.done();
    }

    fn lex_plaintext(&mut self) -> Option<State> {
        loop {
            let rune = match self.input.next() {
                Ok(rune) => rune,
                Err(err) => return self.recover(err),
            };

            match rune {
                Some('{') => match self.input.peek() {
                    Ok(Some('{')) => {
                        self.input.accept();
                        if !self.buf.is_empty() {
                            self.emit(TokenKind::Plaintext)?;
                        }
                        self.send(Token::left_meta())?;
                        return Some(State::TagBody);
                    }
                    Ok(_) => self.buf.push('{'),
                    Err(err) => return self.recover(err),
                },
                Some('}') => match self.input.peek() {
                    Ok(Some('}')) => return self.fatal("unexpected right meta in lexPlaintext"),
                    Ok(_) => self.buf.push('}'),
                    Err(err) => return self.recover(err),
                },
                Some(rune) => self.buf.push(rune),
                None => {
                    if !self.buf.is_empty() {
                        self.emit(TokenKind::Plaintext)?;
                    }
                    return None;
                }
            }
        }
    }

    fn lex_tag_body(&mut self) -> Option<State> {
        loop {
            let rune = match self.input.next() {
                Ok(Some(rune)) => rune,
                Ok(None) => return None,
                Err(err) => return self.recover(err),
            };

            match rune {
                '}' => match self.input.peek() {
                    Ok(Some('}')) => {
                        self.input.accept();
                        self.send(Token::right_meta())?;
                        return Some(State::Plaintext);
                    }
                    Ok(_) => continue,
                    Err(err) => return self.recover(err),
                },
                rune if is_letter(rune) => {
                    self.buf.push(rune);
                    return Some(State::Identifier);
                }
                // Whitespace and stray characters are dropped.
                _ => continue,
            }
        }
    }

    fn lex_identifier(&mut self) -> Option<State> {
        loop {
            match self.input.next() {
                Ok(Some(rune)) if is_identifier_rune(rune) => self.buf.push(rune),
                Ok(rest) => {
                    if let Some(rune) = rest {
                        self.input.backup(rune);
                    }
                    let kind = TokenKind::keyword(&self.buf).unwrap_or(TokenKind::Identifier);
                    self.emit(kind)?;
                    return Some(State::TagBody);
                }
                Err(err) => return self.recover(err),
            }
        }
    }

    /// Sends the buffered text as a token of `kind` and clears the buffer.
    fn emit(&mut self, kind: TokenKind) -> Option<()> {
        let value = mem::take(&mut self.buf);
        self.send(Token::new(kind, value))
    }

    fn send(&mut self, token: Token) -> Option<()> {
        tracing::trace!(%token, "lex out");
        match self.out.send(token) {
            Ok(()) => Some(()),
            Err(_) => {
                tracing::debug!("token receiver hung up, stopping scan");
                None
            }
        }
    }

    fn emit_error(&mut self, message: impl Into<String>) -> Option<()> {
        let message = message.into();
        tracing::debug!(%message, "lex error");
        self.send(Token::new(TokenKind::Error, message))
    }

    /// Reports an error the scanner does not recover from.
    fn fatal(&mut self, message: &str) -> Option<State> {
        self.buf.clear();
        self.emit_error(message);
        None
    }

    /// Reports a read failure, then resumes plaintext scanning after the next
    /// line break.
    fn recover(&mut self, err: io::Error) -> Option<State> {
        self.buf.clear();
        self.emit_error(format!("lex error: {err}"))?;
        match self.input.skip_line() {
            Ok(()) => Some(State::Plaintext),
            Err(err) => {
                tracing::debug!(%err, "read failed during recovery, halting");
                None
            }
        }
    }

    fn done(mut self) {
        let _ = self.send(Token::eof());
    }
}

impl<R: Read> RuneReader<R> {
    fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            pending: None,
        }
    }

    fn next(&mut self) -> io::Result<Option<char>> {
        if let Some(rune) = self.pending.take() {
            return Ok(Some(rune));
        }

        let Some(lead) = self.peek_byte()? else {
            return Ok(None);
        };
        self.inner.consume(1);

        let width = utf8_width(lead);
        if width == 0 {
            return Ok(Some(char::REPLACEMENT_CHARACTER));
        }

        let mut bytes = [lead, 0, 0, 0];
        for (i, slot) in bytes.iter_mut().enumerate().take(width).skip(1) {
            // A byte outside the accepted range is left unread, so a line break
            // or the start of the next sequence after a truncated one survives.
            match self.peek_byte()? {
                Some(byte) if continuation_range(lead, i).contains(&byte) => {
                    self.inner.consume(1);
                    *slot = byte;
                }
                _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }

        let rune = std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some(rune))
    }

    fn peek(&mut self) -> io::Result<Option<char>> {
        let rune = self.next()?;
        if let Some(rune) = rune {
            self.backup(rune);
        }
        Ok(rune)
    }

    fn backup(&mut self, rune: char) {
        self.pending = Some(rune);
    }

    /// Consumes a rune previously returned by [`RuneReader::peek`].
    fn accept(&mut self) {
        self.pending = None;
    }

    /// Discards input up to and including the next `\n` or `\r`.
    fn skip_line(&mut self) -> io::Result<()> {
        if let Some(rune) = self.pending.take() {
            if rune == '\n' || rune == '\r' {
                return Ok(());
            }
        }

        while let Some(byte) = self.peek_byte()? {
            self.inner.consume(1);
            if byte == b'\n' || byte == b'\r' {
                break;
            }
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

/// Starts a scanner over `source` on its own thread and returns the receiving
/// end of its token channel.
pub fn spawn<R>(source: R, options: &ParseOptions) -> EinResult<Receiver<Token>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(0);
    let dispatch = options.dispatch.clone();

    thread::Builder::new()
        .name(options.scanner_thread_name.clone())
        .spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || Scanner::new(source, tx).run())
        })
        .map_err(EinError::Spawn)?;

    Ok(rx)
}

/// Scans all of `source`, returning every token including the final
/// end-of-input token.
pub fn lex_all<R>(source: R) -> EinResult<Vec<Token>>
where
    R: Read + Send + 'static,
{
    let rx = spawn(source, &ParseOptions::default())?;
    Ok(rx.into_iter().collect())
}

/// Scans a string. See [`lex_all`].
pub fn lex_str(source: &str) -> EinResult<Vec<Token>> {
    lex_all(Cursor::new(source.to_owned()))
}

fn is_letter(rune: char) -> bool {
    rune.general_category_group() == GeneralCategoryGroup::Letter
}

fn is_identifier_rune(rune: char) -> bool {
    is_letter(rune) || rune.general_category() == GeneralCategory::DecimalNumber || rune == '_'
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Bytes allowed at position `i` of a sequence starting with `lead`. Overlong
/// forms, surrogates and code points past U+10FFFF are excluded here.
fn continuation_range(lead: u8, i: usize) -> RangeInclusive<u8> {
    match (lead, i) {
        (0xE0, 1) => 0xA0..=0xBF,
        (0xED, 1) => 0x80..=0x9F,
        (0xF0, 1) => 0x90..=0xBF,
        (0xF4, 1) => 0x80..=0x8F,
        _ => 0x80..=0xBF,
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: {}}}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runes(input: &[u8]) -> Vec<io::Result<Option<char>>> {
        let mut reader = RuneReader::new(input);
        let mut out = Vec::new();
        loop {
            let rune = reader.next();
            let stop = matches!(rune, Ok(None));
            out.push(rune);
            if stop || out.len() > 16 {
                return out;
            }
        }
    }

    #[test]
    fn rune_reader_decodes_multibyte() {
        let decoded: Vec<char> = runes("aé🌍".as_bytes())
            .into_iter()
            .filter_map(|r| r.ok().flatten())
            .collect();
        assert_eq!(decoded, vec!['a', 'é', '🌍']);
    }

    #[test]
    fn rune_reader_replaces_invalid_lead_byte() {
        let decoded: Vec<char> = runes(&[b'a', 0xFF, b'b'])
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(decoded, vec!['a', char::REPLACEMENT_CHARACTER, 'b']);
    }

    #[test]
    fn rune_reader_leaves_line_break_after_truncated_sequence() {
        let mut reader = RuneReader::new(&[0xC3, b'\n', b'x'][..]);
        assert!(matches!(reader.next(), Ok(Some(char::REPLACEMENT_CHARACTER))));
        assert!(matches!(reader.next(), Ok(Some('\n'))));
        assert!(matches!(reader.next(), Ok(Some('x'))));
    }

    #[test]
    fn rune_reader_replaces_each_byte_of_a_surrogate() {
        // ED A0 80 would encode U+D800.
        let decoded: Vec<char> = runes(&[0xED, 0xA0, 0x80, b'z'])
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(decoded, vec!['\u{FFFD}', '\u{FFFD}', '\u{FFFD}', 'z']);
    }

    #[test]
    fn identifier_classes_follow_general_category() {
        assert!(is_letter('x'));
        assert!(is_letter('é'));
        assert!(!is_letter('\u{2160}')); // ROMAN NUMERAL ONE is Nl
        assert!(is_identifier_rune('\u{0663}')); // ARABIC-INDIC DIGIT THREE is Nd
        assert!(!is_identifier_rune('\u{00B2}')); // SUPERSCRIPT TWO is No
        assert!(!is_identifier_rune(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut reader = RuneReader::new(&b"xy"[..]);
        assert!(matches!(reader.peek(), Ok(Some('x'))));
        assert!(matches!(reader.next(), Ok(Some('x'))));
        assert!(matches!(reader.next(), Ok(Some('y'))));
        assert!(matches!(reader.peek(), Ok(None)));
    }

    #[test]
    fn keyword_table() {
        assert_eq!(TokenKind::keyword("if"), Some(TokenKind::If));
        assert_eq!(TokenKind::keyword("else"), Some(TokenKind::Else));
        assert_eq!(TokenKind::keyword("end"), Some(TokenKind::End));
        assert_eq!(TokenKind::keyword("for"), None);
        assert_eq!(TokenKind::keyword("If"), None);
    }

    #[test]
    fn token_display() {
        assert_eq!(Token::eof().to_string(), "{EOF: EOF}");
        assert_eq!(Token::keyword(TokenKind::End).to_string(), "{end: end}");
        assert_eq!(Token::new(TokenKind::Identifier, "x").to_string(), "{ident: x}");
    }

    #[test]
    fn scanner_stops_when_receiver_hangs_up() {
        let (tx, rx) = mpsc::sync_channel(0);
        drop(rx);
        // Must return rather than block.
        Scanner::new(&b"text {{x}} more"[..], tx).run();
    }
}
