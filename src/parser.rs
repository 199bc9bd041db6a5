use std::io::{Cursor, Read};

use crate::{
    ast::*,
    lexer::{self, Token, TokenKind},
    reader::{Terminator, TokenReader},
    EinResult, InternalError, ParseError, ParseOptions,
};

/// Parses template source into its root list, with default options.
pub fn parse<R>(source: R) -> EinResult<ListNode>
where
    R: Read + Send + 'static,
{
    parse_with(source, &ParseOptions::default())
}

/// Parses template source into its root list.
///
/// The scanner runs on its own thread for the duration of the parse. The first
/// failure ends the parse; no partial tree is returned.
pub fn parse_with<R>(source: R, options: &ParseOptions) -> EinResult<ListNode>
where
    R: Read + Send + 'static,
{
    tracing::dispatcher::with_default(&options.dispatch, || -> EinResult<ListNode> {
        let mut reader = TokenReader::new(lexer::spawn(source, options)?);
        let mut root = ListNode::root();
        root.parse_body(&mut reader)?;
        Ok(root)
    })
}

pub fn parse_str(source: &str) -> EinResult<ListNode> {
    parse(Cursor::new(source.to_owned()))
}

/// Builds the node for the tokens between `{{` and `}}`.
pub fn parse_tag(tokens: Vec<Token>) -> Result<Node, ParseError> {
    tracing::debug!(count = tokens.len(), "parse tag");

    if let Some(err) = tokens.iter().find(|t| t.is(TokenKind::Error)) {
        return Err(ParseError::Lexical(err.value.clone()));
    }

    match tokens.as_slice() {
        [] => Err(ParseError::EmptyTag),
        [only] if only.is(TokenKind::Identifier) => Ok(Node::Identifier(only.value.clone())),
        [only] if only.is(TokenKind::End) => Ok(Node::End),
        [only] if only.is(TokenKind::Else) => Ok(Node::Else),
        [first] if first.is(TokenKind::If) => Err(ParseError::MissingCondition),
        [first, condition @ ..] if first.is(TokenKind::If) => {
            Ok(Node::If(IfNode::new(condition.to_vec())))
        }
        _ => Err(ParseError::UnrecognizedTag(tokens)),
    }
}

impl Node {
    /// Parses whatever follows this node's tag. Leaves have nothing to parse.
    pub(crate) fn parse_body(&mut self, reader: &mut TokenReader) -> EinResult<()> {
        match self {
            Node::List(list) => list.parse_body(reader),
            Node::If(node) => node.parse_body(reader),
            Node::Plaintext(_) | Node::Identifier(_) | Node::End | Node::Else => Ok(()),
        }
    }
}

impl ListNode {
    pub(crate) fn parse_body(&mut self, reader: &mut TokenReader) -> EinResult<()> {
        while !self.at_end(reader)? {
            let token = reader.read()?;
            match token.kind {
                TokenKind::LeftMeta => {
                    let tokens = reader.read_until(TokenKind::RightMeta)?;
                    let mut child = parse_tag(tokens)?;
                    reader.read()?; // }}
                    child.parse_body(reader)?;
                    self.push(child);
                }
                TokenKind::Plaintext => self.push(Node::Plaintext(token.value)),
                TokenKind::Error => return Err(ParseError::Lexical(token.value).into()),
                TokenKind::EndOfInput if self.root => return Ok(()),
                TokenKind::EndOfInput => return Err(ParseError::UnexpectedEof.into()),
                _ => return Err(ParseError::UnexpectedToken(token).into()),
            }
        }
        Ok(())
    }

    fn at_end(&self, reader: &mut TokenReader) -> Result<bool, InternalError> {
        for terminator in &self.terminators {
            if terminator.matches(reader)? {
                tracing::debug!(%terminator, "hit list end");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl IfNode {
    pub(crate) fn parse_body(&mut self, reader: &mut TokenReader) -> EinResult<()> {
        self.true_branch.parse_body(reader)?;

        if Terminator::BeforeEnd.matches(reader)? {
            reader.read_n(3)?;
            return Ok(());
        }

        if Terminator::BeforeElse.matches(reader)? {
            reader.read_n(3)?;
            let mut false_branch = ListNode::nested(&[Terminator::BeforeEnd]);
            false_branch.parse_body(reader)?;
            reader.read_n(3)?;
            self.false_branch = Some(false_branch);
            return Ok(());
        }

        Err(InternalError::UnresolvedBranch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name)
    }

    #[test]
    fn tag_shapes() {
        assert_eq!(parse_tag(vec![ident("x")]), Ok(Node::Identifier("x".into())));
        assert_eq!(parse_tag(vec![Token::keyword(TokenKind::End)]), Ok(Node::End));
        assert_eq!(parse_tag(vec![Token::keyword(TokenKind::Else)]), Ok(Node::Else));
        assert_eq!(
            parse_tag(vec![Token::keyword(TokenKind::If), ident("a"), ident("b")]),
            Ok(Node::If(IfNode::new(vec![ident("a"), ident("b")])))
        );
    }

    #[test]
    fn tag_errors() {
        assert_eq!(parse_tag(vec![]), Err(ParseError::EmptyTag));
        assert_eq!(
            parse_tag(vec![Token::keyword(TokenKind::If)]),
            Err(ParseError::MissingCondition)
        );
        assert_eq!(
            parse_tag(vec![ident("a"), ident("b")]),
            Err(ParseError::UnrecognizedTag(vec![ident("a"), ident("b")]))
        );
        assert_eq!(
            parse_tag(vec![Token::keyword(TokenKind::End), ident("x")]),
            Err(ParseError::UnrecognizedTag(vec![Token::keyword(TokenKind::End), ident("x")]))
        );
        assert_eq!(
            parse_tag(vec![ident("a"), Token::new(TokenKind::Error, "bad")]),
            Err(ParseError::Lexical("bad".into()))
        );
    }

    #[test]
    fn nested_if_keeps_its_own_end() {
        let root = parse_str("{{if a}}{{if b}}x{{end}}y{{end}}z").unwrap();

        let inner = IfNode::new(vec![ident("b")]).with_true_branch(vec![Node::Plaintext("x".into())]);
        let outer = IfNode::new(vec![ident("a")])
            .with_true_branch(vec![Node::If(inner), Node::Plaintext("y".into())]);
        let expected = ListNode::root().with_children(vec![Node::If(outer), Node::Plaintext("z".into())]);

        assert_eq!(root, expected);
    }

    #[test]
    fn unterminated_if_is_unexpected_eof() {
        let err = parse_str("{{if a}}never closed").unwrap_err();
        assert_eq!(err.as_parse(), Some(&ParseError::UnexpectedEof));
        assert!(!err.is_internal());
    }
}
