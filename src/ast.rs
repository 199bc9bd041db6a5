use std::fmt;

use crate::{lexer::Token, reader::Terminator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Invalid,
    Identifier,
    Plaintext,
    List,
    If,
    Block, // reserved
    End,
    Else,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Plaintext(String),
    Identifier(String), // looked up in an `Environment` at render time
    List(ListNode),
    If(IfNode),
    End,
    Else,
}

/// An ordered run of nodes: the whole template, or the body of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ListNode {
    pub(crate) children: Vec<Node>,
    pub(crate) root: bool,
    pub(crate) terminators: Vec<Terminator>,
}

/// `{{if cond}} ... [{{else}} ...] {{end}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub(crate) condition: Vec<Token>,
    pub(crate) true_branch: ListNode,
    pub(crate) false_branch: Option<ListNode>,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Invalid => "invalid",
            NodeKind::Identifier => "identifier",
            NodeKind::Plaintext => "plaintext",
            NodeKind::List => "list",
            NodeKind::If => "if",
            NodeKind::Block => "block",
            NodeKind::End => "end",
            NodeKind::Else => "else",
        }
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Plaintext(_) => NodeKind::Plaintext,
            Node::Identifier(_) => NodeKind::Identifier,
            Node::List(_) => NodeKind::List,
            Node::If(_) => NodeKind::If,
            Node::End => NodeKind::End,
            Node::Else => NodeKind::Else,
        }
    }

    /// Direct children. Only lists have any; an if exposes its branches through
    /// [`IfNode::true_branch`] and [`IfNode::false_branch`] instead.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::List(list) => list.children(),
            _ => &[],
        }
    }

    /// Compares kinds and children recursively, ignoring text, names and
    /// conditions.
    pub fn matches_shape(&self, other: &Node) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        let (left, right) = (self.children(), other.children());
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(l, r)| l.matches_shape(r))
    }
}

impl ListNode {
    /// The outermost list, which ends only at end of input.
    pub fn root() -> Self {
        Self {
            children: Vec::with_capacity(4),
            root: true,
            terminators: Vec::new(),
        }
    }

    /// A block body that ends at the first of `terminators` to match.
    pub fn nested(terminators: &[Terminator]) -> Self {
        debug_assert!(!terminators.is_empty());
        Self {
            children: Vec::with_capacity(4),
            root: false,
            terminators: terminators.to_vec(),
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn terminators(&self) -> &[Terminator] {
        &self.terminators
    }

    /// Builds a list with the given children, as the parser would have.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub(crate) fn push(&mut self, child: Node) {
        self.children.push(child);
    }
}

impl IfNode {
    /// An if whose branches are still to be parsed. The true branch ends at
    /// `{{end}}` or `{{else}}`.
    pub fn new(condition: Vec<Token>) -> Self {
        Self {
            condition,
            true_branch: ListNode::nested(&[Terminator::BeforeEnd, Terminator::BeforeElse]),
            false_branch: None,
        }
    }

    /// The tokens between `if` and the closing `}}`.
    pub fn condition(&self) -> &[Token] {
        &self.condition
    }

    pub fn true_branch(&self) -> &ListNode {
        &self.true_branch
    }

    /// Present only when the source had an `{{else}}`.
    pub fn false_branch(&self) -> Option<&ListNode> {
        self.false_branch.as_ref()
    }

    pub fn with_true_branch(mut self, children: Vec<Node>) -> Self {
        self.true_branch.children = children;
        self
    }

    pub fn with_false_branch(mut self, children: Vec<Node>) -> Self {
        self.false_branch = Some(ListNode::nested(&[Terminator::BeforeEnd]).with_children(children));
        self
    }
}

// Display output is for diagnostics. It is not template source and does not
// parse back to the same tree.

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Plaintext(text) => write!(f, "[text: {text:?}]"),
            Node::Identifier(name) => write!(f, "[ident: {name:?}]"),
            Node::List(list) => fmt::Display::fmt(list, f),
            Node::If(node) => fmt::Display::fmt(node, f),
            Node::End => f.write_str("[end]"),
            Node::Else => f.write_str("[else]"),
        }
    }
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminators: Vec<&str> = self.terminators.iter().map(|t| t.name()).collect();
        write!(
            f,
            "[list ({}, {}, {:?}): [",
            self.root,
            self.children.len(),
            terminators
        )?;
        for child in &self.children {
            fmt::Display::fmt(child, f)?;
        }
        f.write_str("]]")
    }
}

impl fmt::Display for IfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[if cond:[")?;
        for (i, token) in self.condition.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            fmt::Display::fmt(token, f)?;
        }
        write!(f, "] true:{} false:", self.true_branch)?;
        match &self.false_branch {
            Some(branch) => fmt::Display::fmt(branch, f)?,
            None => f.write_str("nil")?,
        }
        f.write_str("]")
    }
}

impl From<ListNode> for Node {
    fn from(list: ListNode) -> Self {
        Node::List(list)
    }
}

impl From<IfNode> for Node {
    fn from(node: IfNode) -> Self {
        Node::If(node)
    }
}
