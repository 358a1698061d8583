//! Nodes
//!
//! A node is an opaque formatting object.
//! Nodes are owned by the formatter that is built on top of Rofflang;
//!     the engine only stores nodes in buffers and replays them through the token stream.
//! The [Node] trait is the narrow interface the engine needs.
//!
//! The engine itself creates two kinds of node:
//!     [TokenNode], which carries a token that was pushed back into the input,
//!     and [EscapeNode], which is the default representation of escapes
//!     like `\h'1i'` or `\X'...'` when the state does not build its own node.

use crate::token::Token;
use std::any::Any;
use std::fmt;

/// Implementations of this trait are formatting objects that can appear in the input.
pub trait Node: fmt::Debug + 'static {
    /// Clone the node into a new box.
    fn box_clone(&self) -> Box<dyn Node>;

    /// Best-effort textual rendering of the node.
    ///
    /// This is used by the `asciify` operation and when writing output as text.
    fn render_to_text(&self) -> String;

    /// Whether this node is equal to another node.
    fn is_equal(&self, other: &dyn Node) -> bool;

    /// A short human readable name of the kind of node.
    fn type_name(&self) -> &'static str;

    /// Whether the node can be reverted to plain text by the `unformat` operation.
    ///
    /// Nodes that return false are dropped.
    fn unformat(&self) -> bool {
        false
    }

    /// If this node wraps a token, returns the token.
    ///
    /// When read from the input, such a node is replaced by the token it wraps.
    fn as_token(&self) -> Option<&Token> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A handle to a node.
pub struct NodeHandle {
    node: Box<dyn Node>,
    diversion_level: usize,
}

impl NodeHandle {
    pub fn new<N: Node>(node: N) -> NodeHandle {
        NodeHandle {
            node: Box::new(node),
            diversion_level: 0,
        }
    }

    pub fn from_box(node: Box<dyn Node>) -> NodeHandle {
        NodeHandle {
            node,
            diversion_level: 0,
        }
    }

    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }

    pub fn render_to_text(&self) -> String {
        self.node.render_to_text()
    }

    pub fn as_token(&self) -> Option<&Token> {
        self.node.as_token()
    }

    pub fn downcast_ref<T: Node>(&self) -> Option<&T> {
        self.node.as_any().downcast_ref::<T>()
    }

    /// The diversion nesting level at which the node was last read out of a diversion.
    pub fn diversion_level(&self) -> usize {
        self.diversion_level
    }

    pub(crate) fn set_diversion_level(&mut self, level: usize) {
        self.diversion_level = level;
    }
}

impl Clone for NodeHandle {
    fn clone(&self) -> Self {
        NodeHandle {
            node: self.node.box_clone(),
            diversion_level: self.diversion_level,
        }
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.node.is_equal(other.node.as_ref())
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({:?})", self.node)
    }
}

/// Node that carries a token.
///
/// This is how a request that read one token too far gives the token back.
#[derive(Clone, Debug)]
pub struct TokenNode(pub Token);

impl Node for TokenNode {
    fn box_clone(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn render_to_text(&self) -> String {
        match &self.0 {
            Token::Char(c) => (*c as char).to_string(),
            Token::Space | Token::UnstretchableSpace | Token::StretchableSpace => " ".into(),
            Token::Tab => "\t".into(),
            Token::Newline => "\n".into(),
            Token::Node(node) => node.render_to_text(),
            _ => String::new(),
        }
    }

    fn is_equal(&self, other: &dyn Node) -> bool {
        match other.as_any().downcast_ref::<TokenNode>() {
            None => false,
            Some(other) => self.0 == other.0,
        }
    }

    fn type_name(&self) -> &'static str {
        "token"
    }

    fn unformat(&self) -> bool {
        matches!(self.0, Token::Char(_) | Token::Space)
    }

    fn as_token(&self) -> Option<&Token> {
        Some(&self.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Node created by the engine for an escape whose formatting meaning is external.
///
/// The argument is the escape's argument as text, if it has one.
/// For example `\h'1i'` yields an escape node with escape `h` and argument `1i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscapeNode {
    pub escape: u8,
    pub argument: String,
}

impl EscapeNode {
    pub fn new<T: Into<String>>(escape: u8, argument: T) -> EscapeNode {
        EscapeNode {
            escape,
            argument: argument.into(),
        }
    }
}

impl Node for EscapeNode {
    fn box_clone(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn render_to_text(&self) -> String {
        match self.escape {
            b'0' => " ".into(),
            b't' => "\t".into(),
            b'z' | b'Z' => self.argument.clone(),
            // Overstrikes and brackets are approximated by their first glyph.
            b'o' | b'b' => self.argument.chars().take(1).collect(),
            _ => String::new(),
        }
    }

    fn is_equal(&self, other: &dyn Node) -> bool {
        match other.as_any().downcast_ref::<EscapeNode>() {
            None => false,
            Some(other) => self == other,
        }
    }

    fn type_name(&self) -> &'static str {
        match self.escape {
            b'h' | b'0' | b'|' | b'^' | b',' => "horizontal motion",
            b'v' | b'u' | b'd' | b'r' => "vertical motion",
            b'x' => "extra line space",
            b'l' | b'L' => "line",
            b'D' => "drawing command",
            b'X' | b'Y' => "device control",
            b'o' => "overstrike",
            b'b' => "bracket",
            b'z' | b'Z' => "zero width",
            b'?' => "non-interpreted input",
            b'a' | b't' => "non-interpreted character",
            _ => "escape",
        }
    }

    fn unformat(&self) -> bool {
        matches!(self.escape, b'0' | b't' | b'z' | b'Z')
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_preserves_equality() {
        let node = NodeHandle::new(EscapeNode::new(b'h', "1i"));
        let other = node.clone();
        assert_eq!(node, other);
        assert_ne!(node, NodeHandle::new(EscapeNode::new(b'h', "2i")));
    }

    #[test]
    fn nodes_of_different_kinds_are_not_equal() {
        let a = NodeHandle::new(EscapeNode::new(b'z', "a"));
        let b = NodeHandle::new(TokenNode(Token::Char(b'a')));
        assert_ne!(a, b);
        assert_eq!(a.render_to_text(), b.render_to_text());
    }

    #[test]
    fn token_node_unwraps() {
        let node = NodeHandle::new(TokenNode(Token::Newline));
        assert_eq!(node.as_token(), Some(&Token::Newline));
        assert!(node.downcast_ref::<TokenNode>().is_some());
        assert!(node.downcast_ref::<EscapeNode>().is_none());
    }
}
