//! Element buffers
//!
//! An [ElementBuffer] is the storage of a macro, string or diversion:
//!     a sequence of [Element]s, each of which is either a byte or a node.
//! Buffers are cheap to clone.
//! The elements are shared between clones, and a mutation of a shared buffer first
//!     copies the elements so that other holders of the buffer do not observe the change.

use crate::node::NodeHandle;
use crate::token::control;
use std::fmt;
use std::rc::Rc;

/// A single element of the input.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Byte(u8),
    Node(NodeHandle),
}

impl Element {
    /// Returns the byte, if this is a byte element.
    #[inline]
    pub fn byte(&self) -> Option<u8> {
        match self {
            Element::Byte(b) => Some(*b),
            Element::Node(_) => None,
        }
    }

    #[inline]
    pub fn is_byte(&self, b: u8) -> bool {
        matches!(self, Element::Byte(c) if *c == b)
    }

    /// Whether the element is a compatibility mode marker.
    #[inline]
    fn is_mode_marker(&self) -> bool {
        matches!(self, Element::Byte(b) if control::is_mode_marker(*b))
    }
}

/// Location in an input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_name: Rc<str>,
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_name, self.line)
    }
}

/// Buffer of elements.
#[derive(Clone, Debug, Default)]
pub struct ElementBuffer {
    elements: Rc<Vec<Element>>,
    location: Option<SourceLocation>,
    is_diversion: bool,
}

/// Buffers are equal if their elements are equal.
impl PartialEq for ElementBuffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.elements, &other.elements) || self.elements == other.elements
    }
}

/// Error returned when chopping a buffer with no logical content.
#[derive(Debug, PartialEq, Eq)]
pub struct EmptyBufferError;

impl fmt::Display for EmptyBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot chop empty macro")
    }
}

impl std::error::Error for EmptyBufferError {}

/// Warning issued when substring indices are clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstringWarning {
    /// The whole range is outside the buffer; the result is empty.
    OutOfRange,
    StartClamped,
    EndClamped,
}

impl SubstringWarning {
    pub fn message(&self) -> &'static str {
        match self {
            SubstringWarning::OutOfRange => "start and end index of substring out of range",
            SubstringWarning::StartClamped => "start index of substring out of range, set to 0",
            SubstringWarning::EndClamped => {
                "end index of substring out of range, set to string length"
            }
        }
    }
}

impl ElementBuffer {
    pub fn new() -> ElementBuffer {
        Default::default()
    }

    /// Creates an empty buffer that records where it was defined.
    pub fn with_location(location: Option<SourceLocation>) -> ElementBuffer {
        ElementBuffer {
            location,
            ..Default::default()
        }
    }

    /// Creates an empty buffer that holds a diversion.
    pub fn new_diversion() -> ElementBuffer {
        ElementBuffer {
            is_diversion: true,
            ..Default::default()
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> ElementBuffer {
        let mut buffer = ElementBuffer::new();
        buffer.append_bytes(bytes);
        buffer
    }

    #[inline]
    fn elements_mut(&mut self) -> &mut Vec<Element> {
        Rc::make_mut(&mut self.elements)
    }

    #[inline]
    pub fn append_byte(&mut self, b: u8) {
        self.elements_mut().push(Element::Byte(b));
    }

    pub fn append_node(&mut self, node: NodeHandle) {
        self.elements_mut().push(Element::Node(node));
    }

    pub fn append(&mut self, element: Element) {
        self.elements_mut().push(element);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.elements_mut()
            .extend(bytes.iter().map(|b| Element::Byte(*b)));
    }

    pub fn append_str(&mut self, s: &str) {
        self.append_bytes(s.as_bytes())
    }

    /// Appends all of the elements of another buffer.
    pub fn append_buffer(&mut self, other: &ElementBuffer) {
        if self.elements.is_empty() {
            self.elements = other.elements.clone();
            return;
        }
        self.elements_mut().extend(other.elements.iter().cloned());
    }

    #[inline]
    pub fn get(&self, offset: usize) -> Option<&Element> {
        self.elements.get(offset)
    }

    /// Overwrites the element at the offset with a byte.
    ///
    /// Offsets past the end are ignored.
    pub fn set(&mut self, offset: usize, b: u8) {
        if offset < self.elements.len() {
            self.elements_mut()[offset] = Element::Byte(b);
        }
    }

    /// Number of elements, including compatibility mode markers.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Number of elements excluding compatibility mode markers.
    pub fn logical_len(&self) -> usize {
        self.elements
            .iter()
            .filter(|element| !element.is_mode_marker())
            .count()
    }

    /// Whether the buffer has no logical content.
    pub fn is_empty(&self) -> bool {
        self.elements.iter().all(Element::is_mode_marker)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of buffers sharing the same elements.
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.elements)
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    pub fn is_diversion(&self) -> bool {
        self.is_diversion
    }

    /// Removes the last logical element.
    ///
    /// Trailing pairs of compatibility mode markers left behind by empty appends are
    ///     removed along the way, and a trailing pop marker is preserved.
    pub fn chop(&mut self) -> Result<(), EmptyBufferError> {
        let elements = &self.elements;
        let mut len = elements.len();
        let mut have_restore = false;
        loop {
            if len == 0 || !elements[len - 1].is_byte(control::POP_GROFFCOMP_MODE) {
                break;
            }
            have_restore = true;
            len -= 1;
            if len == 0
                || !(elements[len - 1].is_byte(control::PUSH_GROFF_MODE)
                    || elements[len - 1].is_byte(control::PUSH_COMP_MODE))
            {
                break;
            }
            have_restore = false;
            len -= 1;
        }
        if len == 0 {
            return Err(EmptyBufferError);
        }
        let elements = self.elements_mut();
        if have_restore {
            elements.truncate(len);
            elements[len - 1] = Element::Byte(control::POP_GROFFCOMP_MODE);
        } else {
            elements.truncate(len - 1);
        }
        Ok(())
    }

    /// Returns the logical elements from `start` to `end` inclusive.
    ///
    /// Negative indices count from the end of the buffer.
    /// Reversed indices are swapped.
    /// Indices out of range are clamped, and a range entirely outside of the buffer
    ///     gives an empty buffer; both cases are reported as warnings.
    /// Compatibility mode markers are not part of the result.
    pub fn substring(&self, start: i64, end: i64) -> (ElementBuffer, Vec<SubstringWarning>) {
        let logical: Vec<&Element> = self
            .elements
            .iter()
            .filter(|element| !element.is_mode_marker())
            .collect();
        let real_length = logical.len() as i64;
        let (mut start, mut end) = (start, end);
        if start < 0 {
            start += real_length;
        }
        if end < 0 {
            end += real_length;
        }
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let mut warnings = vec![];
        if start >= real_length || end < 0 {
            warnings.push(SubstringWarning::OutOfRange);
            return (ElementBuffer::new(), warnings);
        }
        if start < 0 {
            warnings.push(SubstringWarning::StartClamped);
            start = 0;
        }
        if end >= real_length {
            warnings.push(SubstringWarning::EndClamped);
            end = real_length - 1;
        }
        let mut result = ElementBuffer::new();
        result
            .elements_mut()
            .extend(logical[start as usize..=end as usize].iter().map(|e| (*e).clone()));
        (result, warnings)
    }

    /// Returns a copy of the buffer in which every node is replaced by its text rendering.
    pub fn asciify(&self) -> ElementBuffer {
        let mut result = ElementBuffer::with_location(self.location.clone());
        for element in self.elements.iter() {
            match element {
                Element::Byte(b) => result.append_byte(*b),
                Element::Node(node) => result.append_str(&node.render_to_text()),
            }
        }
        result
    }

    /// Returns a copy of the buffer keeping the bytes and the nodes that can be
    ///     reverted to plain text.
    pub fn unformat(&self) -> ElementBuffer {
        let mut result = ElementBuffer::with_location(self.location.clone());
        for element in self.elements.iter() {
            match element {
                Element::Byte(b) => result.append_byte(*b),
                Element::Node(node) => {
                    if node.node().unformat() {
                        result.append_node(node.clone())
                    }
                }
            }
        }
        result
    }

    /// Plain text rendering of the buffer.
    ///
    /// Control bytes that stand for escapes are written as the escape,
    ///     and the other control bytes are dropped.
    pub fn to_text(&self) -> String {
        let mut s = String::new();
        for element in self.elements.iter() {
            match element {
                Element::Byte(b) if control::is_invalid_input_byte(*b) => {
                    s.push_str(control::asciify(*b))
                }
                Element::Byte(b) => s.push(*b as char),
                Element::Node(node) => s.push_str(&node.render_to_text()),
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EscapeNode;

    fn buffer(s: &str) -> ElementBuffer {
        ElementBuffer::from_bytes(s.as_bytes())
    }

    #[test]
    fn copy_on_write() {
        let mut a = buffer("abc");
        let b = a.clone();
        assert_eq!(a.share_count(), 2);
        a.append_byte(b'd');
        assert_eq!(a.share_count(), 1);
        assert_eq!(b.share_count(), 1);
        assert_eq!(a.to_text(), "abcd");
        assert_eq!(b.to_text(), "abc");
    }

    #[test]
    fn set_does_not_leak_into_clones() {
        let mut a = buffer("abc");
        let b = a.clone();
        a.set(1, b'x');
        assert_eq!(a.to_text(), "axc");
        assert_eq!(b.to_text(), "abc");
    }

    #[test]
    fn chop_removes_last_element() {
        let mut a = buffer("abc");
        a.chop().unwrap();
        assert_eq!(a.to_text(), "ab");
    }

    #[test]
    fn chop_empty_is_an_error() {
        let mut a = ElementBuffer::new();
        assert_eq!(a.chop(), Err(EmptyBufferError));
    }

    #[test]
    fn chop_markers_only_is_an_error() {
        let mut a = ElementBuffer::from_bytes(&[
            control::PUSH_GROFF_MODE,
            control::POP_GROFFCOMP_MODE,
        ]);
        assert_eq!(a.chop(), Err(EmptyBufferError));
    }

    #[test]
    fn chop_keeps_trailing_pop_marker() {
        let mut a = ElementBuffer::from_bytes(&[
            control::PUSH_GROFF_MODE,
            b'a',
            b'b',
            control::POP_GROFFCOMP_MODE,
        ]);
        a.chop().unwrap();
        assert_eq!(
            a.elements(),
            &[
                Element::Byte(control::PUSH_GROFF_MODE),
                Element::Byte(b'a'),
                Element::Byte(control::POP_GROFFCOMP_MODE),
            ]
        );
    }

    #[test]
    fn chop_skips_empty_marker_pairs() {
        let mut a = ElementBuffer::from_bytes(&[
            b'a',
            b'b',
            control::PUSH_COMP_MODE,
            control::POP_GROFFCOMP_MODE,
        ]);
        a.chop().unwrap();
        assert_eq!(a.to_text(), "a");
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn substring_basic() {
        let (s, warnings) = buffer("abcdef").substring(1, 3);
        assert_eq!(s.to_text(), "bcd");
        assert!(warnings.is_empty());
    }

    #[test]
    fn substring_negative_indices() {
        let (s, warnings) = buffer("abcdef").substring(-2, -1);
        assert_eq!(s.to_text(), "ef");
        assert!(warnings.is_empty());
    }

    #[test]
    fn substring_swaps_and_clamps() {
        let (s, warnings) = buffer("abc").substring(5, 2);
        assert_eq!(s.to_text(), "c");
        assert_eq!(warnings, vec![SubstringWarning::EndClamped]);
    }

    #[test]
    fn substring_clamps_start() {
        let (s, warnings) = buffer("abc").substring(-5, 1);
        assert_eq!(s.to_text(), "ab");
        assert_eq!(warnings, vec![SubstringWarning::StartClamped]);
    }

    #[test]
    fn substring_out_of_range_is_empty() {
        let (s, warnings) = buffer("abc").substring(3, 7);
        assert!(s.is_empty());
        assert_eq!(warnings, vec![SubstringWarning::OutOfRange]);
    }

    #[test]
    fn substring_skips_mode_markers() {
        let a = ElementBuffer::from_bytes(&[
            control::PUSH_COMP_MODE,
            b'a',
            b'b',
            control::POP_GROFFCOMP_MODE,
        ]);
        assert_eq!(a.logical_len(), 2);
        let (s, _) = a.substring(1, 1);
        assert_eq!(s.elements(), &[Element::Byte(b'b')]);
    }

    #[test]
    fn asciify_renders_nodes() {
        let mut a = buffer("x");
        a.append_node(NodeHandle::new(EscapeNode::new(b'Z', "yz")));
        a.append_node(NodeHandle::new(EscapeNode::new(b'h', "1i")));
        let asciified = a.asciify();
        assert_eq!(asciified.elements().len(), 3);
        assert_eq!(asciified.to_text(), "xyz");
    }

    #[test]
    fn unformat_drops_nodes_that_do_not_opt_in() {
        let mut a = buffer("x");
        a.append_node(NodeHandle::new(EscapeNode::new(b'0', "")));
        a.append_node(NodeHandle::new(EscapeNode::new(b'h', "1i")));
        let unformatted = a.unformat();
        assert_eq!(unformatted.len(), 2);
        assert_eq!(unformatted.to_text(), "x ");
    }

    #[test]
    fn to_text_translates_control_bytes() {
        let a = ElementBuffer::from_bytes(&[
            control::PUSH_GROFF_MODE,
            b'a',
            control::ESCAPE_AMPERSAND,
            control::POP_GROFFCOMP_MODE,
        ]);
        assert_eq!(a.to_text(), "a\\&");
    }

    #[test]
    fn equality_compares_contents() {
        let mut a = buffer("ab");
        let b = buffer("ab");
        assert_eq!(a, b);
        a.append_byte(b'c');
        assert_ne!(a, b);
    }
}
