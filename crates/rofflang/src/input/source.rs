//! The different kinds of input source

use crate::buffer::{Element, ElementBuffer};
use crate::token::control;
use crate::token::Name;
use std::rc::Rc;

/// A source of bytes, like an open file.
pub trait ByteSource {
    /// Read the next byte, or return [None] if the source is exhausted.
    fn read_byte(&mut self) -> Option<u8>;
}

impl<R: std::io::Read> ByteSource for std::io::Bytes<R> {
    fn read_byte(&mut self) -> Option<u8> {
        match self.next() {
            Some(Ok(b)) => Some(b),
            Some(Err(err)) => {
                tracing::debug!("treating read error as end of file: {err}");
                None
            }
            None => None,
        }
    }
}

/// Kind of a boundary source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryKind {
    Plain,
    /// A boundary re-added after the sources above it were unwound by `.return` or `.ex`.
    Return,
}

/// A file being read line by line.
pub struct FileSource {
    reader: Box<dyn ByteSource>,
    file_name: Rc<str>,
    line: usize,
    newline_pending: bool,
    peeked: Option<u8>,
}

impl FileSource {
    pub fn new<T: Into<Rc<str>>>(reader: Box<dyn ByteSource>, file_name: T) -> FileSource {
        FileSource {
            reader,
            file_name: file_name.into(),
            line: 1,
            newline_pending: false,
            peeked: None,
        }
    }

    pub fn file_name(&self) -> &Rc<str> {
        &self.file_name
    }

    pub fn line(&self) -> usize {
        self.line
    }

    fn read_valid_byte(&mut self, invalid_input: &mut Vec<u8>) -> Option<u8> {
        loop {
            let b = self.reader.read_byte()?;
            if control::is_invalid_input_byte(b) {
                invalid_input.push(b);
                continue;
            }
            return Some(b);
        }
    }

    fn get(&mut self, invalid_input: &mut Vec<u8>) -> Option<u8> {
        if self.newline_pending {
            self.line += 1;
            self.newline_pending = false;
        }
        let b = match self.peeked.take() {
            Some(b) => b,
            None => self.read_valid_byte(invalid_input)?,
        };
        if b == b'\n' {
            self.newline_pending = true;
        }
        Some(b)
    }

    fn peek(&mut self, invalid_input: &mut Vec<u8>) -> Option<u8> {
        if self.peeked.is_none() {
            self.peeked = self.read_valid_byte(invalid_input);
        }
        self.peeked
    }

    /// Sets the location such that the next line read has number `line + 1`.
    pub(crate) fn set_location(&mut self, file_name: Option<Rc<str>>, line: usize) {
        if let Some(file_name) = file_name {
            self.file_name = file_name;
        }
        self.line = line;
    }
}

/// A fixed sequence of bytes.
pub struct TempSource {
    bytes: Vec<u8>,
    pos: usize,
}

impl TempSource {
    pub fn new<T: Into<Vec<u8>>>(bytes: T) -> TempSource {
        TempSource {
            bytes: bytes.into(),
            pos: 0,
        }
    }
}

/// The expansion of a macro, string or diversion.
pub struct Expansion {
    buffer: ElementBuffer,
    pos: usize,
    line: usize,
    newline_pending: bool,
    name: Option<Name>,
    how_invoked: &'static str,
    args: Option<Vec<ElementBuffer>>,
}

impl Expansion {
    /// Expansion of a buffer with no arguments, like a string interpolation.
    pub fn new(buffer: ElementBuffer, name: Option<Name>, how_invoked: &'static str) -> Expansion {
        Expansion {
            buffer,
            pos: 0,
            line: 1,
            newline_pending: false,
            name,
            how_invoked,
            args: None,
        }
    }

    /// Expansion of a macro with bound arguments.
    pub fn new_macro(
        buffer: ElementBuffer,
        name: Name,
        how_invoked: &'static str,
        args: Vec<ElementBuffer>,
    ) -> Expansion {
        Expansion {
            args: Some(args),
            ..Expansion::new(buffer, Some(name), how_invoked)
        }
    }

    pub fn name(&self) -> Option<Name> {
        self.name
    }

    pub fn how_invoked(&self) -> &'static str {
        self.how_invoked
    }

    pub fn args(&self) -> Option<&[ElementBuffer]> {
        self.args.as_deref()
    }

    pub fn is_diversion(&self) -> bool {
        self.buffer.is_diversion()
    }

    fn get(&mut self, diversion_level: usize) -> Option<Element> {
        if self.newline_pending {
            self.line += 1;
            self.newline_pending = false;
        }
        let mut element = self.buffer.get(self.pos)?.clone();
        self.pos += 1;
        match &mut element {
            Element::Byte(b'\n') | Element::Byte(control::ESCAPE_NEWLINE) => {
                self.newline_pending = true
            }
            Element::Node(node) if self.buffer.is_diversion() => {
                node.set_diversion_level(diversion_level)
            }
            _ => {}
        }
        Some(element)
    }

    fn peek(&self) -> Option<Element> {
        self.buffer.get(self.pos).cloned()
    }

    fn location(&self) -> Option<(Rc<str>, usize)> {
        self.buffer
            .location()
            .map(|location| (location.file_name.clone(), location.line + self.line - 1))
    }
}

/// A source of input elements.
pub enum InputSource {
    File(FileSource),
    Temp(TempSource),
    Expansion(Expansion),
    Boundary(BoundaryKind),
}

impl InputSource {
    /// A temporary source with the provided bytes.
    pub fn temp<T: Into<Vec<u8>>>(bytes: T) -> InputSource {
        InputSource::Temp(TempSource::new(bytes))
    }

    pub(crate) fn get(
        &mut self,
        invalid_input: &mut Vec<u8>,
        diversion_level: usize,
    ) -> Option<Element> {
        match self {
            InputSource::File(file) => file.get(invalid_input).map(Element::Byte),
            InputSource::Temp(temp) => {
                let b = *temp.bytes.get(temp.pos)?;
                temp.pos += 1;
                Some(Element::Byte(b))
            }
            InputSource::Expansion(expansion) => expansion.get(diversion_level),
            InputSource::Boundary(_) => None,
        }
    }

    pub(crate) fn peek(&mut self, invalid_input: &mut Vec<u8>) -> Option<Element> {
        match self {
            InputSource::File(file) => file.peek(invalid_input).map(Element::Byte),
            InputSource::Temp(temp) => temp.bytes.get(temp.pos).map(|b| Element::Byte(*b)),
            InputSource::Expansion(expansion) => expansion.peek(),
            InputSource::Boundary(_) => None,
        }
    }

    pub fn is_boundary(&self) -> Option<BoundaryKind> {
        match self {
            InputSource::Boundary(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, InputSource::File(_))
    }

    /// Whether this is the expansion of a macro, as opposed to a string or other buffer.
    pub fn is_macro(&self) -> bool {
        matches!(self, InputSource::Expansion(Expansion { args: Some(_), .. }))
    }

    pub fn is_diversion(&self) -> bool {
        match self {
            InputSource::Expansion(expansion) => expansion.is_diversion(),
            _ => false,
        }
    }

    pub(crate) fn args_mut(&mut self) -> Option<&mut Vec<ElementBuffer>> {
        match self {
            InputSource::Expansion(expansion) => expansion.args.as_mut(),
            _ => None,
        }
    }

    pub(crate) fn expansion(&self) -> Option<&Expansion> {
        match self {
            InputSource::Expansion(expansion) => Some(expansion),
            _ => None,
        }
    }

    /// Location of the source.
    ///
    /// File sources always have a location.
    /// Expansions of buffers that were defined in a file have a location only if `allow_macro` is true.
    pub fn location(&self, allow_macro: bool) -> Option<(Rc<str>, usize)> {
        match self {
            InputSource::File(file) => Some((file.file_name.clone(), file.line)),
            InputSource::Expansion(expansion) if allow_macro => expansion.location(),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            InputSource::File(_) => "file",
            InputSource::Temp(_) => "temp",
            InputSource::Expansion(expansion) => expansion.how_invoked,
            InputSource::Boundary(BoundaryKind::Plain) => "boundary",
            InputSource::Boundary(BoundaryKind::Return) => "return boundary",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn file(s: &'static str) -> FileSource {
        FileSource::new(Box::new(s.as_bytes().bytes()), "f.roff")
    }

    #[test]
    fn file_line_numbers_advance_after_newline() {
        let mut f = file("a\nb");
        let mut invalid = vec![];
        assert_eq!(f.get(&mut invalid), Some(b'a'));
        assert_eq!(f.line(), 1);
        assert_eq!(f.get(&mut invalid), Some(b'\n'));
        assert_eq!(f.line(), 1);
        assert_eq!(f.get(&mut invalid), Some(b'b'));
        assert_eq!(f.line(), 2);
        assert_eq!(f.get(&mut invalid), None);
    }

    #[test]
    fn file_drops_invalid_input() {
        let mut f = FileSource::new(Box::new((&b"a\x0bb"[..]).bytes()), "f");
        let mut invalid = vec![];
        assert_eq!(f.peek(&mut invalid), Some(b'a'));
        assert_eq!(f.get(&mut invalid), Some(b'a'));
        assert_eq!(f.get(&mut invalid), Some(b'b'));
        assert_eq!(invalid, vec![0o13]);
    }

    #[test]
    fn expansion_location_tracks_lines() {
        let mut buffer = ElementBuffer::with_location(Some(crate::buffer::SourceLocation {
            file_name: "m.tmac".into(),
            line: 10,
        }));
        buffer.append_str("a\nb");
        let mut source = InputSource::Expansion(Expansion::new(buffer, None, "macro"));
        assert_eq!(source.location(false), None);
        let mut invalid = vec![];
        source.get(&mut invalid, 0);
        source.get(&mut invalid, 0);
        source.get(&mut invalid, 0);
        assert_eq!(source.location(true), Some(("m.tmac".into(), 11)));
    }
}
