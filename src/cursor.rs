//! The positional view of a document the reader walks.
//!
//! Any streaming hierarchical-text parser that can locate elements, read
//! attributes and scalar text, skip subtrees, consume start/end markers and
//! track line/column can back a [`Cursor`]. [`crate::XmlCursor`] is the
//! implementation over XML.

use crate::error::Error;
use crate::location::Location;

/// Kind of the content node the cursor is positioned on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Start of an element (possibly self-closing).
    Element,
    /// End of the enclosing element.
    EndElement,
    /// Non-whitespace text or CDATA.
    Text,
    /// End of the document.
    Eof,
}

/// Source of document nodes with one node of lookahead.
///
/// Positional queries (`name`, `attribute`, `attributes`, `is_empty_element`)
/// describe the node found by the last [`Cursor::move_to_content`] or
/// [`Cursor::locate`]; after a consuming call they describe nothing until the
/// cursor is positioned again.
pub trait Cursor {
    /// Advance past whitespace, comments and declarations to the next content node.
    fn move_to_content(&mut self) -> Result<NodeKind, Error>;

    /// Position on the next content node and report whether it is an element
    /// named `name`. Never fails because the element is absent.
    fn locate(&mut self, name: &str) -> Result<bool, Error> {
        Ok(self.move_to_content()? == NodeKind::Element && self.name() == Some(name))
    }

    /// Name of the element the cursor is positioned on.
    fn name(&self) -> Option<&str>;

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value.as_str()))
    }

    /// All attributes of the element the cursor is positioned on, in document order.
    fn attributes(&self) -> &[(String, String)];

    /// Whether the element the cursor is positioned on is self-closing.
    fn is_empty_element(&self) -> bool;

    /// Consume the start marker of the element at the cursor.
    ///
    /// A self-closing element is consumed whole.
    fn consume_start(&mut self) -> Result<(), Error>;

    /// Consume the end marker of the enclosing element.
    fn consume_end(&mut self) -> Result<(), Error>;

    /// Read consecutive text at the cursor as one string. Returns an empty
    /// string when the cursor is not on text.
    fn read_scalar_content(&mut self) -> Result<String, Error>;

    /// Discard the current node; for an element, its whole subtree.
    fn skip(&mut self) -> Result<(), Error>;

    /// Position of the node at the cursor.
    fn position(&self) -> Location;

    /// Number of currently open elements.
    fn depth(&self) -> usize;
}
