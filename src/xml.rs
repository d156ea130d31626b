//! [`Cursor`] over XML, backed by `quick-xml` pull events.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::budget::{Budget, BudgetEnforcer, BudgetReport, Markup};
use crate::cursor::{Cursor, NodeKind};
use crate::error::Error;
use crate::location::{LineIndex, Location};

/// Our simplified owned node, one per relevant parser event.
#[derive(Clone, Debug)]
enum Node {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
        empty: bool,
        location: Location,
    },
    End {
        location: Location,
    },
    Text {
        text: String,
        whitespace: bool,
        location: Location,
    },
    Eof {
        location: Location,
    },
}

impl Node {
    fn location(&self) -> Location {
        match self {
            Node::Start { location, .. }
            | Node::End { location }
            | Node::Text { location, .. }
            | Node::Eof { location } => *location,
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Node::Start { .. } => NodeKind::Element,
            Node::End { .. } => NodeKind::EndElement,
            Node::Text { .. } => NodeKind::Text,
            Node::Eof { .. } => NodeKind::Eof,
        }
    }
}

/// Live cursor over an XML string.
///
/// - Skips declarations, comments, processing instructions and doctypes
/// - Unescapes text and attribute values; CDATA reads as text
/// - Reports 1-based line/column for every node
/// - Feeds every node to an optional [`BudgetEnforcer`]
pub struct XmlCursor<'a> {
    input: &'a str,
    reader: Reader<&'a [u8]>,
    lines: LineIndex,
    current: Option<Node>,
    depth: usize,
    budget: Option<BudgetEnforcer>,
}

impl<'a> XmlCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_budget(input, None)
    }

    /// Create a cursor enforcing `budget` on every node it reads.
    pub fn with_budget(input: &'a str, budget: Option<Budget>) -> Self {
        // Keep coordinates aligned with editors that hide a leading BOM.
        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);
        Self {
            input,
            reader,
            lines: LineIndex::new(input),
            current: None,
            depth: 0,
            budget: budget.map(BudgetEnforcer::new),
        }
    }

    /// Budget counters so far, if a budget is enforced.
    pub fn budget_report(&self) -> Option<&BudgetReport> {
        self.budget.as_ref().map(BudgetEnforcer::report)
    }

    pub fn into_budget_report(self) -> Option<BudgetReport> {
        self.budget.map(BudgetEnforcer::finalize)
    }

    /// Consume every remaining node. Used to validate markup without reading it.
    pub fn scan_to_end(&mut self) -> Result<(), Error> {
        loop {
            if let Node::Eof { .. } = self.advance()? {
                return Ok(());
            }
        }
    }

    fn pull(&mut self) -> Result<Node, Error> {
        loop {
            let offset = self.reader.buffer_position() as usize;
            let location = self.lines.location(self.input, offset);
            let event = self.reader.read_event().map_err(|err| {
                Error::syntax(format!("malformed XML: {err}"))
                    .with_location(location)
                    .with_cause(err)
            })?;

            let node = match event {
                Event::Start(start) => start_node(&start, false, location)?,
                Event::Empty(start) => start_node(&start, true, location)?,
                Event::End(_) => Node::End { location },
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|err| {
                            Error::syntax(format!("invalid text content: {err}"))
                                .with_location(location)
                                .with_cause(err)
                        })?
                        .into_owned();
                    let whitespace = text.chars().all(char::is_whitespace);
                    Node::Text {
                        text,
                        whitespace,
                        location,
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned()).map_err(|err| {
                        Error::syntax("CDATA section is not valid UTF-8")
                            .with_location(location)
                            .with_cause(err)
                    })?;
                    Node::Text {
                        text,
                        whitespace: false,
                        location,
                    }
                }
                Event::Eof => Node::Eof { location },
                // Declarations, comments, processing instructions, doctypes.
                _ => continue,
            };

            self.observe(&node)?;
            return Ok(node);
        }
    }

    fn observe(&mut self, node: &Node) -> Result<(), Error> {
        let Some(budget) = self.budget.as_mut() else {
            return Ok(());
        };
        let markup = match node {
            Node::Start {
                attributes, empty, ..
            } => Markup::Start {
                attributes: attributes.len(),
                empty: *empty,
            },
            Node::End { .. } => Markup::End,
            Node::Text { text, .. } => Markup::Text(text),
            Node::Eof { .. } => return Ok(()),
        };
        budget
            .observe(&markup)
            .map_err(|breach| Error::budget(breach).with_location(node.location()))
    }

    fn peek(&mut self) -> Result<&Node, Error> {
        let node = match self.current.take() {
            Some(node) => node,
            None => self.pull()?,
        };
        Ok(self.current.insert(node))
    }

    fn advance(&mut self) -> Result<Node, Error> {
        let node = match self.current.take() {
            Some(node) => node,
            None => self.pull()?,
        };
        match &node {
            Node::Start { empty: false, .. } => self.depth += 1,
            Node::End { .. } => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Ok(node)
    }

    fn current_start(&self) -> Option<(&str, &[(String, String)], bool)> {
        match &self.current {
            Some(Node::Start {
                name,
                attributes,
                empty,
                ..
            }) => Some((name.as_str(), attributes.as_slice(), *empty)),
            _ => None,
        }
    }

    fn unexpected(&self, expected: &str, found: NodeKind) -> Error {
        let found = match found {
            NodeKind::Element => match self.name() {
                Some(name) => format!("element '{name}'"),
                None => "an element".to_owned(),
            },
            NodeKind::EndElement => "end of element".to_owned(),
            NodeKind::Text => "text".to_owned(),
            NodeKind::Eof => "end of document".to_owned(),
        };
        Error::syntax(format!("expected {expected}, found {found}")).with_location(self.position())
    }
}

fn start_node(start: &BytesStart<'_>, empty: bool, location: Location) -> Result<Node, Error> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| {
            Error::syntax("element name is not valid UTF-8")
                .with_location(location)
                .with_cause(err)
        })?
        .to_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| {
            Error::syntax(format!("invalid attribute on '{name}': {err}"))
                .with_location(location)
                .with_cause(err)
        })?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|err| {
                Error::syntax("attribute name is not valid UTF-8")
                    .with_location(location)
                    .with_cause(err)
            })?
            .to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| {
                Error::syntax(format!("invalid value for attribute '{key}': {err}"))
                    .with_location(location)
                    .with_cause(err)
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Node::Start {
        name,
        attributes,
        empty,
        location,
    })
}

impl Cursor for XmlCursor<'_> {
    fn move_to_content(&mut self) -> Result<NodeKind, Error> {
        loop {
            let kind = match self.peek()? {
                Node::Text {
                    whitespace: true, ..
                } => None,
                node => Some(node.kind()),
            };
            match kind {
                Some(kind) => return Ok(kind),
                None => {
                    self.advance()?;
                }
            }
        }
    }

    fn name(&self) -> Option<&str> {
        self.current_start().map(|(name, _, _)| name)
    }

    fn attributes(&self) -> &[(String, String)] {
        self.current_start()
            .map(|(_, attributes, _)| attributes)
            .unwrap_or(&[])
    }

    fn is_empty_element(&self) -> bool {
        self.current_start().is_some_and(|(_, _, empty)| empty)
    }

    fn consume_start(&mut self) -> Result<(), Error> {
        match self.move_to_content()? {
            NodeKind::Element => {
                self.advance()?;
                Ok(())
            }
            other => Err(self.unexpected("start of element", other)),
        }
    }

    fn consume_end(&mut self) -> Result<(), Error> {
        match self.move_to_content()? {
            NodeKind::EndElement => {
                self.advance()?;
                Ok(())
            }
            other => Err(self.unexpected("end of element", other)),
        }
    }

    fn read_scalar_content(&mut self) -> Result<String, Error> {
        let mut content = String::new();
        loop {
            match self.peek()? {
                Node::Text { text, .. } => content.push_str(text),
                _ => return Ok(content),
            }
            self.advance()?;
        }
    }

    fn skip(&mut self) -> Result<(), Error> {
        let node = self.advance()?;
        if let Node::Start { empty: false, .. } = node {
            let target = self.depth - 1;
            loop {
                match self.advance()? {
                    Node::End { .. } if self.depth == target => return Ok(()),
                    Node::Eof { location } => {
                        return Err(
                            Error::syntax("unexpected end of document inside element")
                                .with_location(location),
                        );
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn position(&self) -> Location {
        match &self.current {
            Some(node) => node.location(),
            None => self
                .lines
                .location(self.input, self.reader.buffer_position() as usize),
        }
    }

    fn depth(&self) -> usize {
        self.depth
    }
}
