//! The object graph reader.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use log::trace;

use crate::budget::{Budget, BudgetBreach};
use crate::cursor::Cursor;
use crate::error::{ContentIdentity, Error, ErrorKind};
use crate::external::ExternalReferenceFixups;
use crate::format::Format;
use crate::location::Location;
use crate::parse_scalars::parse_xml_bool;
use crate::serializer::TypeSerializer;
use crate::shared::SharedResourceFixups;
use crate::types::{TypeDescriptor, TypeRegistry};
use crate::value::{ObjectGraph, Value};

/// Deepest object nesting the reader follows, whatever the [`Budget`] allows.
///
/// Every nested object costs several stack frames.
pub const MAX_OBJECT_NESTING: usize = 100;

/// Reads one document into an object graph.
///
/// The reader borrows the cursor for the whole read and owns every piece of
/// per-document state: namespace aliases, both fixup tables and the resource
/// arena. Use a fresh reader for each document.
pub struct IntermediateReader<'a> {
    cursor: &'a mut dyn Cursor,
    registry: &'a TypeRegistry,
    path: PathBuf,
    namespaces: AHashMap<String, String>,
    pub(crate) shared: SharedResourceFixups<'a>,
    pub(crate) external: ExternalReferenceFixups<'a>,
    pub(crate) resources: Vec<Value>,
    empty_element: bool,
    nesting: usize,
    budget: Option<Budget>,
}

impl<'a> IntermediateReader<'a> {
    pub fn new(
        cursor: &'a mut dyn Cursor,
        registry: &'a TypeRegistry,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cursor,
            registry,
            path: path.into(),
            namespaces: AHashMap::new(),
            shared: SharedResourceFixups::default(),
            external: ExternalReferenceFixups::default(),
            resources: Vec::new(),
            empty_element: false,
            nesting: 0,
            budget: None,
        }
    }

    /// Limit the number of shared resources and external references read.
    pub fn with_budget(mut self, budget: Option<Budget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn cursor(&mut self) -> &mut (dyn Cursor + 'a) {
        &mut *self.cursor
    }

    /// Path of the document being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn budget(&self) -> Option<&Budget> {
        self.budget.as_ref()
    }

    /// Whether the element being deserialized is self-closing.
    ///
    /// While a serializer runs for a self-closing element the cursor still sits
    /// on that element, so its attributes are readable.
    pub fn element_is_empty(&self) -> bool {
        self.empty_element
    }

    /// Position on the next content node; true if it is an element named `name`.
    pub fn move_to_element(&mut self, name: &str) -> Result<bool, Error> {
        self.cursor.locate(name)
    }

    /// Scalar text at the cursor.
    pub fn read_element_content(&mut self) -> Result<String, Error> {
        self.cursor.read_scalar_content()
    }

    /// Consume the element at the cursor and return its text.
    pub fn read_element_string(&mut self) -> Result<String, Error> {
        if self.cursor.is_empty_element() {
            self.cursor.skip()?;
            return Ok(String::new());
        }
        self.cursor.consume_start()?;
        let text = self.cursor.read_scalar_content()?;
        self.cursor.consume_end()?;
        Ok(text)
    }

    /// Position of the node at the cursor.
    pub fn position(&self) -> Location {
        self.cursor.position()
    }

    /// Error of `kind` tagged with this document and the cursor's position.
    pub fn new_error(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        self.error_at(kind, message, self.cursor.position())
    }

    pub(crate) fn error_at(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        location: Location,
    ) -> Error {
        Error::new(kind, message).with_identity(ContentIdentity::new(self.path.clone(), location))
    }

    /// Record `xmlns:Alias="Namespace"` declarations of the element at the cursor.
    pub fn read_namespaces(&mut self) {
        for (name, value) in self.cursor.attributes() {
            if let Some(alias) = name.strip_prefix("xmlns:") {
                self.namespaces.insert(alias.to_owned(), value.clone());
            }
        }
    }

    /// Resolve a type name as written in the document.
    ///
    /// `Alias:Name` expands to `Namespace.Name` for a declared alias. Unknown
    /// names are `None`.
    pub fn read_type_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let name = name.trim();
        if let Some((alias, local)) = name.split_once(':') {
            if let Some(namespace) = self.namespaces.get(alias) {
                return self.registry.resolve(&format!("{namespace}.{local}"));
            }
        }
        self.registry.resolve(name)
    }

    /// Read the element named by `format`, honoring `Null` and `Type` attributes.
    ///
    /// `serializer` is selected from the declared type; a `Type` attribute
    /// naming an assignable type replaces it.
    pub fn read_object(
        &mut self,
        format: &Format,
        serializer: &dyn TypeSerializer,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        let overridden: Arc<dyn TypeSerializer>;
        let mut serializer = serializer;

        if !format.flatten {
            if !self.cursor.locate(&format.element_name)? {
                return Err(self.element_not_found(format));
            }

            if let Some(null) = self.cursor.attribute("Null") {
                let is_null = parse_xml_bool(null).map_err(|message| {
                    self.new_error(ErrorKind::InvalidValue, format!("Invalid Null marker: {message}"))
                })?;
                if is_null {
                    if !format.allow_null {
                        return Err(self.new_error(
                            ErrorKind::NullNotAllowed,
                            format!("Element '{}' cannot be null.", format.element_name),
                        ));
                    }
                    self.cursor.skip()?;
                    return Ok(serializer.default_value());
                }
            }

            if let Some(type_name) = self.cursor.attribute("Type").map(str::to_owned) {
                let Some(descriptor) = self.read_type_name(&type_name) else {
                    return Err(self.new_error(
                        ErrorKind::UnresolvedType,
                        format!("Could not resolve type '{type_name}'."),
                    ));
                };
                let target = serializer.target_type();
                if !self.registry.is_assignable(target, &descriptor) {
                    return Err(self.new_error(
                        ErrorKind::TypeMismatch,
                        format!(
                            "Type '{}' is not assignable to '{}'.",
                            descriptor.name, target.name
                        ),
                    ));
                }
                overridden = self.registry.serializer(&descriptor);
                serializer = &*overridden;
            }
        }

        self.read_raw_object(format, serializer, existing)
    }

    /// Read the element named by `format` with `serializer`, ignoring `Null` and `Type`.
    pub fn read_raw_object(
        &mut self,
        format: &Format,
        serializer: &dyn TypeSerializer,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        if self.nesting >= MAX_OBJECT_NESTING {
            let breach = BudgetBreach::Depth {
                depth: self.nesting + 1,
            };
            return Err(Error::budget(breach)
                .with_identity(ContentIdentity::new(self.path.clone(), self.position())));
        }
        self.nesting += 1;
        let result = self.read_nested(format, serializer, existing);
        self.nesting -= 1;
        result
    }

    fn read_nested(
        &mut self,
        format: &Format,
        serializer: &dyn TypeSerializer,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        if format.flatten {
            self.cursor.move_to_content()?;
            return serializer.deserialize(self, format, existing);
        }

        if !self.cursor.locate(&format.element_name)? {
            return Err(self.element_not_found(format));
        }
        trace!(
            element = format.element_name.as_str(),
            target = serializer.target_type().name.as_str();
            "Reading element"
        );

        let empty = self.cursor.is_empty_element();
        let outer = mem::replace(&mut self.empty_element, empty);
        if !empty {
            self.cursor.consume_start()?;
        }
        let result = serializer.deserialize(self, format, existing);
        self.empty_element = outer;
        let value = result?;
        if empty {
            self.cursor.skip()?;
        } else {
            self.cursor.consume_end()?;
        }
        Ok(value)
    }

    /// [`Self::read_object`] with the declared type given by name.
    pub fn read_object_of(
        &mut self,
        format: &Format,
        type_name: &str,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        let Some(descriptor) = self.read_type_name(type_name) else {
            return Err(self.new_error(
                ErrorKind::UnresolvedType,
                format!("Could not resolve type '{type_name}'."),
            ));
        };
        let serializer = self.registry.serializer(&descriptor);
        self.read_object(format, &*serializer, existing)
    }

    fn element_not_found(&self, format: &Format) -> Error {
        self.new_error(
            ErrorKind::ElementNotFound,
            format!("Element '{}' was not found.", format.element_name),
        )
    }

    /// Finish the read. Fails if fixups are still waiting for their section.
    pub fn into_graph(self, root: Value) -> Result<ObjectGraph, Error> {
        if let Some(pending) = self.shared.first_pending() {
            return Err(self.error_at(
                ErrorKind::MissingSharedResource,
                format!("Missing shared resource \"{}\".", pending.id),
                pending.site,
            ));
        }
        if let Some((id, site)) = self.external.first_pending() {
            return Err(self.error_at(
                ErrorKind::MissingExternalReference,
                format!("Missing external reference \"{id}\"."),
                site,
            ));
        }
        Ok(ObjectGraph::new(root, self.resources, self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::NodeKind;
    use crate::xml::XmlCursor;

    #[test]
    fn missing_element_reports_cursor_position() {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new("<Root><Other>1</Other></Root>");
        cursor.consume_start().unwrap();
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "doc.xml");
        let err = reader
            .read_object_of(&Format::new("Value"), "object", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
        assert_eq!(err.location(), Some(Location::new(1, 7)));
        assert_eq!(err.identity().source_filename(), Path::new("doc.xml"));
    }

    #[test]
    fn null_element_is_skipped_whole() {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new(r#"<Root><Value Null="true"><A>1</A></Value><Next/></Root>"#);
        cursor.consume_start().unwrap();
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "doc.xml");
        let value = reader.read_object_of(&Format::new("Value"), "int", None).unwrap();
        assert_eq!(value, Value::Int(0));
        assert!(reader.move_to_element("Next").unwrap());
    }

    #[test]
    fn empty_flag_is_restored_after_nested_reads() {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new("<Root><Value><A/></Value></Root>");
        cursor.consume_start().unwrap();
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "doc.xml");
        reader.read_object_of(&Format::new("Value"), "object", None).unwrap();
        assert!(!reader.element_is_empty());
        assert_eq!(reader.cursor().move_to_content().unwrap(), NodeKind::EndElement);
    }

    #[test]
    fn namespace_aliases_expand_type_names() {
        let mut registry = TypeRegistry::new();
        registry.register(crate::types::TypeDescriptor::structure("Game.Data.Empty"));
        let mut cursor = XmlCursor::new(r#"<Root xmlns:Data="Game.Data"/>"#);
        cursor.locate("Root").unwrap();
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "doc.xml");
        reader.read_namespaces();
        assert_eq!(reader.read_type_name("Data:Empty").unwrap().name, "Game.Data.Empty");
        assert!(reader.read_type_name("Other:Empty").is_none());
    }
}
