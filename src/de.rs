//! Document entry points.
//!
//! A document is a root element holding the primary object (`Asset`),
//! optionally followed by a `Resources` section and an `ExternalReferences`
//! section. Each call reads one document with a fresh reader; nothing carries
//! over between documents.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use encoding_rs_io::DecodeReaderBytesBuilder;
use log::{debug, info};

use crate::cursor::{Cursor, NodeKind};
use crate::error::{Error, ErrorKind};
use crate::format::Format;
use crate::options::Options;
use crate::reader::IntermediateReader;
use crate::types::TypeRegistry;
use crate::value::ObjectGraph;
use crate::xml::XmlCursor;

/// Read a document from a string.
///
/// `path` names the document in errors and anchors the relative paths of its
/// external references.
///
/// ```rust
/// use content_intermediate::{from_str, TypeRegistry};
///
/// let doc = r#"
/// <XnaContent>
///   <Asset Type="int">42</Asset>
/// </XnaContent>
/// "#;
/// let graph = from_str(doc, "answer.xml", &TypeRegistry::new()).unwrap();
/// assert_eq!(graph.root().as_i32(), Some(42));
/// ```
pub fn from_str(
    input: &str,
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
) -> Result<ObjectGraph, Error> {
    from_str_with_options(input, path, registry, Options::default())
}

/// Read a document from a string with custom [`Options`].
pub fn from_str_with_options(
    input: &str,
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
    options: Options,
) -> Result<ObjectGraph, Error> {
    let path = path.as_ref();
    info!(path:? = path; "Reading intermediate document");

    let mut cursor = XmlCursor::with_budget(input, options.budget.clone());
    let result = read_document(&mut cursor, path, registry, &options);
    if let Some(report) = cursor.into_budget_report() {
        options.report(report);
    }

    match &result {
        Ok(graph) => info!(
            path:? = path,
            resources = graph.resources().len();
            "Document read"
        ),
        Err(err) => debug!(path:? = path, kind:? = err.kind(); "Document rejected"),
    }
    result.map_err(|err| err.in_document(path))
}

/// Read a document from any reader. UTF-8, UTF-16LE and UTF-16BE are
/// detected from the byte order mark; input without one is read as UTF-8.
pub fn from_reader<R: Read>(
    reader: R,
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
) -> Result<ObjectGraph, Error> {
    from_reader_with_options(reader, path, registry, Options::default())
}

pub fn from_reader_with_options<R: Read>(
    reader: R,
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
    options: Options,
) -> Result<ObjectGraph, Error> {
    let path = path.as_ref();
    let mut decoder = BufReader::new(
        DecodeReaderBytesBuilder::new()
            .encoding(None) // None = sniff BOM; UTF-8 otherwise
            .build(reader),
    );
    let mut input = String::new();
    decoder
        .read_to_string(&mut input)
        .map_err(|err| Error::io(err).in_document(path))?;
    from_str_with_options(&input, path, registry, options)
}

/// Load a document from disk.
///
/// External references resolve relative to the document's directory.
pub fn load_document(path: impl AsRef<Path>, registry: &TypeRegistry) -> Result<ObjectGraph, Error> {
    load_document_with_options(path, registry, Options::default())
}

pub fn load_document_with_options(
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
    options: Options,
) -> Result<ObjectGraph, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::io(err).in_document(path))?;
    from_reader_with_options(file, path, registry, options)
}

fn read_document(
    cursor: &mut XmlCursor<'_>,
    path: &Path,
    registry: &TypeRegistry,
    options: &Options,
) -> Result<ObjectGraph, Error> {
    if cursor.move_to_content()? != NodeKind::Element {
        return Err(Error::new(ErrorKind::ElementNotFound, "Document has no root element.")
            .with_location(cursor.position()));
    }
    if let Some(root) = &options.root_element {
        if cursor.name() != Some(root.as_str()) {
            return Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("Element '{root}' was not found."),
            )
            .with_location(cursor.position()));
        }
    }
    let root_is_empty = cursor.is_empty_element();

    let mut reader = IntermediateReader::new(cursor, registry, path).with_budget(options.budget.clone());
    reader.read_namespaces();
    if root_is_empty {
        return Err(reader.new_error(
            ErrorKind::ElementNotFound,
            format!("Element '{}' was not found.", options.asset_element),
        ));
    }
    reader.cursor().consume_start()?;

    let asset = reader.read_object_of(&Format::new(options.asset_element.clone()), &options.asset_type, None)?;
    reader.read_shared_resources()?;
    reader.read_external_references()?;
    reader.cursor().consume_end()?;

    if reader.cursor().move_to_content()? != NodeKind::Eof {
        return Err(reader.new_error(
            ErrorKind::Syntax,
            "Unexpected content after the root element.",
        ));
    }
    reader.into_graph(asset)
}
