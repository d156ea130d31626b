//! Reader for intermediate content documents.
//!
//! A document describes one typed object graph in XML. Fields may point at
//! shared resources defined later in the same document or at content stored in
//! other documents; both are gathered as deferred fixups during a single
//! forward pass and resolved once their section has been read.

pub use budget::{check_budget, Budget, BudgetBreach, BudgetReport};
pub use cursor::{Cursor, NodeKind};
pub use de::{
    from_reader, from_reader_with_options, from_str, from_str_with_options, load_document,
    load_document_with_options,
};
pub use error::{ContentIdentity, Error, ErrorKind};
pub use external::ExternalFixup;
pub use format::Format;
pub use location::Location;
pub use options::Options;
pub use reader::{IntermediateReader, MAX_OBJECT_NESTING};
pub use reflective::{ExternalReferenceSerializer, ListSerializer, StructSerializer};
pub use serializer::{ObjectSerializer, PrimitiveSerializer, TypeSerializer};
pub use shared::SharedFixup;
pub use types::{
    FieldDescriptor, FieldRole, Primitive, TypeDescriptor, TypeKind, TypeRegistry, OBJECT_TYPE,
};
pub use value::{ExternalRef, Object, ObjectGraph, ResourceId, ResourceRef, SharedRef, Value};
pub use xml::XmlCursor;

pub mod budget;
mod cursor;
mod de;
mod error;
mod external;
mod format;
mod location;
#[cfg(feature = "miette")]
pub mod miette;
pub mod options;
mod parse_scalars;
mod reader;
mod reflective;
mod serializer;
mod shared;
mod types;
mod value;
mod xml;
