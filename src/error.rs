//! Defines the content error, its kinds and the identity it is tagged with.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::budget::BudgetBreach;
use crate::location::Location;

/// Lower-level failure wrapped by an [`Error`].
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// What went wrong while reading a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required element was not at the cursor position.
    ElementNotFound,
    /// An element carried `Null="true"` where the field does not allow null.
    NullNotAllowed,
    /// A type name did not resolve to a known type.
    UnresolvedType,
    /// A type override (or a shared resource) is not assignable to the declared type.
    TypeMismatch,
    /// A shared resource id was referenced but never defined in `Resources`.
    MissingSharedResource,
    /// An `ExternalReference` id was never referenced by the document.
    UnknownReferenceId,
    /// An external reference resolved to a different type than the referencing field expects.
    InvalidReferenceType,
    /// An external reference id was referenced but never defined in `ExternalReferences`.
    MissingExternalReference,
    /// A resource or external reference id was defined twice.
    DuplicateId,
    /// An untyped record contained the same child element twice.
    DuplicateElement,
    /// A required attribute (`ID`, `TargetType`) was absent.
    MissingAttribute,
    /// Scalar content could not be converted to the requested type.
    InvalidValue,
    /// The markup itself is malformed or has an unexpected structure.
    Syntax,
    /// A [`crate::Budget`] limit was exceeded.
    Budget,
    /// The document could not be read from its source.
    Io,
}

/// Where a piece of content came from: document path, tool and position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentIdentity {
    source_filename: PathBuf,
    source_tool: String,
    location: Location,
}

impl ContentIdentity {
    pub fn new(source_filename: impl Into<PathBuf>, location: Location) -> Self {
        Self {
            source_filename: source_filename.into(),
            source_tool: String::new(),
            location,
        }
    }

    pub fn source_filename(&self) -> &Path {
        &self.source_filename
    }

    /// Name of the tool that produced the content. Always empty for documents read here.
    pub fn source_tool(&self) -> &str {
        &self.source_tool
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Position within the document formatted as `"line,column"`.
    pub fn fragment_identifier(&self) -> String {
        self.location.to_string()
    }
}

/// Invalid content error. Every failure while reading a document is one of these.
///
/// Carries a human-readable message, the [`ContentIdentity`] (document path and
/// position) and optionally the lower-level cause.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    identity: ContentIdentity,
    cause: Option<Cause>,
}

impl Error {
    /// Construct an error of `kind` with no known location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            identity: ContentIdentity::default(),
            cause: None,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub(crate) fn budget(breach: BudgetBreach) -> Self {
        Self::new(ErrorKind::Budget, format!("content budget breached: {breach:?}"))
    }

    pub(crate) fn io(cause: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("IO error: {cause}")).with_cause(cause)
    }

    /// Attach/override the location of this error.
    pub fn with_location(mut self, location: Location) -> Self {
        self.identity.location = location;
        self
    }

    /// Attach/override the full identity of this error.
    pub fn with_identity(mut self, identity: ContentIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Record the document path unless one is already known.
    ///
    /// Errors raised below the reader (cursor, scalar parsing) do not know
    /// which document they belong to; the entry points fill it in once.
    pub(crate) fn in_document(mut self, path: &Path) -> Self {
        if self.identity.source_filename.as_os_str().is_empty() {
            self.identity.source_filename = path.to_path_buf();
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn identity(&self) -> &ContentIdentity {
        &self.identity
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        let location = self.identity.location;
        location.is_known().then_some(location)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.identity.source_filename.as_os_str();
        if !file.is_empty() {
            write!(f, "{}: ", self.identity.source_filename.display())?;
        }
        fmt_with_location(f, &self.message, &self.identity.location)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_location(f: &mut fmt::Formatter<'_>, msg: &str, location: &Location) -> fmt::Result {
    if location.is_known() {
        write!(
            f,
            "{msg} at line {}, column {}",
            location.line, location.column
        )
    } else {
        write!(f, "{msg}")
    }
}
