//! `miette` integration.
//!
//! This module is feature-gated behind the `miette` feature.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::Error;
use crate::Location;

/// Convert a content [`Error`] into a `miette::Report`.
///
/// This function takes the document `source` and a display `file` name/path.
///
/// # Example
///
/// ```rust,no_run
/// use content_intermediate::{from_str, TypeRegistry};
///
/// let doc = "<XnaContent><Other/></XnaContent>";
/// let err = from_str(doc, "level.xml", &TypeRegistry::new()).expect_err("missing asset");
/// let report = content_intermediate::miette::to_miette_report(&err, doc, "level.xml");
///
/// // `Debug` formatting uses miette's graphical reporter.
/// eprintln!("{report:?}");
/// ```
///
/// Notes:
/// - [`Error`] does not retain the document text. This helper owns a copy of
///   `source` to build a standalone `miette::Report`.
/// - If the error has no known location, the report will not include labels.
pub fn to_miette_report(err: &Error, source: &str, file: &str) -> miette::Report {
    let src = Arc::new(NamedSource::new(file, source.to_owned()));
    let labels = location_to_span(source, err.identity().location())
        .map(|span| vec![LabeledSpan::new_primary_with_span(Some(label(err)), span)])
        .unwrap_or_default();
    miette::Report::new(ErrorDiagnostic {
        message: err.message().to_owned(),
        code: format!("{:?}", err.kind()),
        src,
        labels,
    })
}

#[derive(Clone, Debug)]
struct ErrorDiagnostic {
    message: String,
    code: String,
    src: Arc<NamedSource<String>>,
    labels: Vec<LabeledSpan>,
}

impl fmt::Display for ErrorDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorDiagnostic {}

impl Diagnostic for ErrorDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.code))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.clone().into_iter()))
        }
    }
}

fn label(err: &Error) -> String {
    match err.kind() {
        crate::ErrorKind::ElementNotFound => "expected element here".to_owned(),
        crate::ErrorKind::MissingSharedResource => "resource id read here".to_owned(),
        crate::ErrorKind::MissingExternalReference => "reference id read here".to_owned(),
        _ => "here".to_owned(),
    }
}

/// Byte span of the character at `location` in `source`.
///
/// Locations count characters, miette expects byte offsets.
fn location_to_span(source: &str, location: Location) -> Option<SourceSpan> {
    if !location.is_known() {
        return None;
    }
    let line_start = if location.line() == 1 {
        0
    } else {
        source
            .match_indices('\n')
            .nth((location.line() - 2) as usize)
            .map(|(i, _)| i + 1)?
    };
    let line = &source[line_start..];
    let column = (location.column() - 1) as usize;
    let (offset, ch) = match line.char_indices().nth(column) {
        Some((i, ch)) => (i, ch.len_utf8()),
        // Column just past the last character (end of input).
        None => (line.len(), 0),
    };
    let byte_off = line_start + offset;
    let byte_len = ch.max(1).min(source.len().saturating_sub(byte_off));
    Some(SourceSpan::new(byte_off.into(), byte_len))
}
