//! External references: ids read during the main pass, resolved after the
//! `ExternalReferences` section.
//!
//! Unlike shared resources, fixups for one id stay a flat list: each one
//! checks the resolved type against its own expectation.

use std::path::{Component, Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use log::debug;
use smallvec::SmallVec;

use crate::budget::BudgetBreach;
use crate::error::{ContentIdentity, Error, ErrorKind};
use crate::location::Location;
use crate::reader::IntermediateReader;
use crate::types::TypeDescriptor;
use crate::value::ExternalRef;

/// Deferred callback receiving the resolved target type and absolute filename.
pub type ExternalFixup<'a> = Box<dyn FnOnce(&TypeDescriptor, &Path) -> Result<(), Error> + 'a>;

struct PendingReference<'a> {
    /// Where the id was first read.
    site: Location,
    fixups: SmallVec<[ExternalFixup<'a>; 1]>,
}

#[derive(Default)]
pub(crate) struct ExternalReferenceFixups<'a> {
    pending: AHashMap<String, PendingReference<'a>>,
    /// Ids in first-registration order, for deterministic reporting.
    order: Vec<String>,
}

impl<'a> ExternalReferenceFixups<'a> {
    fn register(&mut self, id: String, site: Location, fixup: ExternalFixup<'a>) {
        if let Some(pending) = self.pending.get_mut(&id) {
            pending.fixups.push(fixup);
            return;
        }
        self.order.push(id.clone());
        let mut fixups = SmallVec::new();
        fixups.push(fixup);
        self.pending.insert(id, PendingReference { site, fixups });
    }

    fn take(&mut self, id: &str) -> Option<PendingReference<'a>> {
        self.pending.remove(id)
    }

    /// First registered id that has not been resolved yet.
    pub(crate) fn first_pending(&self) -> Option<(&str, Location)> {
        self.order
            .iter()
            .find_map(|id| self.pending.get(id).map(|pending| (id.as_str(), pending.site)))
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Join `relative` onto the directory of `document` and make it absolute.
///
/// Backslash separators are accepted on every platform. `.` and `..`
/// components are resolved lexically.
pub(crate) fn resolve_reference_path(document: &Path, relative: &str) -> PathBuf {
    let relative = if cfg!(windows) {
        relative.to_owned()
    } else {
        relative.replace('\\', "/")
    };
    let joined = document
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(relative);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

impl<'a> IntermediateReader<'a> {
    /// Register `fixup` for the external reference `id`.
    ///
    /// Nothing is read or opened until the `ExternalReferences` section.
    pub fn register_external_fixup(&mut self, id: impl Into<String>, fixup: ExternalFixup<'a>) {
        let site = self.position();
        self.register_external_at(id.into().trim().to_owned(), site, fixup);
    }

    fn register_external_at(&mut self, id: String, site: Location, fixup: ExternalFixup<'a>) {
        debug!(id = id.as_str(), site:% = site; "Registering external reference fixup");
        self.external.register(id, site, fixup);
    }

    /// Read the `Reference` child holding an external reference id.
    ///
    /// Returns `existing` (or a new reference to `target_type`) that receives
    /// its filename once the `ExternalReferences` section is read. Without a
    /// `Reference` child the reference stays unresolved.
    pub fn read_external_reference(
        &mut self,
        target_type: &str,
        existing: Option<ExternalRef>,
    ) -> Result<ExternalRef, Error> {
        let reference = existing.unwrap_or_else(|| ExternalRef::new(target_type));
        if !self.move_to_element("Reference")? {
            return Ok(reference);
        }
        let site = self.position();
        let id = self.read_element_string()?.trim().to_owned();
        if id.is_empty() {
            return Ok(reference);
        }

        let expected = self
            .read_type_name(target_type)
            .map_or_else(|| target_type.to_owned(), |descriptor| descriptor.name.clone());
        let slot = reference.clone();
        self.register_external_at(
            id,
            site,
            Box::new(move |resolved: &TypeDescriptor, filename: &Path| {
                if resolved.name != expected {
                    return Err(Error::new(
                        ErrorKind::InvalidReferenceType,
                        format!(
                            "Invalid external reference type: expected '{expected}', found '{}'.",
                            resolved.name
                        ),
                    ));
                }
                slot.set_filename(filename);
                Ok(())
            }),
        );
        Ok(reference)
    }

    /// Read the optional `ExternalReferences` section and run every external fixup.
    ///
    /// Each `ExternalReference` child needs an `ID` registered during the main
    /// pass and a resolvable `TargetType`; its text is a path relative to this
    /// document's directory. Registered ids that the section never defines
    /// are an error.
    pub fn read_external_references(&mut self) -> Result<(), Error> {
        debug!(pending = self.external.len(); "Reading external references");
        if self.move_to_element("ExternalReferences")? {
            if self.cursor().is_empty_element() {
                self.cursor().skip()?;
            } else {
                self.cursor().consume_start()?;
                let mut seen = AHashSet::new();
                while self.move_to_element("ExternalReference")? {
                    self.read_external_reference_definition(&mut seen)?;
                }
                self.cursor().consume_end()?;
            }
        }

        if let Some((id, site)) = self.external.first_pending() {
            return Err(self.error_at(
                ErrorKind::MissingExternalReference,
                format!("Missing external reference \"{id}\"."),
                site,
            ));
        }
        Ok(())
    }

    fn read_external_reference_definition(&mut self, seen: &mut AHashSet<String>) -> Result<(), Error> {
        let site = self.position();
        let Some(id) = self.cursor().attribute("ID").map(|id| id.trim().to_owned()) else {
            return Err(self.new_error(
                ErrorKind::MissingAttribute,
                "ExternalReference element is missing its 'ID' attribute.",
            ));
        };
        if seen.contains(&id) {
            return Err(self.new_error(
                ErrorKind::DuplicateId,
                format!("Duplicate external reference id \"{id}\"."),
            ));
        }
        if let Some(budget) = self.budget() {
            if seen.len() >= budget.max_external_references {
                let breach = BudgetBreach::ExternalReferences {
                    references: seen.len() + 1,
                };
                return Err(Error::budget(breach)
                    .with_identity(ContentIdentity::new(self.path(), site)));
            }
        }
        let Some(pending) = self.external.take(&id) else {
            return Err(self.new_error(
                ErrorKind::UnknownReferenceId,
                format!("Unknown external reference id '{id}'!"),
            ));
        };

        let Some(type_name) = self.cursor().attribute("TargetType").map(str::to_owned) else {
            return Err(self.new_error(
                ErrorKind::MissingAttribute,
                "ExternalReference element is missing its 'TargetType' attribute.",
            ));
        };
        let Some(target) = self.read_type_name(&type_name) else {
            return Err(self.new_error(
                ErrorKind::UnresolvedType,
                format!("Could not resolve type '{type_name}'."),
            ));
        };

        let relative = self.read_element_string()?;
        let filename = resolve_reference_path(self.path(), relative.trim());
        debug!(
            id = id.as_str(),
            target = target.name.as_str(),
            filename:? = filename,
            fixups = pending.fixups.len();
            "Resolving external reference"
        );
        for fixup in pending.fixups {
            fixup(&*target, &filename).map_err(|err| {
                if err.location().is_some() {
                    err.in_document(self.path())
                } else {
                    err.with_identity(ContentIdentity::new(self.path(), site))
                }
            })?;
        }
        seen.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn reference_paths_join_the_document_directory() {
        let path = resolve_reference_path(Path::new("/content/levels/one.xml"), "../textures/grass.xml");
        assert_eq!(path, Path::new("/content/textures/grass.xml"));
    }

    #[cfg(not(windows))]
    #[test]
    fn backslashes_are_separators() {
        let path = resolve_reference_path(Path::new("/content/one.xml"), r"sub\two.xml");
        assert_eq!(path, Path::new("/content/sub/two.xml"));
    }

    #[test]
    fn relative_documents_become_absolute() {
        let path = resolve_reference_path(Path::new("one.xml"), "two.xml");
        assert!(path.is_absolute());
        assert!(path.ends_with("two.xml"));
    }
}
