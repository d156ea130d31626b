//! Shared resources: ids read during the main pass, bound after the `Resources` section.
//!
//! Each read site registers a fixup against the resource id it found. Fixups
//! for the same id compose into one callback that runs them in registration
//! order, and ids replay in the order they were first seen.

use std::mem;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::budget::BudgetBreach;
use crate::error::{ContentIdentity, Error, ErrorKind};
use crate::format::Format;
use crate::location::Location;
use crate::reader::IntermediateReader;
use crate::types::TypeDescriptor;
use crate::value::{ResourceId, ResourceRef, SharedRef, Value};

/// Deferred callback receiving a resolved shared resource.
pub type SharedFixup<'a> = Box<dyn FnOnce(ResourceRef<'_>) -> Result<(), Error> + 'a>;

pub(crate) struct PendingFixup<'a> {
    pub(crate) id: String,
    /// Where the id was first read.
    pub(crate) site: Location,
    /// Always `Some` outside of [`SharedResourceFixups::register`].
    fixup: Option<SharedFixup<'a>>,
}

/// Fixups keyed by resource id, in first-registration order.
#[derive(Default)]
pub(crate) struct SharedResourceFixups<'a> {
    pending: Vec<PendingFixup<'a>>,
    index: AHashMap<String, usize>,
}

impl<'a> SharedResourceFixups<'a> {
    fn register(&mut self, id: String, site: Location, fixup: SharedFixup<'a>) {
        match self.index.get(&id) {
            Some(&slot) => {
                let entry = &mut self.pending[slot];
                entry.fixup = Some(match entry.fixup.take() {
                    Some(previous) => compose(previous, fixup),
                    None => fixup,
                });
            }
            None => {
                self.index.insert(id.clone(), self.pending.len());
                self.pending.push(PendingFixup {
                    id,
                    site,
                    fixup: Some(fixup),
                });
            }
        }
    }

    pub(crate) fn first_pending(&self) -> Option<&PendingFixup<'a>> {
        self.pending.first()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

fn compose<'a>(first: SharedFixup<'a>, then: SharedFixup<'a>) -> SharedFixup<'a> {
    Box::new(move |resource: ResourceRef<'_>| {
        first(resource)?;
        then(resource)
    })
}

/// Errors raised inside fixups know nothing about the document.
fn tag_site(err: Error, path: &Path, site: Location) -> Error {
    if err.location().is_some() {
        err.in_document(path)
    } else {
        err.with_identity(ContentIdentity::new(path, site))
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(object) => format!("'{}'", object.type_name()),
        other => other.kind_name().to_owned(),
    }
}

impl<'a> IntermediateReader<'a> {
    /// Register `fixup` to run with the resource `id` once resources are read.
    ///
    /// Registering again for the same id runs the earlier fixups first.
    pub fn register_shared_fixup(&mut self, id: impl Into<String>, fixup: SharedFixup<'a>) {
        let site = self.position();
        self.register_at(id.into().trim().to_owned(), site, fixup);
    }

    fn register_at(&mut self, id: String, site: Location, fixup: SharedFixup<'a>) {
        debug!(id = id.as_str(), site:% = site; "Registering shared resource fixup");
        self.shared.register(id, site, fixup);
    }

    /// Read a shared resource id and register `fixup` for it.
    ///
    /// With a flattened format the id is the text at the cursor; otherwise it
    /// is the content of the element named by `format`. An empty id registers
    /// nothing. The fixup only runs if the resource is an instance of
    /// `expected_type`; otherwise replay fails with a type mismatch tagged
    /// with this read site.
    pub fn read_shared_resource(
        &mut self,
        format: &Format,
        expected_type: &str,
        fixup: SharedFixup<'a>,
    ) -> Result<(), Error> {
        let expected = self.resolve_expected(expected_type)?;
        if let Some((id, site)) = self.read_shared_id(format)? {
            self.register_checked(id, site, expected, fixup);
        }
        Ok(())
    }

    /// Read a shared resource id and return a reference bound during replay.
    ///
    /// An empty id reads as `Null`.
    pub fn read_shared_reference(&mut self, format: &Format, expected_type: &str) -> Result<Value, Error> {
        let expected = self.resolve_expected(expected_type)?;
        let Some((id, site)) = self.read_shared_id(format)? else {
            return Ok(Value::Null);
        };
        let shared = SharedRef::new(id.clone());
        let slot = shared.clone();
        self.register_checked(
            id,
            site,
            expected,
            Box::new(move |resource: ResourceRef<'_>| {
                slot.bind(resource.index);
                Ok(())
            }),
        );
        Ok(Value::Shared(shared))
    }

    fn resolve_expected(&self, expected_type: &str) -> Result<Arc<TypeDescriptor>, Error> {
        self.read_type_name(expected_type).ok_or_else(|| {
            self.new_error(
                ErrorKind::UnresolvedType,
                format!("Could not resolve type '{expected_type}'."),
            )
        })
    }

    fn read_shared_id(&mut self, format: &Format) -> Result<Option<(String, Location)>, Error> {
        let (id, site) = if format.flatten {
            let site = self.position();
            (self.read_element_content()?, site)
        } else {
            if !self.move_to_element(&format.element_name)? {
                return Err(self.new_error(
                    ErrorKind::ElementNotFound,
                    format!("Element '{}' was not found.", format.element_name),
                ));
            }
            let site = self.position();
            (self.read_element_string()?, site)
        };
        let id = id.trim();
        Ok((!id.is_empty()).then(|| (id.to_owned(), site)))
    }

    fn register_checked(
        &mut self,
        id: String,
        site: Location,
        expected: Arc<TypeDescriptor>,
        fixup: SharedFixup<'a>,
    ) {
        let registry = self.registry();
        let checked: SharedFixup<'a> = Box::new(move |resource: ResourceRef<'_>| {
            if !registry.is_instance(resource.value, &expected) {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "Shared resource \"{}\" is {} and not assignable to '{}'.",
                        resource.id,
                        describe(resource.value),
                        expected.name
                    ),
                )
                .with_location(site));
            }
            fixup(resource)
        });
        self.register_at(id, site, checked);
    }

    /// Read the optional `Resources` section and replay every shared fixup.
    ///
    /// Each `Resource` child needs a unique `ID` attribute; its content is read
    /// as untyped content unless a `Type` attribute says otherwise. Every
    /// registered id must be defined, whether or not the section is present.
    pub fn read_shared_resources(&mut self) -> Result<(), Error> {
        let mut table: AHashMap<String, ResourceId> = AHashMap::new();

        if self.move_to_element("Resources")? {
            if self.cursor().is_empty_element() {
                self.cursor().skip()?;
            } else {
                self.cursor().consume_start()?;
                let format = Format::new("Resource");
                let serializer = self.registry().serializer(&self.registry().object_type());
                while self.move_to_element("Resource")? {
                    let Some(id) = self.cursor().attribute("ID").map(|id| id.trim().to_owned()) else {
                        return Err(self.new_error(
                            ErrorKind::MissingAttribute,
                            "Resource element is missing its 'ID' attribute.",
                        ));
                    };
                    if table.contains_key(&id) {
                        return Err(self.new_error(
                            ErrorKind::DuplicateId,
                            format!("Duplicate shared resource id \"{id}\"."),
                        ));
                    }
                    if let Some(budget) = self.budget() {
                        if self.resources.len() >= budget.max_shared_resources {
                            let breach = BudgetBreach::SharedResources {
                                resources: self.resources.len() + 1,
                            };
                            return Err(Error::budget(breach).with_identity(ContentIdentity::new(
                                self.path(),
                                self.position(),
                            )));
                        }
                    }
                    let value = self.read_object(&format, &*serializer, None)?;
                    table.insert(id, ResourceId(self.resources.len()));
                    self.resources.push(value);
                }
                self.cursor().consume_end()?;
            }
        }

        let fixups = mem::take(&mut self.shared);
        debug!(
            resources = self.resources.len(),
            fixups = fixups.len();
            "Replaying shared resource fixups"
        );
        for pending in fixups.pending {
            let Some(&index) = table.get(&pending.id) else {
                return Err(self.error_at(
                    ErrorKind::MissingSharedResource,
                    format!("Missing shared resource \"{}\".", pending.id),
                    pending.site,
                ));
            };
            let resource = ResourceRef {
                index,
                id: &pending.id,
                value: &self.resources[index.0],
            };
            if let Some(fixup) = pending.fixup {
                fixup(resource).map_err(|err| tag_site(err, self.path(), pending.site))?;
            }
        }
        Ok(())
    }
}
