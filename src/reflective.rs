//! Serializers driven by type descriptors: records, lists and external references.

use std::sync::Arc;

use log::trace;

use crate::error::{Error, ErrorKind};
use crate::format::Format;
use crate::reader::IntermediateReader;
use crate::serializer::TypeSerializer;
use crate::types::{FieldDescriptor, FieldRole, TypeDescriptor, TypeKind, TypeRegistry};
use crate::value::{ExternalRef, Object, Value};

const MAX_INHERITANCE_DEPTH: usize = 64;

/// Reads a record type field by field.
///
/// Fields are read in declaration order, inherited fields first. An existing
/// instance is overlaid: fields present in the document replace its values,
/// the rest are kept.
#[derive(Debug)]
pub struct StructSerializer {
    target: Arc<TypeDescriptor>,
}

impl StructSerializer {
    pub fn new(target: Arc<TypeDescriptor>) -> Self {
        Self { target }
    }

    /// All fields of the type, base types first.
    fn fields(&self, reader: &IntermediateReader<'_>) -> Result<Vec<FieldDescriptor>, Error> {
        let registry = reader.registry();
        let mut chain = vec![Arc::clone(&self.target)];
        let mut base = self.target.base.clone();
        while let Some(name) = base {
            if chain.len() > MAX_INHERITANCE_DEPTH {
                return Err(reader.new_error(
                    ErrorKind::UnresolvedType,
                    format!("Inheritance chain of '{}' is too deep.", self.target.name),
                ));
            }
            let descriptor = registry.resolve(&name).ok_or_else(|| {
                reader.new_error(
                    ErrorKind::UnresolvedType,
                    format!("Could not resolve type '{name}'."),
                )
            })?;
            if descriptor.is_object() {
                break;
            }
            base = descriptor.base.clone();
            chain.push(descriptor);
        }

        Ok(chain
            .iter()
            .rev()
            .filter_map(|descriptor| match &descriptor.kind {
                TypeKind::Struct(fields) => Some(fields.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect())
    }

    fn read_field(
        &self,
        reader: &mut IntermediateReader<'_>,
        field: &FieldDescriptor,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        trace!(field = field.name.as_str(), role:? = field.role; "Reading field");
        match field.role {
            FieldRole::Value => {
                let serializer = field_serializer(reader, field)?;
                reader.read_object(&field.format, &*serializer, existing)
            }
            FieldRole::SharedResource => reader.read_shared_reference(&field.format, &field.type_name),
            FieldRole::ExternalReference => {
                let descriptor = reader.registry().external_reference_type(&field.type_name);
                let serializer = ExternalReferenceSerializer::new(descriptor);
                reader.read_object(&field.format, &serializer, existing)
            }
        }
    }

    /// Self-closing records carry their scalar fields as attributes.
    fn read_attributes(
        &self,
        reader: &mut IntermediateReader<'_>,
        fields: &[FieldDescriptor],
        object: &mut Object,
    ) -> Result<(), Error> {
        let registry = reader.registry();
        for field in fields {
            let attribute = reader
                .cursor()
                .attribute(&field.format.element_name)
                .map(str::to_owned);
            let primitive = match registry.resolve(&field.type_name).map(|d| d.kind.clone()) {
                Some(TypeKind::Primitive(primitive)) if field.role == FieldRole::Value => Some(primitive),
                _ => None,
            };
            match (attribute, primitive) {
                (Some(text), Some(primitive)) => {
                    let value = primitive.parse(&text).map_err(|message| {
                        reader.new_error(
                            ErrorKind::InvalidValue,
                            format!("Invalid {primitive} value for '{}': {message}", field.name),
                        )
                    })?;
                    object.set(field.name.clone(), value);
                }
                _ if field.format.optional => {
                    if object.get(&field.name).is_none() {
                        object.set(field.name.clone(), default_for(registry, field));
                    }
                }
                _ => {
                    return Err(reader.new_error(
                        ErrorKind::ElementNotFound,
                        format!("Element '{}' was not found.", field.format.element_name),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn field_serializer(
    reader: &IntermediateReader<'_>,
    field: &FieldDescriptor,
) -> Result<Arc<dyn TypeSerializer>, Error> {
    reader.registry().serializer_for(&field.type_name).ok_or_else(|| {
        reader.new_error(
            ErrorKind::UnresolvedType,
            format!("Could not resolve type '{}'.", field.type_name),
        )
    })
}

fn default_for(registry: &TypeRegistry, field: &FieldDescriptor) -> Value {
    match field.role {
        FieldRole::Value => registry
            .resolve(&field.type_name)
            .map_or(Value::Null, |descriptor| descriptor.default_value()),
        FieldRole::SharedResource | FieldRole::ExternalReference => Value::Null,
    }
}

impl TypeSerializer for StructSerializer {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        format: &Format,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        let fields = self.fields(reader)?;
        let mut object = match existing {
            Some(Value::Object(object)) => object,
            _ => Object::new(self.target.name.clone()),
        };

        if reader.element_is_empty() && !format.flatten {
            self.read_attributes(reader, &fields, &mut object)?;
            return Ok(Value::Object(object));
        }

        let registry = reader.registry();
        for field in &fields {
            if field.format.optional
                && !field.format.flatten
                && !reader.move_to_element(&field.format.element_name)?
            {
                if object.get(&field.name).is_none() {
                    object.set(field.name.clone(), default_for(registry, field));
                }
                continue;
            }
            let current = object.get(&field.name).cloned();
            let value = self.read_field(reader, field, current)?;
            object.set(field.name.clone(), value);
        }
        Ok(Value::Object(object))
    }
}

/// Reads `Item` children into a list, appending to an existing list.
#[derive(Debug)]
pub struct ListSerializer {
    target: Arc<TypeDescriptor>,
}

impl ListSerializer {
    pub fn new(target: Arc<TypeDescriptor>) -> Self {
        Self { target }
    }
}

impl TypeSerializer for ListSerializer {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        _format: &Format,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        let TypeKind::List { element } = &self.target.kind else {
            return Err(reader.new_error(
                ErrorKind::TypeMismatch,
                format!("Type '{}' is not a list.", self.target.name),
            ));
        };
        let serializer = reader.registry().serializer_for(element).ok_or_else(|| {
            reader.new_error(
                ErrorKind::UnresolvedType,
                format!("Could not resolve type '{element}'."),
            )
        })?;

        let mut items = match existing {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        };
        if reader.element_is_empty() {
            return Ok(Value::List(items));
        }
        let format = Format::new("Item");
        while reader.move_to_element("Item")? {
            items.push(reader.read_object(&format, &*serializer, None)?);
        }
        Ok(Value::List(items))
    }
}

/// Reads a `Reference` child holding an external reference id.
///
/// The returned reference is unresolved until the `ExternalReferences` section
/// is read. Without a `Reference` child the reference stays unresolved.
#[derive(Debug)]
pub struct ExternalReferenceSerializer {
    target: Arc<TypeDescriptor>,
}

impl ExternalReferenceSerializer {
    pub fn new(target: Arc<TypeDescriptor>) -> Self {
        Self { target }
    }
}

impl TypeSerializer for ExternalReferenceSerializer {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        _format: &Format,
        existing: Option<Value>,
    ) -> Result<Value, Error> {
        let TypeKind::ExternalReference { target } = &self.target.kind else {
            return Err(reader.new_error(
                ErrorKind::TypeMismatch,
                format!("Type '{}' is not an external reference.", self.target.name),
            ));
        };
        let existing = match existing {
            Some(Value::External(external)) if external.target_type() == target => Some(external),
            _ => None,
        };
        if reader.element_is_empty() {
            return Ok(Value::External(
                existing.unwrap_or_else(|| ExternalRef::new(target.clone())),
            ));
        }
        let reference = reader.read_external_reference(target, existing)?;
        Ok(Value::External(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;
    use crate::xml::XmlCursor;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeDescriptor::structure("Game.Entity")
                    .field(FieldDescriptor::new("Name", "string")),
            )
            .register(
                TypeDescriptor::structure("Game.Enemy")
                    .extends("Game.Entity")
                    .field(FieldDescriptor::new("Health", "int"))
                    .field(FieldDescriptor::new("Speed", "float").optional()),
            )
            .register(TypeDescriptor::list("Game.Wave", "Game.Enemy"));
        registry
    }

    fn read(registry: &TypeRegistry, doc: &str, ty: &str) -> Result<Value, Error> {
        let mut cursor = XmlCursor::new(doc);
        let mut reader = IntermediateReader::new(&mut cursor, registry, "test.xml");
        reader.read_object_of(&Format::new("Value"), ty, None)
    }

    #[test]
    fn inherited_fields_come_first() {
        let registry = registry();
        let value = read(
            &registry,
            "<Value><Name>Orc</Name><Health>30</Health><Speed>1.5</Speed></Value>",
            "Game.Enemy",
        )
        .unwrap();
        let object = value.as_object().unwrap();
        let names: Vec<_> = object.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["Name", "Health", "Speed"]);
        assert_eq!(object.get("Speed"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn fields_out_of_order_are_not_found() {
        let registry = registry();
        let err = read(
            &registry,
            "<Value><Health>30</Health><Name>Orc</Name></Value>",
            "Game.Enemy",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
        assert!(err.message().contains("'Name'"));
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let registry = registry();
        let value = read(
            &registry,
            "<Value><Name>Orc</Name><Health>30</Health></Value>",
            "Game.Enemy",
        )
        .unwrap();
        assert_eq!(value.get("Speed"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn self_closing_record_reads_attributes() {
        let registry = registry();
        let value = read(&registry, r#"<Value Name="Imp" Health="5"/>"#, "Game.Enemy").unwrap();
        assert_eq!(value.get("Name"), Some(&Value::String("Imp".into())));
        assert_eq!(value.get("Health"), Some(&Value::Int(5)));

        let err = read(&registry, r#"<Value Name="Imp"/>"#, "Game.Enemy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
    }

    #[test]
    fn lists_read_items_with_type_overrides() {
        let mut registry = registry();
        registry.register(TypeDescriptor::structure("Game.Boss").extends("Game.Enemy"));
        let doc = r#"<Value>
            <Item><Name>a</Name><Health>1</Health></Item>
            <Item Type="Game.Boss"><Name>b</Name><Health>99</Health></Item>
            <Item Null="true"/>
        </Value>"#;
        let value = read(&registry, doc, "Game.Wave").unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_object().unwrap().type_name(), "Game.Boss");
        assert!(items[2].is_null());
    }

    #[test]
    fn existing_list_is_appended_to() {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new("<Value><Item>2</Item></Value>");
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "test.xml");
        let value = reader
            .read_object_of(&Format::new("Value"), "int[]", Some(Value::List(vec![Value::Int(1)])))
            .unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }
}
