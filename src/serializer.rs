//! The type serializer capability and the serializers for untyped and scalar content.

use std::sync::Arc;

use crate::cursor::NodeKind;
use crate::error::{Error, ErrorKind};
use crate::format::Format;
use crate::location::Location;
use crate::parse_scalars::infer_scalar;
use crate::reader::IntermediateReader;
use crate::types::{Primitive, TypeDescriptor};
use crate::value::{Object, Value};

/// Attributes that steer the reader and are never content.
pub(crate) const RESERVED_ATTRIBUTES: [&str; 2] = ["Null", "Type"];

/// Deserializes values of one type from the reader's current position.
///
/// `deserialize` is called with the element's start marker already consumed,
/// or, for self-closing elements, with the cursor still on the element so its
/// attributes can be read ([`IntermediateReader::element_is_empty`] tells which).
/// For flattened formats the content is inline in the parent element.
pub trait TypeSerializer: Send + Sync {
    fn target_type(&self) -> &Arc<TypeDescriptor>;

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        format: &Format,
        existing: Option<Value>,
    ) -> Result<Value, Error>;

    /// Value produced for an element marked `Null="true"`.
    fn default_value(&self) -> Value {
        self.target_type().default_value()
    }
}

/// Scalar types parsed from element text.
#[derive(Debug)]
pub struct PrimitiveSerializer {
    primitive: Primitive,
    target: Arc<TypeDescriptor>,
}

impl PrimitiveSerializer {
    pub fn new(primitive: Primitive, target: Arc<TypeDescriptor>) -> Self {
        Self { primitive, target }
    }
}

impl TypeSerializer for PrimitiveSerializer {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        _format: &Format,
        _existing: Option<Value>,
    ) -> Result<Value, Error> {
        let location = reader.cursor().position();
        let text = reader.read_element_content()?;
        self.primitive.parse(&text).map_err(|message| {
            reader.error_at(
                ErrorKind::InvalidValue,
                format!("Invalid {} value: {message}", self.primitive),
                location,
            )
        })
    }

    fn default_value(&self) -> Value {
        self.primitive.default_value()
    }
}

/// Untyped content.
///
/// - Text reads as an inferred scalar
/// - Child elements read as a record of the same kind (a list when all are `Item`)
/// - A self-closing element reads as a record of its attributes, or an empty string
#[derive(Debug)]
pub struct ObjectSerializer {
    target: Arc<TypeDescriptor>,
}

impl ObjectSerializer {
    pub fn new(target: Arc<TypeDescriptor>) -> Self {
        Self { target }
    }

    fn read_attributes(&self, reader: &mut IntermediateReader<'_>) -> Value {
        let mut record = Object::new(self.target.name.clone());
        for (name, value) in reader.cursor().attributes() {
            if !RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                record.set(name.clone(), Value::String(value.clone()));
            }
        }
        if record.is_empty() {
            Value::String(String::new())
        } else {
            Value::Object(record)
        }
    }

    fn read_children(&self, reader: &mut IntermediateReader<'_>) -> Result<Value, Error> {
        let mut children: Vec<(String, Value, Location)> = Vec::new();
        loop {
            match reader.cursor().move_to_content()? {
                NodeKind::Element => {}
                NodeKind::EndElement => break,
                NodeKind::Text => {
                    return Err(reader.new_error(
                        ErrorKind::Syntax,
                        "Text is not allowed between child elements.",
                    ));
                }
                NodeKind::Eof => {
                    return Err(reader.new_error(ErrorKind::Syntax, "Unexpected end of document."));
                }
            }
            let location = reader.cursor().position();
            let name = reader.cursor().name().unwrap_or_default().to_owned();
            let value = reader.read_object(&Format::new(name.clone()), self, None)?;
            children.push((name, value, location));
        }

        if children.iter().all(|(name, _, _)| name == "Item") {
            return Ok(Value::List(
                children.into_iter().map(|(_, value, _)| value).collect(),
            ));
        }

        let mut record = Object::new(self.target.name.clone());
        for (name, value, location) in children {
            if record.get(&name).is_some() {
                return Err(reader.error_at(
                    ErrorKind::DuplicateElement,
                    format!("Element '{name}' appears more than once."),
                    location,
                ));
            }
            record.set(name, value);
        }
        Ok(Value::Object(record))
    }
}

impl TypeSerializer for ObjectSerializer {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        format: &Format,
        _existing: Option<Value>,
    ) -> Result<Value, Error> {
        if reader.element_is_empty() && !format.flatten {
            return Ok(self.read_attributes(reader));
        }
        match reader.cursor().move_to_content()? {
            NodeKind::Text => {
                let text = reader.cursor().read_scalar_content()?;
                Ok(infer_scalar(&text))
            }
            NodeKind::Element => self.read_children(reader),
            NodeKind::EndElement => Ok(Value::String(String::new())),
            NodeKind::Eof => Err(reader.new_error(ErrorKind::Syntax, "Unexpected end of document.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;
    use crate::xml::XmlCursor;

    fn read(doc: &str) -> Result<Value, Error> {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new(doc);
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "test.xml");
        reader.read_object_of(&Format::new("Value"), "System.Object", None)
    }

    #[test]
    fn untyped_text_is_inferred() {
        assert_eq!(read("<Value>12</Value>").unwrap(), Value::Int(12));
        assert_eq!(read("<Value>twelve</Value>").unwrap(), Value::String("twelve".into()));
        assert_eq!(read("<Value></Value>").unwrap(), Value::String(String::new()));
    }

    #[test]
    fn untyped_children_become_a_record() {
        let value = read("<Value><A>1</A><B>x</B></Value>").unwrap();
        let record = value.as_object().unwrap();
        assert_eq!(record.type_name(), "System.Object");
        assert_eq!(record.get("A"), Some(&Value::Int(1)));
        assert_eq!(record.get("B"), Some(&Value::String("x".into())));
    }

    #[test]
    fn untyped_items_become_a_list() {
        let value = read("<Value><Item>1</Item><Item>2</Item></Value>").unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn duplicate_children_are_rejected_at_the_second_one() {
        let err = read("<Value><A>1</A><A>2</A></Value>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateElement);
        assert_eq!(err.location(), Some(Location::new(1, 16)));
    }

    #[test]
    fn self_closing_reads_attributes() {
        let value = read(r#"<Value X="1" Type="object"/>"#).unwrap();
        assert_eq!(value.get("X"), Some(&Value::String("1".into())));
        assert_eq!(value.get("Type"), None);
        assert_eq!(read("<Value/>").unwrap(), Value::String(String::new()));
    }

    #[test]
    fn primitive_parse_failure_is_invalid_value() {
        let registry = TypeRegistry::new();
        let mut cursor = XmlCursor::new("<Value>abc</Value>");
        let mut reader = IntermediateReader::new(&mut cursor, &registry, "test.xml");
        let err = reader
            .read_object_of(&Format::new("Value"), "int", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.message().contains("System.Int32"), "{}", err.message());
    }
}
