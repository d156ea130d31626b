//! Type names, descriptors and the registry that resolves them.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::format::Format;
use crate::parse_scalars::{parse_char, parse_f32, parse_f64, parse_int_signed, parse_xml_bool};
use crate::reflective::{ExternalReferenceSerializer, ListSerializer, StructSerializer};
use crate::serializer::{ObjectSerializer, PrimitiveSerializer, TypeSerializer};
use crate::value::Value;

/// Name of the root of every type hierarchy.
pub const OBJECT_TYPE: &str = "System.Object";

/// Upper bound on inheritance chains, so a cyclic `extends` cannot loop forever.
const MAX_BASE_CHAIN: usize = 64;

/// Built-in scalar types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Char,
    Int32,
    Int64,
    Single,
    Double,
    String,
}

impl Primitive {
    pub const ALL: [Primitive; 7] = [
        Primitive::Boolean,
        Primitive::Char,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Single,
        Primitive::Double,
        Primitive::String,
    ];

    /// Full type name, e.g. `System.Int32`.
    pub fn type_name(self) -> &'static str {
        match self {
            Primitive::Boolean => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::Int32 => "System.Int32",
            Primitive::Int64 => "System.Int64",
            Primitive::Single => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::String => "System.String",
        }
    }

    fn aliases(self) -> [&'static str; 2] {
        match self {
            Primitive::Boolean => ["Boolean", "bool"],
            Primitive::Char => ["Char", "char"],
            Primitive::Int32 => ["Int32", "int"],
            Primitive::Int64 => ["Int64", "long"],
            Primitive::Single => ["Single", "float"],
            Primitive::Double => ["Double", "double"],
            Primitive::String => ["String", "string"],
        }
    }

    /// Convert scalar text. The error is a description of what was wrong.
    pub fn parse(self, text: &str) -> Result<Value, String> {
        Ok(match self {
            Primitive::Boolean => Value::Bool(parse_xml_bool(text)?),
            Primitive::Char => Value::Char(parse_char(text)?),
            Primitive::Int32 => Value::Int(parse_int_signed(text, "int32")?),
            Primitive::Int64 => Value::Long(parse_int_signed(text, "int64")?),
            Primitive::Single => Value::Float(parse_f32(text)?),
            Primitive::Double => Value::Double(parse_f64(text)?),
            Primitive::String => Value::String(text.to_owned()),
        })
    }

    /// Value read for `Null="true"`: zero for value types, null for strings.
    pub fn default_value(self) -> Value {
        match self {
            Primitive::Boolean => Value::Bool(false),
            Primitive::Char => Value::Char('\0'),
            Primitive::Int32 => Value::Int(0),
            Primitive::Int64 => Value::Long(0),
            Primitive::Single => Value::Float(0.0),
            Primitive::Double => Value::Double(0.0),
            Primitive::String => Value::Null,
        }
    }

    pub fn is_value_type(self) -> bool {
        self != Primitive::String
    }

    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Primitive::Boolean, Value::Bool(_))
                | (Primitive::Char, Value::Char(_))
                | (Primitive::Int32, Value::Int(_))
                | (Primitive::Int64, Value::Long(_))
                | (Primitive::Single, Value::Float(_))
                | (Primitive::Double, Value::Double(_))
                | (Primitive::String, Value::String(_))
        )
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// How a field of a reflective type is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// Read inline through the field type's serializer.
    Value,
    /// Written as a resource id; bound after the `Resources` section.
    SharedResource,
    /// Written as a `Reference` element; resolved after the `ExternalReferences` section.
    ExternalReference,
}

/// One field of a reflective type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type. For external references this is the referenced content type.
    pub type_name: String,
    pub format: Format,
    pub role: FieldRole,
}

impl FieldDescriptor {
    /// A field stored in an element of the same name.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            format: Format::new(name.clone()),
            name,
            type_name: type_name.into(),
            role: FieldRole::Value,
        }
    }

    pub fn shared(mut self) -> Self {
        self.role = FieldRole::SharedResource;
        self
    }

    pub fn external(mut self) -> Self {
        self.role = FieldRole::ExternalReference;
        self
    }

    pub fn element_name(mut self, element_name: impl Into<String>) -> Self {
        self.format.element_name = element_name.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.format.optional = true;
        self
    }

    pub fn allow_null(mut self, allow_null: bool) -> Self {
        self.format.allow_null = allow_null;
        self
    }

    pub fn flatten(mut self) -> Self {
        self.format.flatten = true;
        self
    }
}

/// Shape of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// Untyped content, read by inference.
    Object,
    Primitive(Primitive),
    /// Reflective record. Inherited fields come from the base type.
    Struct(Vec<FieldDescriptor>),
    /// Sequence of `Item` elements.
    List { element: String },
    /// Reference to content of type `target` in another document.
    ExternalReference { target: String },
}

/// Runtime description of a content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub base: Option<String>,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    /// Reflective type with no fields yet.
    ///
    /// ```rust
    /// use content_intermediate::{FieldDescriptor, TypeDescriptor};
    ///
    /// let sprite = TypeDescriptor::structure("Game.Sprite")
    ///     .extends("Game.Entity")
    ///     .field(FieldDescriptor::new("Texture", "Game.Texture").external())
    ///     .field(FieldDescriptor::new("Scale", "System.Single").optional());
    /// assert_eq!(sprite.base.as_deref(), Some("Game.Entity"));
    /// ```
    pub fn structure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            kind: TypeKind::Struct(Vec::new()),
        }
    }

    pub fn list(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            kind: TypeKind::List {
                element: element.into(),
            },
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self {
            name: primitive.type_name().to_owned(),
            base: None,
            kind: TypeKind::Primitive(primitive),
        }
    }

    pub fn object() -> Self {
        Self {
            name: OBJECT_TYPE.to_owned(),
            base: None,
            kind: TypeKind::Object,
        }
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Append a field. Has no effect unless this is a reflective type.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        if let TypeKind::Struct(fields) = &mut self.kind {
            fields.push(field);
        }
        self
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object)
    }

    /// Value read for `Null="true"` and for absent optional fields.
    pub fn default_value(&self) -> Value {
        match self.kind {
            TypeKind::Primitive(primitive) => primitive.default_value(),
            _ => Value::Null,
        }
    }
}

/// Maps type names to descriptors and descriptors to serializers.
///
/// Built-in types are registered under their full names with short aliases
/// (`System.Int32`, `Int32`, `int`). Array names (`Game.Enemy[]`) resolve to
/// list types of their element. The registry is immutable while documents are
/// read and may be shared between threads.
pub struct TypeRegistry {
    types: AHashMap<String, Arc<TypeDescriptor>>,
    aliases: AHashMap<String, String>,
    serializers: AHashMap<String, Arc<dyn TypeSerializer>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.types.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &names)
            .field("custom_serializers", &self.serializers.len())
            .finish()
    }
}

impl TypeRegistry {
    /// Registry with the built-in types only.
    pub fn new() -> Self {
        let mut registry = Self {
            types: AHashMap::new(),
            aliases: AHashMap::new(),
            serializers: AHashMap::new(),
        };
        registry.register(TypeDescriptor::object());
        registry.register_alias("Object", OBJECT_TYPE);
        registry.register_alias("object", OBJECT_TYPE);
        for primitive in Primitive::ALL {
            registry.register(TypeDescriptor::primitive(primitive));
            for alias in primitive.aliases() {
                registry.register_alias(alias, primitive.type_name());
            }
        }
        registry
    }

    /// Register (or replace) a type under its full name.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    /// Make `alias` resolve to the type registered as `name`.
    pub fn register_alias(&mut self, alias: impl Into<String>, name: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), name.into());
        self
    }

    /// Use `serializer` for its target type instead of the built-in one.
    ///
    /// The target type is registered too, so it resolves by name.
    pub fn register_serializer(&mut self, serializer: Arc<dyn TypeSerializer>) -> &mut Self {
        let target = Arc::clone(serializer.target_type());
        self.serializers.insert(target.name.clone(), serializer);
        self.types.insert(target.name.clone(), target);
        self
    }

    /// Resolve a type name. Unknown names are `None`.
    pub fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let name = name.trim();
        let canonical = self.aliases.get(name).map_or(name, String::as_str);
        if let Some(descriptor) = self.types.get(canonical) {
            return Some(Arc::clone(descriptor));
        }
        // `T[]` is a list of `T`.
        let element = canonical.strip_suffix("[]")?;
        let element = self.resolve(element)?;
        Some(Arc::new(TypeDescriptor::list(
            format!("{}[]", element.name),
            element.name.clone(),
        )))
    }

    /// The root `System.Object` type.
    pub fn object_type(&self) -> Arc<TypeDescriptor> {
        self.types
            .get(OBJECT_TYPE)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(TypeDescriptor::object()))
    }

    /// Whether a value of type `candidate` may be stored where `target` is declared.
    pub fn is_assignable(&self, target: &TypeDescriptor, candidate: &TypeDescriptor) -> bool {
        if target.is_object() || target.name == candidate.name {
            return true;
        }
        let mut base = candidate.base.clone();
        for _ in 0..MAX_BASE_CHAIN {
            let Some(name) = base else {
                return false;
            };
            let Some(descriptor) = self.resolve(&name) else {
                return false;
            };
            if descriptor.name == target.name {
                return true;
            }
            base = descriptor.base.clone();
        }
        false
    }

    /// Whether an already-read value is an instance of `target`.
    pub fn is_instance(&self, value: &Value, target: &TypeDescriptor) -> bool {
        if target.is_object() {
            return true;
        }
        match (value, &target.kind) {
            (Value::Null, TypeKind::Primitive(primitive)) => !primitive.is_value_type(),
            (Value::Null, _) => true,
            (_, TypeKind::Primitive(primitive)) => primitive.matches(value),
            (Value::List(items), TypeKind::List { element }) => match self.resolve(element) {
                Some(element) => items.iter().all(|item| self.is_instance(item, &element)),
                None => false,
            },
            (Value::External(external), TypeKind::ExternalReference { target }) => {
                external.target_type() == target
            }
            (Value::Object(object), _) => self
                .resolve(object.type_name())
                .is_some_and(|candidate| self.is_assignable(target, &candidate)),
            _ => false,
        }
    }

    /// Serializer for a resolved type. Custom registrations win over built-ins.
    pub fn serializer(&self, descriptor: &Arc<TypeDescriptor>) -> Arc<dyn TypeSerializer> {
        if let Some(custom) = self.serializers.get(&descriptor.name) {
            return Arc::clone(custom);
        }
        match &descriptor.kind {
            TypeKind::Object => Arc::new(ObjectSerializer::new(Arc::clone(descriptor))),
            TypeKind::Primitive(primitive) => {
                Arc::new(PrimitiveSerializer::new(*primitive, Arc::clone(descriptor)))
            }
            TypeKind::Struct(_) => Arc::new(StructSerializer::new(Arc::clone(descriptor))),
            TypeKind::List { .. } => Arc::new(ListSerializer::new(Arc::clone(descriptor))),
            TypeKind::ExternalReference { .. } => {
                Arc::new(ExternalReferenceSerializer::new(Arc::clone(descriptor)))
            }
        }
    }

    /// Resolve `name` and select its serializer.
    pub fn serializer_for(&self, name: &str) -> Option<Arc<dyn TypeSerializer>> {
        self.resolve(name).map(|descriptor| self.serializer(&descriptor))
    }

    /// Descriptor of a reference to content of type `target`.
    pub fn external_reference_type(&self, target: &str) -> Arc<TypeDescriptor> {
        let target = self
            .resolve(target)
            .map_or_else(|| target.to_owned(), |descriptor| descriptor.name.clone());
        Arc::new(TypeDescriptor {
            name: format!("ExternalReference<{target}>"),
            base: None,
            kind: TypeKind::ExternalReference { target },
        })
    }
}
