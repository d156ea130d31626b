//! The object graph produced by reading a document.
//!
//! Values form a tree. Shared resources live once in the graph's resource
//! arena and are referenced from the tree through [`SharedRef`] slots that are
//! bound when the resource section is replayed; external references carry a
//! filename slot that is filled the same way.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Index of a shared resource in [`ObjectGraph::resources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(pub(crate) usize);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A deserialized value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Object(Object),
    /// Reference to a shared resource, bound once the `Resources` section is read.
    Shared(SharedRef),
    /// Reference to content in another document.
    External(ExternalRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Integer value widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i.into()),
            Value::Long(l) => Some(l),
            _ => None,
        }
    }

    /// Floating point value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f.into()),
            Value::Double(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_shared(&self) -> Option<&SharedRef> {
        match self {
            Value::Shared(shared) => Some(shared),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&ExternalRef> {
        match self {
            Value::External(external) => Some(external),
            _ => None,
        }
    }

    /// Field of an object value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(field))
    }

    /// Short description of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Char(_) => "char",
            Value::Int(_) => "int32",
            Value::Long(_) => "int64",
            Value::Float(_) => "single",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Shared(_) => "shared resource",
            Value::External(_) => "external reference",
        }
    }
}

/// An instance of a record or reflective type. Fields keep document order.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Full name of the instance's type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Remove a field and return its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(position).1)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("Type", &self.type_name)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Placeholder for a shared resource referenced by id.
///
/// Clones share the same slot: binding one binds all.
#[derive(Clone, PartialEq)]
pub struct SharedRef {
    id: String,
    target: Rc<Cell<Option<ResourceId>>>,
}

impl SharedRef {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: Rc::new(Cell::new(None)),
        }
    }

    /// Resource id as written in the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Arena index of the resource, once resolved.
    pub fn target(&self) -> Option<ResourceId> {
        self.target.get()
    }

    pub(crate) fn bind(&self, target: ResourceId) {
        self.target.set(Some(target));
    }
}

impl fmt::Debug for SharedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRef")
            .field("id", &self.id)
            .field("target", &self.target.get())
            .finish()
    }
}

impl Serialize for SharedRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SharedRef", 2)?;
        s.serialize_field("SharedResource", &self.id)?;
        s.serialize_field("Index", &self.target.get())?;
        s.end()
    }
}

/// Reference to content stored in another document.
#[derive(Clone, PartialEq)]
pub struct ExternalRef {
    target_type: String,
    filename: Rc<RefCell<Option<PathBuf>>>,
}

impl ExternalRef {
    pub(crate) fn new(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            filename: Rc::new(RefCell::new(None)),
        }
    }

    /// Type the referenced content is expected to have.
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// Absolute filename of the referenced document, once resolved.
    pub fn filename(&self) -> Option<PathBuf> {
        self.filename.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.filename.borrow().is_some()
    }

    pub(crate) fn set_filename(&self, filename: &Path) {
        *self.filename.borrow_mut() = Some(filename.to_path_buf());
    }
}

impl fmt::Debug for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalRef")
            .field("target_type", &self.target_type)
            .field("filename", &*self.filename.borrow())
            .finish()
    }
}

impl Serialize for ExternalRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ExternalRef", 2)?;
        s.serialize_field("ExternalReference", &self.target_type)?;
        s.serialize_field("Filename", &*self.filename.borrow())?;
        s.end()
    }
}

/// A resource handed to shared-resource fixups during replay.
#[derive(Clone, Copy, Debug)]
pub struct ResourceRef<'r> {
    pub index: ResourceId,
    pub id: &'r str,
    pub value: &'r Value,
}

/// A fully resolved document.
#[derive(Clone, Debug)]
pub struct ObjectGraph {
    root: Value,
    resources: Vec<Value>,
    path: PathBuf,
}

impl ObjectGraph {
    pub(crate) fn new(root: Value, resources: Vec<Value>, path: PathBuf) -> Self {
        Self {
            root,
            resources,
            path,
        }
    }

    /// The primary object of the document.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    /// Shared resources in document order.
    pub fn resources(&self) -> &[Value] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Value> {
        self.resources.get(id.0)
    }

    /// Follow a shared reference into the resource arena.
    pub fn resolve(&self, shared: &SharedRef) -> Option<&Value> {
        shared.target().and_then(|id| self.resource(id))
    }

    /// Path of the document the graph was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Serialize for ObjectGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("Asset", &self.root)?;
        map.serialize_entry("Resources", &self.resources)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_set_replaces_in_place() {
        let mut object = Object::new("Game.Point");
        object.set("X", Value::Int(1));
        object.set("Y", Value::Int(2));
        object.set("X", Value::Int(3));
        let names: Vec<_> = object.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["X", "Y"]);
        assert_eq!(object.get("X"), Some(&Value::Int(3)));
        assert_eq!(object.take("Y"), Some(Value::Int(2)));
        assert_eq!(object.len(), 1);
    }

    #[test]
    fn shared_ref_clones_share_binding() {
        let shared = SharedRef::new("#Resource1");
        let clone = shared.clone();
        assert_eq!(clone.target(), None);
        shared.bind(ResourceId(4));
        assert_eq!(clone.target(), Some(ResourceId(4)));
    }

    #[test]
    fn graph_serializes_with_type_names() {
        let mut object = Object::new("Game.Point");
        object.set("X", Value::Int(1));
        let graph = ObjectGraph::new(Value::Object(object), Vec::new(), PathBuf::from("a.xml"));
        let json = serde_json::to_string(&graph).unwrap();
        assert_eq!(json, r#"{"Asset":{"Type":"Game.Point","X":1},"Resources":[]}"#);
    }
}
