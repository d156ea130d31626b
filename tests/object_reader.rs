use std::sync::Arc;

use content_intermediate::{
    from_str, Cursor, Error, ErrorKind, FieldDescriptor, Format, IntermediateReader, Location,
    TypeDescriptor, TypeRegistry, TypeSerializer, Value, XmlCursor,
};
use indoc::indoc;

fn game_types() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(TypeDescriptor::structure("Game.Entity").field(FieldDescriptor::new("Name", "string")))
        .register(
            TypeDescriptor::structure("Game.Enemy")
                .extends("Game.Entity")
                .field(FieldDescriptor::new("Health", "int"))
                .field(FieldDescriptor::new("Loot", "string[]").optional()),
        )
        .register(TypeDescriptor::structure("Game.Crate").field(FieldDescriptor::new("Weight", "float")))
        .register(
            TypeDescriptor::structure("Game.Spawn")
                .field(FieldDescriptor::new("Info", "Game.Entity").flatten())
                .field(FieldDescriptor::new("Count", "int")),
        );
    registry
}

#[test]
fn type_attribute_selects_the_serializer() {
    let registry = TypeRegistry::new();
    let mut cursor = XmlCursor::new(r#"<Root><Value Type="Int32">42</Value></Root>"#);
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let value = reader
        .read_object_of(&Format::new("Value"), "System.Object", None)
        .unwrap();
    assert_eq!(value, Value::Int(42));
    assert_eq!(reader.cursor().move_to_content().unwrap(), content_intermediate::NodeKind::EndElement);
}

#[test]
fn null_marker_yields_the_default_value() {
    let registry = game_types();
    let mut cursor = XmlCursor::new(indoc! {r#"
        <Root>
          <Number Null="true" />
          <Enemy Null="true"><Name>ignored</Name></Enemy>
        </Root>
    "#});
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let number = reader.read_object_of(&Format::new("Number"), "int", None).unwrap();
    assert_eq!(number, Value::Int(0));
    let enemy = reader.read_object_of(&Format::new("Enemy"), "Game.Enemy", None).unwrap();
    assert!(enemy.is_null());
}

#[test]
fn null_marker_is_rejected_when_null_is_not_allowed() {
    let registry = TypeRegistry::new();
    let mut cursor = XmlCursor::new(r#"<Root><Name Null="true"/></Root>"#);
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let err = reader
        .read_object_of(&Format::new("Name").with_allow_null(false), "string", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullNotAllowed);
    assert_eq!(err.location(), Some(Location::new(1, 7)));
}

#[test]
fn type_override_must_be_assignable() {
    let registry = game_types();
    let doc = r#"<Root><Value Type="Game.Crate"><Weight>2</Weight></Value></Root>"#;
    let mut cursor = XmlCursor::new(doc);
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let err = reader
        .read_object_of(&Format::new("Value"), "Game.Entity", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(err.message().contains("Game.Crate"), "{err}");
}

#[test]
fn derived_type_override_reads_all_fields() {
    let registry = game_types();
    let doc = indoc! {r#"
        <Root>
          <Value Type="Game.Enemy">
            <Name>Orc</Name>
            <Health>12</Health>
          </Value>
        </Root>
    "#};
    let mut cursor = XmlCursor::new(doc);
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let value = reader
        .read_object_of(&Format::new("Value"), "Game.Entity", None)
        .unwrap();
    let enemy = value.as_object().unwrap();
    assert_eq!(enemy.type_name(), "Game.Enemy");
    assert_eq!(enemy.get("Name").and_then(Value::as_str), Some("Orc"));
    assert_eq!(enemy.get("Health").and_then(Value::as_i32), Some(12));
    assert_eq!(enemy.get("Loot"), Some(&Value::Null));
}

#[test]
fn unknown_type_attribute_is_unresolved() {
    let registry = TypeRegistry::new();
    let mut cursor = XmlCursor::new(r#"<Root><Value Type="Game.Missing">1</Value></Root>"#);
    cursor.consume_start().unwrap();
    let mut reader = IntermediateReader::new(&mut cursor, &registry, "root.xml");

    let err = reader
        .read_object_of(&Format::new("Value"), "System.Object", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedType);
}

#[test]
fn flattened_fields_read_inline() {
    let registry = game_types();
    let doc = indoc! {r#"
        <XnaContent>
          <Asset Type="Game.Spawn">
            <Name>Goblin</Name>
            <Count>4</Count>
          </Asset>
        </XnaContent>
    "#};
    let graph = from_str(doc, "spawn.xml", &registry).unwrap();
    let info = graph.root().get("Info").and_then(Value::as_object).unwrap();
    assert_eq!(info.get("Name").and_then(Value::as_str), Some("Goblin"));
    assert_eq!(graph.root().get("Count").and_then(Value::as_i32), Some(4));
}

#[test]
fn typed_lists_and_untyped_records() {
    let registry = game_types();
    let doc = indoc! {r#"
        <XnaContent>
          <Asset>
            <Enemy Type="Game.Enemy">
              <Name>Orc</Name>
              <Health>3</Health>
              <Loot>
                <Item>Gold</Item>
                <Item>Sword</Item>
              </Loot>
            </Enemy>
            <Tint R="255" G="128" B="0" />
            <Scale>0.5</Scale>
          </Asset>
        </XnaContent>
    "#};
    let graph = from_str(doc, "loot.xml", &registry).unwrap();
    let root = graph.root();

    let loot = root.get("Enemy").and_then(|e| e.get("Loot")).and_then(Value::as_list).unwrap();
    assert_eq!(loot, &[Value::String("Gold".into()), Value::String("Sword".into())]);
    assert_eq!(root.get("Tint").and_then(|t| t.get("G")), Some(&Value::String("128".into())));
    assert_eq!(root.get("Scale").and_then(Value::as_f64), Some(0.5));
}

#[test]
fn invalid_scalar_reports_its_element() {
    let registry = game_types();
    let doc = indoc! {r#"
        <XnaContent>
          <Asset Type="Game.Enemy">
            <Name>Orc</Name>
            <Health>lots</Health>
          </Asset>
        </XnaContent>
    "#};
    let err = from_str(doc, "orc.xml", &registry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(err.location().map(|l| l.line()), Some(4));
    assert!(err.to_string().starts_with("orc.xml: "), "{err}");
}

/// Reads the element text upper-cased.
struct Shouting {
    target: Arc<TypeDescriptor>,
}

impl TypeSerializer for Shouting {
    fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target
    }

    fn deserialize(
        &self,
        reader: &mut IntermediateReader<'_>,
        _format: &Format,
        _existing: Option<Value>,
    ) -> Result<Value, Error> {
        Ok(Value::String(reader.read_element_content()?.to_uppercase()))
    }
}

#[test]
fn registered_serializer_replaces_the_reflective_one() {
    let mut registry = TypeRegistry::new();
    let target = TypeDescriptor::structure("Game.Tag").field(FieldDescriptor::new("Name", "string"));
    registry.register_serializer(Arc::new(Shouting {
        target: Arc::new(target),
    }));
    assert!(registry.resolve("Game.Tag").is_some());

    let doc = indoc! {r#"
        <XnaContent>
          <Asset Type="Game.Tag">hello</Asset>
        </XnaContent>
    "#};
    let graph = from_str(doc, "tag.xml", &registry).unwrap();
    assert_eq!(graph.root(), &Value::String("HELLO".into()));
}
