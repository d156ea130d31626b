use std::fs;

use content_intermediate::{
    from_reader, load_document, ErrorKind, FieldDescriptor, TypeDescriptor, TypeRegistry, Value,
};
use indoc::indoc;
use tempfile::tempdir;

#[test]
fn external_references_resolve_next_to_the_file() {
    let mut registry = TypeRegistry::new();
    registry
        .register(TypeDescriptor::structure("Game.Texture"))
        .register(
            TypeDescriptor::structure("Game.Sprite")
                .field(FieldDescriptor::new("Texture", "Game.Texture").external()),
        );

    let dir = tempdir().unwrap();
    let levels = dir.path().join("levels");
    fs::create_dir(&levels).unwrap();
    let path = levels.join("one.xml");
    fs::write(
        &path,
        indoc! {r##"
            <?xml version="1.0" encoding="utf-8"?>
            <XnaContent>
              <!-- sprite with one texture -->
              <Asset Type="Game.Sprite">
                <Texture><Reference>#External1</Reference></Texture>
              </Asset>
              <ExternalReferences>
                <ExternalReference ID="#External1" TargetType="Game.Texture">../textures/grass.xml</ExternalReference>
              </ExternalReferences>
            </XnaContent>
        "##},
    )
    .unwrap();

    let graph = load_document(&path, &registry).unwrap();
    assert_eq!(graph.path(), path.as_path());
    let texture = graph.root().get("Texture").and_then(Value::as_external).unwrap();
    assert_eq!(
        texture.filename(),
        Some(std::path::absolute(dir.path().join("textures").join("grass.xml")).unwrap())
    );
}

#[test]
fn utf16_documents_are_decoded_from_their_bom() {
    let text = "<XnaContent><Asset Type=\"string\">Grüße</Asset></XnaContent>";
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));

    let graph = from_reader(bytes.as_slice(), "utf16.xml", &TypeRegistry::new()).unwrap();
    assert_eq!(graph.root().as_str(), Some("Grüße"));
}

#[test]
fn utf8_bom_is_ignored() {
    let bytes = b"\xEF\xBB\xBF<XnaContent><Asset>3</Asset></XnaContent>";
    let graph = from_reader(&bytes[..], "bom.xml", &TypeRegistry::new()).unwrap();
    assert_eq!(graph.root(), &Value::Int(3));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.xml");
    let err = load_document(&path, &TypeRegistry::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.identity().source_filename(), path.as_path());
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn graph_serializes_with_resources() {
    let doc = indoc! {r##"
        <XnaContent>
          <Asset>
            <Name>demo</Name>
          </Asset>
          <Resources>
            <Resource ID="#R1">5</Resource>
          </Resources>
        </XnaContent>
    "##};
    let graph = content_intermediate::from_str(doc, "demo.xml", &TypeRegistry::new()).unwrap();
    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "Asset": { "Type": "System.Object", "Name": "demo" },
            "Resources": [5]
        })
    );
}
