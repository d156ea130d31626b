#![no_main]

use content_intermediate::{FieldDescriptor, TypeDescriptor, TypeRegistry, from_str};
use libfuzzer_sys::fuzz_target;

// Splices fuzz text into resource ids and bodies so that replay sees
// unbalanced, duplicate and cyclic references.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.splitn(3, '\n');
    let first = parts.next().unwrap_or_default();
    let second = parts.next().unwrap_or_default();
    let body = parts.next().unwrap_or_default();

    let mut registry = TypeRegistry::new();
    registry.register(
        TypeDescriptor::structure("Fuzz.Node")
            .field(FieldDescriptor::new("Next", "Fuzz.Node").shared().optional())
            .field(FieldDescriptor::new("Body", "object").optional()),
    );

    let doc = format!(
        "<XnaContent><Asset Type=\"Fuzz.Node\"><Next>{first}</Next></Asset>\
         <Resources><Resource ID=\"{first}\" Type=\"Fuzz.Node\"><Next>{second}</Next><Body>{body}</Body></Resource>\
         <Resource ID=\"{second}\">{body}</Resource></Resources></XnaContent>"
    );
    let _ = from_str(&doc, "fuzz.xml", &registry);
});
