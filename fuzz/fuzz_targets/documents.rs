#![no_main]

use content_intermediate::{from_reader, TypeRegistry};
use libfuzzer_sys::fuzz_target;

// Raw bytes go through BOM sniffing and the whole document reader.
fuzz_target!(|data: &[u8]| {
    let registry = TypeRegistry::new();
    let _ = from_reader(data, "fuzz.xml", &registry);
});
