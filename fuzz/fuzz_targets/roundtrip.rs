#![no_main]

use {
    libfuzzer_sys::fuzz_target,
    protowire::{
        define_message,
        schema::{FieldDescriptor, FieldType, OneofDescriptor, Registry},
    },
    std::sync::OnceLock,
};

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let scalars = define_message(
            "Scalars",
            [
                FieldDescriptor::new(1, "int32", FieldType::Int32),
                FieldDescriptor::new(2, "sint64", FieldType::Sint64),
                FieldDescriptor::new(3, "flag", FieldType::Bool),
                FieldDescriptor::new(4, "fixed32", FieldType::Fixed32),
                FieldDescriptor::new(5, "sfixed64", FieldType::Sfixed64),
                FieldDescriptor::new(6, "float", FieldType::Float),
                FieldDescriptor::new(7, "name", FieldType::String),
                FieldDescriptor::new(8, "payload", FieldType::Bytes),
            ],
        )
        .expect("valid descriptor");
        let node = define_message(
            "Node",
            [
                FieldDescriptor::repeated(1, "packed", FieldType::Uint64),
                FieldDescriptor::repeated(2, "unpacked", FieldType::Sint32).unpacked(),
                FieldDescriptor::repeated(3, "names", FieldType::String),
                FieldDescriptor::new(4, "scalars", FieldType::message("Scalars")),
                FieldDescriptor::new(5, "child", FieldType::message("Node")),
                FieldDescriptor::map(6, "by_name", FieldType::String, FieldType::message("Node")),
                FieldDescriptor::map(7, "counts", FieldType::Int64, FieldType::Double),
                FieldDescriptor::new(8, "label", FieldType::String),
                FieldDescriptor::new(9, "id", FieldType::Uint32),
            ],
        )
        .and_then(|node| node.with_oneof(OneofDescriptor::new("key", [8, 9])))
        .expect("valid descriptor");
        Registry::new([scalars, node]).expect("valid registry")
    })
}

macro_rules! fuzz_roundtrip {
    ($data:expr, $name:literal) => {
        let descriptor = registry().descriptor($name).expect("registered");
        if let Ok(message) = protowire::decode($data, descriptor) {
            let encoded = protowire::encode(&message, descriptor).expect("encode should succeed");
            assert_eq!(
                protowire::encoded_len(&message, descriptor).expect("encoded_len should succeed"),
                encoded.len()
            );
            let roundtrip =
                protowire::decode(&encoded, descriptor).expect("roundtrip decode should succeed");
            // Compared as bytes; NaN floats are not equal to themselves.
            let reencoded =
                protowire::encode(&roundtrip, descriptor).expect("re-encode should succeed");
            assert_eq!(encoded, reencoded, "roundtrip failed for {}", $name);
        }
    };
}

fuzz_target!(|data: &[u8]| {
    fuzz_roundtrip!(data, "Scalars");
    fuzz_roundtrip!(data, "Node");
});
