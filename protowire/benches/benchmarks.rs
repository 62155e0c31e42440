use {
    criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    prost::Message as _,
    protowire::{
        define_message, message,
        schema::{FieldDescriptor, FieldType, Registry},
        typed::ProtoMessage,
        Descriptor, MapKey, Message, Value,
    },
    std::collections::BTreeMap,
};

#[derive(Clone, PartialEq, prost::Message)]
struct ProstSimple {
    #[prost(uint64, tag = "1")]
    id: u64,
    #[prost(sint64, tag = "2")]
    value: i64,
    #[prost(bool, tag = "3")]
    flag: bool,
    #[prost(string, tag = "4")]
    name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ProstPacked {
    #[prost(uint64, repeated, tag = "1")]
    values: Vec<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ProstIndex {
    #[prost(btree_map = "string, message", tag = "1")]
    entries: BTreeMap<String, ProstSimple>,
}

message! {
    struct Simple {
        #[field(1, uint64)]
        id: u64,
        #[field(2, sint64)]
        value: i64,
        #[field(3, bool)]
        flag: bool,
        #[field(4, string)]
        name: String,
    }
}

fn registry() -> Registry {
    Registry::new([
        define_message(
            "Simple",
            [
                FieldDescriptor::new(1, "id", FieldType::Uint64),
                FieldDescriptor::new(2, "value", FieldType::Sint64),
                FieldDescriptor::new(3, "flag", FieldType::Bool),
                FieldDescriptor::new(4, "name", FieldType::String),
            ],
        )
        .unwrap(),
        define_message(
            "Packed",
            [FieldDescriptor::repeated(1, "values", FieldType::Uint64)],
        )
        .unwrap(),
        define_message(
            "Index",
            [FieldDescriptor::map(
                1,
                "entries",
                FieldType::String,
                FieldType::message("Simple"),
            )],
        )
        .unwrap(),
    ])
    .unwrap()
}

fn simple_message(i: u64) -> Message {
    Message::new()
        .with(1, i + 1)
        .with(2, -(i as i64) - 1)
        .with(3, true)
        .with(4, format!("entry-{i}"))
}

fn prost_simple(i: u64) -> ProstSimple {
    ProstSimple {
        id: i + 1,
        value: -(i as i64) - 1,
        flag: true,
        name: format!("entry-{i}"),
    }
}

/// Not part of the measured code; checks both codecs agree before timing them.
fn verify_encode(message: &Message, descriptor: Descriptor<'_>, expected: &[u8]) -> Vec<u8> {
    let encoded = protowire::encode(message, descriptor).unwrap();
    assert_eq!(encoded, expected);
    assert_eq!(protowire::encoded_len(message, descriptor).unwrap(), encoded.len());

    let mut buffer = vec![0u8; encoded.len()];
    protowire::encode_into(&mut buffer, message, descriptor).unwrap();
    assert_eq!(buffer, encoded);

    encoded
}

fn bench_simple_comparison(c: &mut Criterion) {
    let registry = registry();
    let descriptor = registry.descriptor("Simple").unwrap();
    let mut group = c.benchmark_group("Simple");
    group.throughput(Throughput::Elements(1));

    let message = simple_message(7);
    let prost_value = prost_simple(7);
    let typed = Simple::decode(&prost_value.encode_to_vec()).unwrap();
    let serialized = verify_encode(&message, descriptor, &prost_value.encode_to_vec());

    group.bench_function("protowire/encode_into", |b| {
        let mut buffer = vec![0u8; serialized.len()];
        b.iter(|| protowire::encode_into(black_box(&mut buffer), black_box(&message), descriptor).unwrap());
    });

    group.bench_function("protowire/encoded_len", |b| {
        b.iter(|| protowire::encoded_len(black_box(&message), descriptor).unwrap());
    });

    group.bench_function("protowire/typed/encode", |b| {
        b.iter(|| black_box(&typed).encode_to_vec().unwrap());
    });

    group.bench_function("prost/encode", |b| {
        b.iter(|| black_box(&prost_value).encode_to_vec());
    });

    group.bench_function("protowire/decode", |b| {
        b.iter(|| protowire::decode(black_box(&serialized), descriptor).unwrap());
    });

    group.bench_function("protowire/typed/decode", |b| {
        b.iter(|| Simple::decode(black_box(&serialized)).unwrap());
    });

    group.bench_function("prost/decode", |b| {
        b.iter(|| ProstSimple::decode(black_box(&serialized[..])).unwrap());
    });

    group.finish();
}

fn bench_packed_comparison(c: &mut Criterion) {
    let registry = registry();
    let descriptor = registry.descriptor("Packed").unwrap();
    let mut group = c.benchmark_group("Packed<uint64>");

    for size in [100, 1_000, 10_000] {
        let values: Vec<u64> = (0..size).map(|i| i * 0x1_0001).collect();
        let message = Message::new().with(1, values.iter().copied().map(Value::U64).collect::<Vec<_>>());
        let prost_value = ProstPacked { values };
        let serialized = verify_encode(&message, descriptor, &prost_value.encode_to_vec());
        group.throughput(Throughput::Bytes(serialized.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("protowire/encode_into", size),
            &message,
            |b, m| {
                let mut buffer = vec![0u8; serialized.len()];
                b.iter(|| protowire::encode_into(black_box(&mut buffer), black_box(m), descriptor).unwrap())
            },
        );

        group.bench_with_input(
            BenchmarkId::new("prost/encode", size),
            &prost_value,
            |b, p| b.iter(|| black_box(p).encode_to_vec()),
        );

        group.bench_with_input(
            BenchmarkId::new("protowire/decode", size),
            &serialized,
            |b, s| b.iter(|| protowire::decode(black_box(s), descriptor).unwrap()),
        );

        group.bench_with_input(
            BenchmarkId::new("prost/decode", size),
            &serialized,
            |b, s| b.iter(|| ProstPacked::decode(black_box(&s[..])).unwrap()),
        );
    }

    group.finish();
}

fn bench_map_comparison(c: &mut Criterion) {
    let registry = registry();
    let descriptor = registry.descriptor("Index").unwrap();
    let mut group = c.benchmark_group("Map<string, Simple>");

    for size in [10, 100, 1_000] {
        let entries: BTreeMap<MapKey, Value> = (0..size)
            .map(|i| (MapKey::String(format!("key-{i:05}")), simple_message(i).into()))
            .collect();
        let message = Message::new().with(1, entries);
        let prost_value = ProstIndex {
            entries: (0..size).map(|i| (format!("key-{i:05}"), prost_simple(i))).collect(),
        };
        let serialized = verify_encode(&message, descriptor, &prost_value.encode_to_vec());
        group.throughput(Throughput::Bytes(serialized.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("protowire/encode", size),
            &message,
            |b, m| b.iter(|| protowire::encode(black_box(m), descriptor).unwrap()),
        );

        group.bench_with_input(
            BenchmarkId::new("prost/encode", size),
            &prost_value,
            |b, p| b.iter(|| black_box(p).encode_to_vec()),
        );

        group.bench_with_input(
            BenchmarkId::new("protowire/decode", size),
            &serialized,
            |b, s| b.iter(|| protowire::decode(black_box(s), descriptor).unwrap()),
        );

        group.bench_with_input(
            BenchmarkId::new("prost/decode", size),
            &serialized,
            |b, s| b.iter(|| ProstIndex::decode(black_box(&s[..])).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simple_comparison,
    bench_packed_comparison,
    bench_map_comparison,
);
criterion_main!(benches);
