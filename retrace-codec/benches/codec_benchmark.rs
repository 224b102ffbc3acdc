use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrace_codec::{
    byte_length, decode, decode_lazy, encode, encode_vector_from_items, Descriptor, Value,
};

fn node_descriptor() -> Descriptor {
    Descriptor::structure([
        ("id", Descriptor::u32()),
        ("tag", Descriptor::string()),
        (
            "attributes",
            Descriptor::dict(Descriptor::string(), Descriptor::string().nullable()),
        ),
        ("children", Descriptor::vector(Descriptor::u32())),
    ])
}

fn node_value(id: u32) -> Value {
    Value::Struct(vec![
        Value::from(id),
        Value::from("div"),
        Value::Map(vec![
            (Value::from("class"), Value::from("row")),
            (Value::from("hidden"), Value::Null),
        ]),
        Value::list((id + 1..id + 9).collect::<Vec<u32>>()),
    ])
}

fn bench_byte_length(c: &mut Criterion) {
    let d = node_descriptor();
    let v = node_value(1);
    c.bench_function("byte_length_node", |b| {
        b.iter(|| black_box(byte_length(black_box(&d), black_box(&v)).unwrap()))
    });
}

fn bench_encode(c: &mut Criterion) {
    let d = node_descriptor();
    let v = node_value(1);
    c.bench_function("encode_node", |b| {
        b.iter(|| black_box(encode(black_box(&d), black_box(&v)).unwrap()))
    });
}

fn bench_decode_eager(c: &mut Criterion) {
    let d = node_descriptor();
    let bytes = encode(&d, &node_value(1)).unwrap();
    c.bench_function("decode_eager_node", |b| {
        b.iter(|| black_box(decode(black_box(&d), black_box(&bytes)).unwrap()))
    });
}

fn bench_lazy_item_access(c: &mut Criterion) {
    let item = node_descriptor();
    let list = Descriptor::vector(item.clone());
    let encoded: Vec<Vec<u8>> = (0..10_000)
        .map(|i| encode(&item, &node_value(i)).unwrap())
        .collect();
    let bytes = encode_vector_from_items(&encoded).unwrap();

    c.bench_function("lazy_item_5000_of_10k", |b| {
        b.iter(|| {
            let view = decode_lazy(&list, black_box(&bytes));
            black_box(view.item(5000).unwrap().field(0).unwrap().as_u32().unwrap())
        })
    });
}

fn bench_vector_from_items(c: &mut Criterion) {
    let item = node_descriptor();
    let encoded: Vec<Vec<u8>> = (0..1_000)
        .map(|i| encode(&item, &node_value(i)).unwrap())
        .collect();
    c.bench_function("vector_from_1k_items", |b| {
        b.iter(|| black_box(encode_vector_from_items(black_box(&encoded)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_byte_length,
    bench_encode,
    bench_decode_eager,
    bench_lazy_item_access,
    bench_vector_from_items,
);
criterion_main!(benches);
