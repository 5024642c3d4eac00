//! 长度计算的组合规则：计算器调用次数、参数与各类字段的贡献。

use std::sync::Arc;

use spark_codec_protobuf::test_stubs::calculator::{
    CountingContext, RecordingSizeCalculator, SizeCall,
};
use spark_codec_protobuf::test_stubs::message::ScriptedMessage;
use spark_codec_protobuf::{
    DynamicMessage, FieldDescriptor, Message, MessageDescriptor, ScalarKind, Value, WireOptions,
    serialize_to_vec, serialized_size_of,
};

fn simple_descriptor() -> Arc<MessageDescriptor> {
    MessageDescriptor::builder("Simple")
        .field(FieldDescriptor::singular(1, "double", ScalarKind::Double))
        .field(FieldDescriptor::singular(2, "float", ScalarKind::Float))
        .field(FieldDescriptor::singular(3, "int64", ScalarKind::Int64))
        .field(FieldDescriptor::singular(4, "uint64", ScalarKind::Uint64))
        .field(FieldDescriptor::singular(5, "int32", ScalarKind::Int32))
        .field(FieldDescriptor::singular(6, "fixed64", ScalarKind::Fixed64))
        .field(FieldDescriptor::singular(7, "fixed32", ScalarKind::Fixed32))
        .field(FieldDescriptor::singular(8, "bool", ScalarKind::Bool))
        .field(FieldDescriptor::singular(9, "string", ScalarKind::String))
        .field(FieldDescriptor::singular(12, "bytes", ScalarKind::Bytes))
        .field(FieldDescriptor::singular(13, "uint32", ScalarKind::Uint32))
        .field(FieldDescriptor::singular(15, "sfixed32", ScalarKind::Sfixed32))
        .field(FieldDescriptor::singular(16, "sfixed64", ScalarKind::Sfixed64))
        .field(FieldDescriptor::singular(17, "sint32", ScalarKind::Sint32))
        .field(FieldDescriptor::singular(18, "sint64", ScalarKind::Sint64))
        .build()
        .expect("Simple 描述符合法")
}

fn populated_simple() -> DynamicMessage {
    let mut simple = DynamicMessage::new(simple_descriptor());
    simple.set(8, true).unwrap();
    simple.set(12, b"bar".to_vec()).unwrap();
    simple.set(9, "foo").unwrap();
    simple.set(2, Value::Float(12345.123)).unwrap();
    simple.set_u64(13, 123_456_789).unwrap();
    simple.set_i64(5, -123_456_789).unwrap();
    simple.set_u64(7, 123_456_789).unwrap();
    simple.set_i64(17, -123_456_789).unwrap();
    simple.set_i64(15, -123_456_789).unwrap();
    simple.set(1, Value::Double(123_456_789.12345)).unwrap();
    simple.set_i64(3, -123_456_789_123_456_789).unwrap();
    simple.set_u64(4, 123_456_789_123_456_789).unwrap();
    simple.set_u64(6, 123_456_789_123_456_789).unwrap();
    simple.set_i64(18, -123_456_789_123_456_789).unwrap();
    simple.set_i64(16, -123_456_789_123_456_789).unwrap();
    simple
}

#[test]
fn simple_message_issues_exactly_the_expected_calculator_calls() {
    let simple = populated_simple();
    let calc = RecordingSizeCalculator::new()
        .script(SizeCall::Varint(-123_456_789_123_456_789_i64 as u64), 10)
        .script(SizeCall::Varint(123_456_789_123_456_789), 9)
        .script(SizeCall::Varint(-123_456_789_i64 as u64), 10)
        .script(SizeCall::Varint(123_456_789), 4);
    let ctx = CountingContext::new(&calc);

    let size = simple.serialized_size(&ctx).unwrap();
    assert_eq!(ctx.calculator_fetches(), 1);

    let mut varints: Vec<u64> = calc
        .calls_matching(|call| matches!(call, SizeCall::Varint(_)))
        .into_iter()
        .map(|(_, result)| result)
        .collect();
    varints.sort_unstable();
    assert_eq!(varints, vec![4, 9, 10, 10]);

    assert_eq!(
        calc.calls_matching(|call| !matches!(call, SizeCall::Varint(_))),
        vec![
            (SizeCall::String("foo".to_owned()), 3),
            (SizeCall::ByteStream(b"bar".to_vec()), 3),
            (SizeCall::Zigzag32(-123_456_789), 4),
            (SizeCall::Zigzag64(-123_456_789_123_456_789), 9),
        ]
    );

    // 1 字节 tag 的十二个字段 + 2 字节 tag 的三个字段。
    assert_eq!(size, 107);
    assert_eq!(
        serialize_to_vec(&simple, WireOptions::default()).unwrap().len() as u64,
        size
    );
}

#[test]
fn repeated_string_calls_string_size_per_element() {
    let descriptor = MessageDescriptor::builder("Repeated")
        .field(FieldDescriptor::repeated(1, "string", ScalarKind::String))
        .build()
        .unwrap();
    let mut repeated = DynamicMessage::new(descriptor);
    for s in ["one", "two", "three"] {
        repeated.push(1, s).unwrap();
    }

    let calc = RecordingSizeCalculator::new();
    let ctx = CountingContext::new(&calc);
    let size = repeated.serialized_size(&ctx).unwrap();

    assert_eq!(ctx.calculator_fetches(), 1);
    assert_eq!(
        calc.calls(),
        vec![
            (SizeCall::String("one".to_owned()), 4),
            (SizeCall::String("two".to_owned()), 4),
            (SizeCall::String("three".to_owned()), 6),
        ]
    );
    assert_eq!(size, 3 + 4 + 4 + 6);
}

#[test]
fn repeated_int32_contributes_tag_and_element_per_value() {
    let descriptor = MessageDescriptor::builder("Repeated")
        .field(FieldDescriptor::repeated(2, "int", ScalarKind::Int32))
        .build()
        .unwrap();
    let mut repeated = DynamicMessage::new(descriptor);
    for v in [1, 2, 2] {
        repeated.push(2, Value::Int32(v)).unwrap();
    }

    let calc = RecordingSizeCalculator::new();
    let ctx = CountingContext::new(&calc);
    let size = repeated.serialized_size(&ctx).unwrap();

    assert_eq!(ctx.calculator_fetches(), 1);
    assert_eq!(
        calc.calls(),
        vec![
            (SizeCall::Varint(1), 1),
            (SizeCall::Varint(2), 1),
            (SizeCall::Varint(2), 1),
        ]
    );
    assert_eq!(size, 3 * (1 + 1));
}

#[test]
fn address_book_adds_sub_message_and_extensions() {
    let descriptor = MessageDescriptor::builder("AddressBook")
        .field(FieldDescriptor::repeated(1, "person", ScalarKind::Message))
        .build()
        .unwrap();
    let person = Arc::new(ScriptedMessage::new("Person", vec![0x0a_u8, 0x00]));
    let mut book = DynamicMessage::new(descriptor);
    book.push(1, Value::Message(person.clone())).unwrap();
    book.extensions_mut().insert(10, true).unwrap();
    book.extensions_mut().insert(11, true).unwrap();

    let calc = RecordingSizeCalculator::new();
    let ctx = CountingContext::new(&calc);
    let size = book.serialized_size(&ctx).unwrap();

    assert_eq!(ctx.calculator_fetches(), 1);
    assert_eq!(calc.calls(), vec![(SizeCall::Varint(2), 1)]);
    assert_eq!(person.size_calls(), 1);
    let extensions = book.extensions().unwrap().serialized_size(&ctx).unwrap();
    assert_eq!(extensions, 4);
    assert_eq!(size, 1 + 1 + 2 + extensions);
}

#[test]
fn nested_message_contributes_tag_prefix_and_body() {
    let inner_descriptor = MessageDescriptor::builder("Inner")
        .field(FieldDescriptor::singular(1, "text", ScalarKind::String))
        .build()
        .unwrap();
    let mut inner = DynamicMessage::new(inner_descriptor);
    inner.set(1, "x".repeat(200)).unwrap();
    let inner_size = serialized_size_of(&inner, WireOptions::default()).unwrap();
    assert_eq!(inner_size, 1 + 2 + 200);

    let outer_descriptor = MessageDescriptor::builder("Outer")
        .field(FieldDescriptor::singular(20, "inner", ScalarKind::Message))
        .build()
        .unwrap();
    let mut outer = DynamicMessage::new(outer_descriptor);
    outer.set(20, Value::message(inner)).unwrap();

    assert_eq!(
        serialized_size_of(&outer, WireOptions::default()).unwrap(),
        2 + 2 + inner_size
    );
}

#[test]
fn packed_field_issues_one_length_call() {
    let descriptor = MessageDescriptor::builder("Samples")
        .field(FieldDescriptor::repeated(4, "values", ScalarKind::Sint64).packed())
        .build()
        .unwrap();
    let mut samples = DynamicMessage::new(descriptor);
    for v in [-1_i64, 64, -65] {
        samples.push(4, Value::Sint64(v)).unwrap();
    }

    let calc = RecordingSizeCalculator::new();
    let ctx = CountingContext::new(&calc);
    let size = samples.serialized_size(&ctx).unwrap();

    assert_eq!(
        calc.calls(),
        vec![
            (SizeCall::Zigzag64(-1), 1),
            (SizeCall::Zigzag64(64), 2),
            (SizeCall::Zigzag64(-65), 2),
            (SizeCall::Varint(5), 1),
        ]
    );
    assert_eq!(size, 1 + 1 + 5);
}
