use super::Fixture;
use crate::{HostValue, JsErrorCode, JsValue, JsValueType};
use jsrt_variant::HostArray;

fn run(fixture: &Fixture, script: &str) -> JsValue {
    fixture
        .runtime
        .try_run_script(script, None)
        .expect("script should run")
}

#[test]
fn test_value_types() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    assert_eq!(run(&fixture, "1").value_type(), JsValueType::Number);
    assert_eq!(run(&fixture, "'s'").value_type(), JsValueType::String);
    assert_eq!(run(&fixture, "true").value_type(), JsValueType::Boolean);
    assert_eq!(run(&fixture, "null").value_type(), JsValueType::Null);
    assert_eq!(run(&fixture, "[1, 2]").value_type(), JsValueType::Array);
    assert_eq!(run(&fixture, "({})").value_type(), JsValueType::Object);
    assert_eq!(run(&fixture, "square").value_type(), JsValueType::Function);
}

#[test]
fn test_call_function_passes_receiver() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let global = fixture.context.global_object().expect("global");

    let result = global
        .call_function("square", &[HostValue::I32(5)])
        .expect("call should succeed");

    assert_eq!(result, HostValue::I32(25));
}

#[test]
fn test_try_call_function() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let global = fixture.context.global_object().expect("global");

    assert_eq!(
        global.try_call_function::<i32>("square", &[HostValue::F64(1.5)]),
        Some(2)
    );
    assert_eq!(global.try_call_function::<i32>("missing", &[]), None);
}

#[test]
fn test_call_with_explicit_receiver() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let square = fixture
        .context
        .global_object()
        .expect("global")
        .get_property("square")
        .expect("square should exist");

    let result = square
        .call(&[HostValue::Null, HostValue::I32(9)])
        .expect("call should succeed");
    assert_eq!(result, HostValue::I32(81));

    let err = run(&fixture, "1").call(&[HostValue::Null]).unwrap_err();
    assert_eq!(err.code(), Some(JsErrorCode::SCRIPT_EXCEPTION));
}

#[test]
fn test_properties() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let object = run(&fixture, "({})");

    assert!(object.set_property("name", &HostValue::from("box")));
    object
        .try_set_property("size", &HostValue::I32(3), true)
        .expect("set should succeed");

    assert_eq!(object.get_property_as("size", 0_i32), 3);
    assert_eq!(object.get_property_as("name", String::new()), "box");
    assert_eq!(object.get_property_as("absent", -1_i32), -1);
    assert!(
        object
            .try_get_property("absent")
            .expect("lookup should succeed")
            .is_undefined()
    );
}

#[test]
fn test_set_property_to_script_value() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let object = run(&fixture, "({})");
    let inner = run(&fixture, "[1, 2]");

    object
        .set_property_to("items", &inner)
        .expect("set should succeed");

    assert_eq!(
        object.get_property("items").expect("items"),
        inner,
        "the same script value is stored"
    );
}

#[test]
fn test_property_enumeration_keeps_insertion_order() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let object = run(&fixture, "({})");
    for (name, value) in [("b", 2), ("a", 1), ("c", 3)] {
        assert!(object.set_property(name, &HostValue::I32(value)));
    }

    assert_eq!(
        object.property_names().expect("names"),
        ["b", "a", "c"].map(String::from)
    );

    let values: Vec<(String, HostValue)> = object
        .property_values()
        .expect("values")
        .into_iter()
        .map(|(name, value)| (name, value.value().expect("value")))
        .collect();
    assert_eq!(values[1], ("a".to_owned(), HostValue::I32(1)));

    let descriptors = object.property_descriptors().expect("descriptors");
    assert_eq!(descriptors.len(), 3);
    assert_eq!(descriptors[2].get_property_as("value", 0_i32), 3);
    assert!(descriptors[2].get_property_as("writable", false));
}

#[test]
fn test_property_names_of_non_object_fails() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    let err = run(&fixture, "1").property_names().unwrap_err();
    assert_eq!(err.code(), Some(JsErrorCode::ARGUMENT_NOT_OBJECT));
}

#[test]
fn test_indexed_access() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let array = run(&fixture, "[1, 2, 3]");

    assert_eq!(array.get_index_as::<i32>(1), Some(2));
    assert_eq!(array.get_index_as::<i32>(3), None);
    assert!(
        array
            .get_index(10)
            .expect("lookup should succeed")
            .is_undefined()
    );

    array
        .set_index(4, &HostValue::from("five"))
        .expect("set should succeed");
    assert_eq!(array.get_index_as::<String>(4).as_deref(), Some("five"));
    assert_eq!(array.get_property_as("length", 0_i32), 5);
}

#[test]
fn test_array_value_marshals_as_variant_array() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    let value = fixture
        .context
        .object_to_value(&HostValue::from(vec![1, 2, 3]))
        .expect("marshalling should succeed");

    assert_eq!(value.value_type(), JsValueType::Array);
    assert_eq!(
        value.value().expect("value"),
        HostValue::Array(HostArray::Variant(vec![
            HostValue::I32(1),
            HostValue::I32(2),
            HostValue::I32(3),
        ]))
    );
}

#[test]
fn test_plain_object_has_no_host_value() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    let err = run(&fixture, "({})").value().unwrap_err();
    assert_eq!(err.code(), Some(JsErrorCode::NOT_IMPLEMENTED));
}

#[test]
fn test_convert_to_string() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    let text = |script: &str| {
        run(&fixture, script)
            .convert_to_string()
            .expect("conversion should succeed")
    };
    assert_eq!(text("[1, 2]").as_deref(), Some("1,2"));
    assert_eq!(text("({})").as_deref(), Some("[object Object]"));
    assert_eq!(text("undefined").as_deref(), Some("undefined"));
}

#[test]
fn test_prototype_chain() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let object = run(&fixture, "({})");

    let prototype = object
        .prototype()
        .expect("prototype query should succeed")
        .expect("objects have a prototype");
    assert_eq!(prototype.value_type(), JsValueType::Object);

    let end = prototype
        .prototype()
        .expect("prototype query should succeed")
        .expect("the chain ends in null");
    assert_eq!(end.value_type(), JsValueType::Null);

    assert_eq!(
        run(&fixture, "1").prototype().unwrap_err().code(),
        Some(JsErrorCode::ARGUMENT_NOT_OBJECT)
    );
}

#[test]
fn test_detach_value_releases_reference() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");
    let value = run(&fixture, "'kept'");
    let raw = value.handle().expect("live");
    assert_eq!(fixture.fake.refs(raw), 1);

    assert_eq!(value.detach_value().expect("value"), HostValue::from("kept"));
    assert_eq!(fixture.fake.refs(raw), 0);
}

#[test]
fn test_display() {
    let fixture = Fixture::new();
    let _scope = fixture.context.enter().expect("enter should succeed");

    assert_eq!(run(&fixture, "5").to_string(), "Number: 5");
    assert_eq!(run(&fixture, "undefined").to_string(), "Undefined");
    assert_eq!(run(&fixture, "({})").to_string(), "Object");
}
