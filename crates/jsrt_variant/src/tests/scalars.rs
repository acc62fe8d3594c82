use super::round_trip;
use crate::raw::{VARIANT_FALSE, VARIANT_TRUE};
use crate::{DateEncoding, Decimal, Guid, HostValue, ObjectRef, RawPointer, VarType, Variant};
use chrono::NaiveDate;

#[test]
fn test_integer_round_trip() {
    let variant = Variant::from_host(&HostValue::I32(5)).expect("construction should succeed");
    assert_eq!(variant.var_type(), VarType::I4);
    // SAFETY: the variant is tagged VT_I4.
    assert_eq!(unsafe { variant.as_raw().tagged.value.l_val }, 5);
    assert_eq!(variant.to_host().unwrap(), HostValue::I32(5));
}

#[test]
fn test_every_scalar_round_trips() {
    let values = [
        HostValue::Empty,
        HostValue::Null,
        HostValue::Bool(true),
        HostValue::Bool(false),
        HostValue::I8(-8),
        HostValue::U8(200),
        HostValue::I16(-1600),
        HostValue::U16(60000),
        HostValue::I32(i32::MIN),
        HostValue::U32(u32::MAX),
        HostValue::I64(i64::MIN),
        HostValue::U64(u64::MAX),
        HostValue::F32(1.5),
        HostValue::F64(-2.25),
        HostValue::String("hello, world".into()),
        HostValue::String(String::new()),
        HostValue::Currency(123_4567),
        HostValue::Error(0x8000_4005_u32 as i32),
    ];
    for value in &values {
        assert_eq!(&round_trip(value), value, "{} should round trip", value.type_name());
    }
}

#[test]
fn test_bool_uses_variant_sentinels() {
    let yes = Variant::from_host(&true.into()).unwrap();
    let no = Variant::from_host(&false.into()).unwrap();
    assert_eq!(yes.var_type(), VarType::BOOL);
    // SAFETY: both variants are tagged VT_BOOL.
    unsafe {
        assert_eq!(yes.as_raw().tagged.value.bool_val, VARIANT_TRUE);
        assert_eq!(no.as_raw().tagged.value.bool_val, VARIANT_FALSE);
    }
    assert_eq!(VARIANT_TRUE, -1);
}

#[test]
fn test_unicode_string_round_trip() {
    let value = HostValue::from("grüße \u{1F600}");
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_char_and_chars_become_strings() {
    assert_eq!(round_trip(&'x'.into()), HostValue::from("x"));
    assert_eq!(
        round_trip(&vec!['a', 'b', 'c'].into()),
        HostValue::from("abc")
    );
}

#[test]
fn test_guid_becomes_braced_string() {
    let guid = Guid::from_u128(0x0002_0400_0000_0000_c000_0000_0000_0046);
    let variant = Variant::from_host(&guid.into()).unwrap();
    assert_eq!(variant.var_type(), VarType::BSTR);
    assert_eq!(
        variant.to_host().unwrap(),
        HostValue::from("{00020400-0000-0000-c000-000000000046}")
    );
}

#[test]
fn test_decimal_round_trip() {
    let value = Decimal::new(-123_456_789, 4).expect("mantissa fits");
    let variant = Variant::from_host(&value.into()).unwrap();
    assert_eq!(variant.var_type(), VarType::DECIMAL);
    assert_eq!(variant.to_host().unwrap(), HostValue::Decimal(value));
    assert_eq!(value.to_string(), "-12345.6789");
}

#[test]
fn test_date_round_trip() {
    let date = NaiveDate::from_ymd_opt(2021, 7, 4)
        .unwrap()
        .and_hms_milli_opt(13, 14, 15, 160)
        .unwrap();
    let variant = Variant::from_host(&date.into()).unwrap();
    assert_eq!(variant.var_type(), VarType::DATE);
    assert_eq!(variant.to_host().unwrap(), HostValue::Date(date));
}

#[test]
fn test_date_as_file_time() {
    let date = NaiveDate::from_ymd_opt(1999, 12, 31)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();
    let variant = Variant::from_host_with(&date.into(), DateEncoding::FileTime).unwrap();
    assert_eq!(variant.var_type(), VarType::FILETIME);
    assert_eq!(variant.to_host().unwrap(), HostValue::Date(date));
}

#[test]
fn test_null_object_reference() {
    // SAFETY: null is a valid, empty interface pointer.
    let object = unsafe { ObjectRef::dispatch(std::ptr::null_mut()) };
    let variant = Variant::from_host(&object.clone().into()).unwrap();
    assert_eq!(variant.var_type(), VarType::DISPATCH);
    assert_eq!(variant.to_host().unwrap(), HostValue::Object(object));

    // SAFETY: as above.
    let null = unsafe { RawPointer::new(std::ptr::null_mut()) };
    let pointer = Variant::from_host(&HostValue::Pointer(null)).unwrap();
    assert_eq!(pointer.var_type(), VarType::UNKNOWN);
}

#[test]
fn test_explicit_object_tag() {
    // SAFETY: a null object payload owns nothing.
    let variant = unsafe { Variant::from_pointer(std::ptr::null_mut(), VarType::DISPATCH) };
    assert_eq!(variant.var_type(), VarType::DISPATCH);
}

#[test]
fn test_nested_variant_is_unwrapped() {
    let inner = Variant::from_host(&"inner".into()).unwrap();
    let outer = Variant::from_host(&HostValue::from(inner)).unwrap();
    assert_eq!(outer.var_type(), VarType::BSTR);
    assert_eq!(outer.to_host().unwrap(), HostValue::from("inner"));
}

#[test]
fn test_option_maps_none_to_null() {
    assert_eq!(HostValue::from(None::<i32>), HostValue::Null);
    assert_eq!(HostValue::from(Some(3)), HostValue::I32(3));
}

#[test]
fn test_try_clone_is_independent() {
    let original = Variant::from_host(&"copy me".into()).unwrap();
    let copy = original.try_clone().expect("copy should succeed");
    drop(original);
    assert_eq!(copy.to_host().unwrap(), HostValue::from("copy me"));
}

#[test]
fn test_detach_and_attach_transfer_ownership() {
    let variant = Variant::from_host(&"owned".into()).unwrap();
    let mut raw = variant.detach();
    // SAFETY: `raw` was just detached, so nothing else owns its BSTR.
    let attached = unsafe { Variant::attach(&mut raw) };
    assert_eq!(raw.vt(), VarType::EMPTY);
    assert_eq!(attached.to_host().unwrap(), HostValue::from("owned"));
}

#[test]
fn test_clear_resets_to_empty() {
    let mut variant = Variant::from_host(&"gone".into()).unwrap();
    variant.clear().unwrap();
    assert_eq!(variant.var_type(), VarType::EMPTY);
    assert_eq!(variant.to_host().unwrap(), HostValue::Empty);
}

#[test]
fn test_display() {
    let text = Variant::from_host(&"hi".into()).unwrap();
    assert_eq!(text.to_string(), "[VT_BSTR] `hi`");

    let number = Variant::from_host(&7i32.into()).unwrap();
    assert_eq!(number.to_string(), "[VT_I4] 7");

    assert_eq!(Variant::empty().to_string(), "<null>");
}
