use crate::{HostValue, Variant};

mod scalars;

/// Marshals and immediately decodes a value.
fn round_trip(value: &HostValue) -> HostValue {
    Variant::from_host(value)
        .expect("construction should succeed")
        .to_host()
        .expect("extraction should succeed")
}
