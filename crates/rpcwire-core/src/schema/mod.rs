//! The struct codec contract shared by hand-written and generated types.
//!
//! # How a generated struct plugs in (for beginners)
//!
//! A schema compiler turns each IDL struct into a Rust struct that implements
//! three traits:
//!
//! - [`Encode`] – write the struct (all present fields, then stop).
//! - [`Decode`] – read the struct, matching fields by *id*, never position.
//! - [`WireValue`] – the struct as a *value* with type tag `Struct`, so it can
//!   sit inside lists, sets, maps, and other structs.
//!
//! Scalars, strings, and the standard containers implement [`WireValue`]
//! here, so `Vec<BTreeMap<String, Vec<i64>>>` encodes with no extra code.
//!
//! Decoders are built on [`read_struct`], which skips every field the
//! decoder does not consume.  That is the whole of forward compatibility: a
//! reader built against an older schema simply never claims the new ids.

pub mod exception;
pub mod value;

use std::collections::{BTreeMap, BTreeSet};

use crate::protocol::{
    skip, FieldHeader, ListHeader, MapHeader, Protocol, ProtocolError, SetHeader, TType,
};

pub use exception::{ApplicationException, ApplicationExceptionKind};
pub use value::{StructValue, Value};

/// Upper bound on capacity reserved up front for a decoded container.
///
/// The element count comes off the wire; reserving it blindly would let a
/// corrupt header allocate gigabytes before the first element fails to
/// decode.
const MAX_PREALLOCATION: usize = 1024;

/// A struct that can serialise itself.
pub trait Encode {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError>;
}

/// A struct that can deserialise itself.
pub trait Decode: Sized {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError>;
}

/// A value with a fixed wire type that can appear as a field or element.
pub trait WireValue: Sized {
    /// Type tag written in field and container headers.
    const TTYPE: TType;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError>;
    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError>;
}

// ── Struct helpers ────────────────────────────────────────────────────────────

/// Writes a complete struct: begin, the fields written by `body`, stop, end.
pub fn write_struct<F>(protocol: &mut dyn Protocol, name: &str, body: F) -> Result<(), ProtocolError>
where
    F: FnOnce(&mut dyn Protocol) -> Result<(), ProtocolError>,
{
    protocol.write_struct_begin(name)?;
    body(&mut *protocol)?;
    protocol.write_field_stop()?;
    protocol.write_struct_end()
}

/// Writes one field: header, value, field end.
pub fn write_field<T: WireValue>(
    protocol: &mut dyn Protocol,
    name: &'static str,
    id: i16,
    value: &T,
) -> Result<(), ProtocolError> {
    protocol.write_field_begin(&FieldHeader::new(name, T::TTYPE, id))?;
    value.write_value(protocol)?;
    protocol.write_field_end()
}

/// Writes the field only when `value` is present.
pub fn write_optional_field<T: WireValue>(
    protocol: &mut dyn Protocol,
    name: &'static str,
    id: i16,
    value: Option<&T>,
) -> Result<(), ProtocolError> {
    match value {
        Some(value) => write_field(protocol, name, id, value),
        None => Ok(()),
    }
}

/// Reads a struct, handing every field header to `on_field`.
///
/// `on_field` returns `Ok(true)` if it consumed the field's value and
/// `Ok(false)` to have the value skipped.  Unknown ids and ids whose type
/// tag does not match the schema should both return `false`.
pub fn read_struct<F>(protocol: &mut dyn Protocol, mut on_field: F) -> Result<(), ProtocolError>
where
    F: FnMut(&mut dyn Protocol, &FieldHeader) -> Result<bool, ProtocolError>,
{
    protocol.read_struct_begin()?;
    loop {
        let field = protocol.read_field_begin()?;
        if field.is_stop() {
            break;
        }
        if !on_field(&mut *protocol, &field)? {
            skip(protocol, field.ttype)?;
        }
        protocol.read_field_end()?;
    }
    protocol.read_struct_end()
}

fn expect_element_type(
    container: &str,
    expected: TType,
    received: TType,
    size: usize,
) -> Result<(), ProtocolError> {
    // Empty containers carry no elements to misread, whatever their header says.
    if size > 0 && expected != received {
        return Err(ProtocolError::InvalidData(format!(
            "{container} element type {received:?} does not match expected {expected:?}"
        )));
    }
    Ok(())
}

// ── Scalars ───────────────────────────────────────────────────────────────────

macro_rules! scalar_wire_value {
    ($ty:ty, $tag:expr, $write:ident, $read:ident) => {
        impl WireValue for $ty {
            const TTYPE: TType = $tag;

            fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
                protocol.$write(*self)
            }

            fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
                protocol.$read()
            }
        }
    };
}

scalar_wire_value!(bool, TType::Bool, write_bool, read_bool);
scalar_wire_value!(i8, TType::Byte, write_byte, read_byte);
scalar_wire_value!(i16, TType::I16, write_i16, read_i16);
scalar_wire_value!(i32, TType::I32, write_i32, read_i32);
scalar_wire_value!(i64, TType::I64, write_i64, read_i64);
scalar_wire_value!(f64, TType::Double, write_double, read_double);

impl WireValue for String {
    const TTYPE: TType = TType::String;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        protocol.write_string(self)
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        protocol.read_string()
    }
}

// ── Containers ────────────────────────────────────────────────────────────────

impl<T: WireValue> WireValue for Vec<T> {
    const TTYPE: TType = TType::List;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        protocol.write_list_begin(&ListHeader {
            element_type: T::TTYPE,
            size: self.len(),
        })?;
        for item in self {
            item.write_value(protocol)?;
        }
        protocol.write_list_end()
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let header = protocol.read_list_begin()?;
        expect_element_type("list", T::TTYPE, header.element_type, header.size)?;
        let mut items = Vec::with_capacity(header.size.min(MAX_PREALLOCATION));
        for _ in 0..header.size {
            items.push(T::read_value(protocol)?);
        }
        protocol.read_list_end()?;
        Ok(items)
    }
}

impl<T: WireValue + Ord> WireValue for BTreeSet<T> {
    const TTYPE: TType = TType::Set;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        protocol.write_set_begin(&SetHeader {
            element_type: T::TTYPE,
            size: self.len(),
        })?;
        for item in self {
            item.write_value(protocol)?;
        }
        protocol.write_set_end()
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let header = protocol.read_set_begin()?;
        expect_element_type("set", T::TTYPE, header.element_type, header.size)?;
        let mut items = BTreeSet::new();
        for _ in 0..header.size {
            items.insert(T::read_value(protocol)?);
        }
        protocol.read_set_end()?;
        Ok(items)
    }
}

impl<K: WireValue + Ord, V: WireValue> WireValue for BTreeMap<K, V> {
    const TTYPE: TType = TType::Map;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        protocol.write_map_begin(&MapHeader {
            key_type: K::TTYPE,
            value_type: V::TTYPE,
            size: self.len(),
        })?;
        for (key, value) in self {
            key.write_value(protocol)?;
            value.write_value(protocol)?;
        }
        protocol.write_map_end()
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let header = protocol.read_map_begin()?;
        expect_element_type("map key", K::TTYPE, header.key_type, header.size)?;
        expect_element_type("map value", V::TTYPE, header.value_type, header.size)?;
        let mut entries = BTreeMap::new();
        for _ in 0..header.size {
            let key = K::read_value(protocol)?;
            let value = V::read_value(protocol)?;
            entries.insert(key, value);
        }
        protocol.read_map_end()?;
        Ok(entries)
    }
}
