//! Schema-less representation of any wire value.
//!
//! [`Value`] mirrors the wire type system one-to-one, so any bytes the binary
//! protocol accepts can be decoded into a `Value` and re-encoded to the same
//! bytes.  Echo peers and tests use it to inspect traffic without generated
//! types.

use crate::protocol::wire::MAX_SKIP_DEPTH;
use crate::protocol::{
    FieldHeader, ListHeader, MapHeader, Protocol, ProtocolError, SetHeader, TType,
};
use crate::schema::{read_struct, Decode, Encode, WireValue};

/// A decoded value of any wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    /// Strings and binary share one wire type; the bytes are kept as-is.
    Binary(Vec<u8>),
    Struct(StructValue),
    Map {
        key_type: TType,
        value_type: TType,
        entries: Vec<(Value, Value)>,
    },
    Set {
        element_type: TType,
        items: Vec<Value>,
    },
    List {
        element_type: TType,
        items: Vec<Value>,
    },
}

impl Value {
    /// A string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Binary(s.into().into_bytes())
    }

    /// The wire type tag of this value.
    pub fn ttype(&self) -> TType {
        match self {
            Value::Bool(_) => TType::Bool,
            Value::Byte(_) => TType::Byte,
            Value::I16(_) => TType::I16,
            Value::I32(_) => TType::I32,
            Value::I64(_) => TType::I64,
            Value::Double(_) => TType::Double,
            Value::Binary(_) => TType::String,
            Value::Struct(_) => TType::Struct,
            Value::Map { .. } => TType::Map,
            Value::Set { .. } => TType::Set,
            Value::List { .. } => TType::List,
        }
    }

    /// The bytes of a string/binary value as UTF-8, if they are valid.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Writes the value body (no field header).
    pub fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        match self {
            Value::Bool(v) => protocol.write_bool(*v),
            Value::Byte(v) => protocol.write_byte(*v),
            Value::I16(v) => protocol.write_i16(*v),
            Value::I32(v) => protocol.write_i32(*v),
            Value::I64(v) => protocol.write_i64(*v),
            Value::Double(v) => protocol.write_double(*v),
            Value::Binary(v) => protocol.write_binary(v),
            Value::Struct(s) => s.write(protocol),
            Value::Map {
                key_type,
                value_type,
                entries,
            } => {
                protocol.write_map_begin(&MapHeader {
                    key_type: *key_type,
                    value_type: *value_type,
                    size: entries.len(),
                })?;
                for (key, value) in entries {
                    check_element("map key", *key_type, key)?;
                    check_element("map value", *value_type, value)?;
                    key.write(protocol)?;
                    value.write(protocol)?;
                }
                protocol.write_map_end()
            }
            Value::Set {
                element_type,
                items,
            } => {
                protocol.write_set_begin(&SetHeader {
                    element_type: *element_type,
                    size: items.len(),
                })?;
                write_items("set", *element_type, items, protocol)?;
                protocol.write_set_end()
            }
            Value::List {
                element_type,
                items,
            } => {
                protocol.write_list_begin(&ListHeader {
                    element_type: *element_type,
                    size: items.len(),
                })?;
                write_items("list", *element_type, items, protocol)?;
                protocol.write_list_end()
            }
        }
    }

    /// Reads one value of type `ttype`.
    pub fn read(protocol: &mut dyn Protocol, ttype: TType) -> Result<Value, ProtocolError> {
        read_at_depth(protocol, ttype, MAX_SKIP_DEPTH)
    }
}

fn check_element(what: &str, declared: TType, value: &Value) -> Result<(), ProtocolError> {
    if value.ttype() != declared {
        return Err(ProtocolError::InvalidData(format!(
            "{what} of type {:?} in container declared as {declared:?}",
            value.ttype()
        )));
    }
    Ok(())
}

fn write_items(
    what: &str,
    element_type: TType,
    items: &[Value],
    protocol: &mut dyn Protocol,
) -> Result<(), ProtocolError> {
    for item in items {
        check_element(what, element_type, item)?;
        item.write(protocol)?;
    }
    Ok(())
}

fn read_items(
    protocol: &mut dyn Protocol,
    element_type: TType,
    size: usize,
    depth: usize,
) -> Result<Vec<Value>, ProtocolError> {
    (0..size)
        .map(|_| read_at_depth(protocol, element_type, depth))
        .collect()
}

fn read_at_depth(
    protocol: &mut dyn Protocol,
    ttype: TType,
    depth: usize,
) -> Result<Value, ProtocolError> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
    }
    let value = match ttype {
        TType::Bool => Value::Bool(protocol.read_bool()?),
        TType::Byte => Value::Byte(protocol.read_byte()?),
        TType::I16 => Value::I16(protocol.read_i16()?),
        TType::I32 => Value::I32(protocol.read_i32()?),
        TType::I64 => Value::I64(protocol.read_i64()?),
        TType::Double => Value::Double(protocol.read_double()?),
        TType::String => Value::Binary(protocol.read_binary()?),
        TType::Struct => Value::Struct(StructValue::read_at_depth(protocol, depth)?),
        TType::Map => {
            let header = protocol.read_map_begin()?;
            let mut entries = Vec::new();
            for _ in 0..header.size {
                let key = read_at_depth(protocol, header.key_type, depth - 1)?;
                let value = read_at_depth(protocol, header.value_type, depth - 1)?;
                entries.push((key, value));
            }
            protocol.read_map_end()?;
            Value::Map {
                key_type: header.key_type,
                value_type: header.value_type,
                entries,
            }
        }
        TType::Set => {
            let header = protocol.read_set_begin()?;
            let items = read_items(protocol, header.element_type, header.size, depth - 1)?;
            protocol.read_set_end()?;
            Value::Set {
                element_type: header.element_type,
                items,
            }
        }
        TType::List => {
            let header = protocol.read_list_begin()?;
            let items = read_items(protocol, header.element_type, header.size, depth - 1)?;
            protocol.read_list_end()?;
            Value::List {
                element_type: header.element_type,
                items,
            }
        }
        TType::Stop | TType::Void => {
            return Err(ProtocolError::InvalidData(format!(
                "no value has wire type {ttype:?}"
            )))
        }
    };
    Ok(value)
}

// ── StructValue ───────────────────────────────────────────────────────────────

/// A struct as an ordered list of `(field id, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructValue {
    pub fields: Vec<(i16, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field and returns `self`, for building values inline.
    pub fn with(mut self, id: i16, value: Value) -> Self {
        self.fields.push((id, value));
        self
    }

    /// The first field with `id`, if any.
    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field_id, _)| *field_id == id)
            .map(|(_, value)| value)
    }

    fn read_at_depth(protocol: &mut dyn Protocol, depth: usize) -> Result<Self, ProtocolError> {
        let mut fields = Vec::new();
        read_struct(protocol, |p, field| {
            fields.push((field.id, read_at_depth(p, field.ttype, depth - 1)?));
            Ok(true)
        })?;
        Ok(StructValue { fields })
    }
}

impl Encode for StructValue {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        protocol.write_struct_begin("")?;
        for (id, value) in &self.fields {
            protocol.write_field_begin(&FieldHeader::new("", value.ttype(), *id))?;
            value.write(protocol)?;
            protocol.write_field_end()?;
        }
        protocol.write_field_stop()?;
        protocol.write_struct_end()
    }
}

impl Decode for StructValue {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        StructValue::read_at_depth(protocol, MAX_SKIP_DEPTH)
    }
}

impl WireValue for StructValue {
    const TTYPE: TType = TType::Struct;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        self.write(protocol)
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        Self::read(protocol)
    }
}
