//! Structs of the conformance service, written the way generated code is.
//!
//! Every field is optional on the wire, so every field is an `Option`.

use std::collections::BTreeMap;
use std::fmt;

use rpcwire_core::{
    read_struct, write_optional_field, write_struct, Decode, Encode, Protocol, ProtocolError,
    TType, WireValue,
};

/// Implements [`WireValue`] for a struct that already implements
/// [`Encode`] and [`Decode`].
macro_rules! struct_wire_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl WireValue for $ty {
                const TTYPE: TType = TType::Struct;

                fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
                    self.write(protocol)
                }

                fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
                    <$ty as Decode>::read(protocol)
                }
            }
        )+
    };
}

// ── Xtruct ────────────────────────────────────────────────────────────────────

/// The workhorse struct: one field of each common scalar type, with gaps
/// between the ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xtruct {
    pub string_thing: Option<String>,
    pub byte_thing: Option<i8>,
    pub i32_thing: Option<i32>,
    pub i64_thing: Option<i64>,
}

impl Encode for Xtruct {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "Xtruct", |p| {
            write_optional_field(p, "string_thing", 1, self.string_thing.as_ref())?;
            write_optional_field(p, "byte_thing", 4, self.byte_thing.as_ref())?;
            write_optional_field(p, "i32_thing", 9, self.i32_thing.as_ref())?;
            write_optional_field(p, "i64_thing", 11, self.i64_thing.as_ref())
        })
    }
}

impl Decode for Xtruct {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut out = Xtruct::default();
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::String) => out.string_thing = Some(String::read_value(p)?),
                (4, TType::Byte) => out.byte_thing = Some(i8::read_value(p)?),
                (9, TType::I32) => out.i32_thing = Some(i32::read_value(p)?),
                (11, TType::I64) => out.i64_thing = Some(i64::read_value(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

// ── Xtruct2 ───────────────────────────────────────────────────────────────────

/// An [`Xtruct`] nested between two scalars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xtruct2 {
    pub byte_thing: Option<i8>,
    pub struct_thing: Option<Xtruct>,
    pub i32_thing: Option<i32>,
}

impl Encode for Xtruct2 {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "Xtruct2", |p| {
            write_optional_field(p, "byte_thing", 1, self.byte_thing.as_ref())?;
            write_optional_field(p, "struct_thing", 2, self.struct_thing.as_ref())?;
            write_optional_field(p, "i32_thing", 3, self.i32_thing.as_ref())
        })
    }
}

impl Decode for Xtruct2 {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut out = Xtruct2::default();
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::Byte) => out.byte_thing = Some(i8::read_value(p)?),
                (2, TType::Struct) => out.struct_thing = Some(Xtruct::read(p)?),
                (3, TType::I32) => out.i32_thing = Some(i32::read_value(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

// ── Insanity ──────────────────────────────────────────────────────────────────

/// Containers of structs: a map keyed by enum value and a list of [`Xtruct`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insanity {
    /// `Numberz` enum value → user id.
    pub user_map: Option<BTreeMap<i32, i64>>,
    pub xtructs: Option<Vec<Xtruct>>,
}

impl Encode for Insanity {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "Insanity", |p| {
            write_optional_field(p, "userMap", 1, self.user_map.as_ref())?;
            write_optional_field(p, "xtructs", 2, self.xtructs.as_ref())
        })
    }
}

impl Decode for Insanity {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut out = Insanity::default();
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::Map) => out.user_map = Some(BTreeMap::read_value(p)?),
                (2, TType::List) => out.xtructs = Some(Vec::read_value(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

// ── Declared exceptions ───────────────────────────────────────────────────────

/// Thrown by `testException("Xception")` and `testMultiException`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xception {
    pub error_code: Option<i32>,
    pub message: Option<String>,
}

impl fmt::Display for Xception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Xception (code {}): {}",
            self.error_code.unwrap_or_default(),
            self.message.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for Xception {}

impl Encode for Xception {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "Xception", |p| {
            write_optional_field(p, "errorCode", 1, self.error_code.as_ref())?;
            write_optional_field(p, "message", 2, self.message.as_ref())
        })
    }
}

impl Decode for Xception {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut out = Xception::default();
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::I32) => out.error_code = Some(i32::read_value(p)?),
                (2, TType::String) => out.message = Some(String::read_value(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

/// Thrown by `testMultiException("Xception2", ..)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xception2 {
    pub error_code: Option<i32>,
    pub struct_thing: Option<Xtruct>,
}

impl fmt::Display for Xception2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Xception2 (code {})", self.error_code.unwrap_or_default())
    }
}

impl std::error::Error for Xception2 {}

impl Encode for Xception2 {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "Xception2", |p| {
            write_optional_field(p, "errorCode", 1, self.error_code.as_ref())?;
            write_optional_field(p, "struct_thing", 2, self.struct_thing.as_ref())
        })
    }
}

impl Decode for Xception2 {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut out = Xception2::default();
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::I32) => out.error_code = Some(i32::read_value(p)?),
                (2, TType::Struct) => out.struct_thing = Some(Xtruct::read(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

struct_wire_value!(Xtruct, Xtruct2, Insanity, Xception, Xception2);

#[cfg(test)]
mod tests {
    use super::*;
    use rpcwire_core::{BinaryProtocol, BufferTransport, StructValue, Value};

    fn encode<T: Encode>(value: &T) -> Vec<u8> {
        let mut writer = BinaryProtocol::new(BufferTransport::new());
        value.write(&mut writer).unwrap();
        writer.into_transport().into_bytes()
    }

    fn decode<T: Decode>(bytes: Vec<u8>) -> T {
        let mut reader = BinaryProtocol::new(BufferTransport::from_bytes(bytes));
        T::read(&mut reader).unwrap()
    }

    fn sample_xtruct() -> Xtruct {
        Xtruct {
            string_thing: Some("foo".into()),
            byte_thing: Some(1),
            i32_thing: Some(2),
            i64_thing: Some(3),
        }
    }

    #[test]
    fn test_xtruct_field_ids_on_the_wire() {
        // Arrange
        let xtruct = sample_xtruct();

        // Act
        let value: StructValue = decode(encode(&xtruct));

        // Assert
        assert_eq!(value.get(1), Some(&Value::string("foo")));
        assert_eq!(value.get(4), Some(&Value::Byte(1)));
        assert_eq!(value.get(9), Some(&Value::I32(2)));
        assert_eq!(value.get(11), Some(&Value::I64(3)));
    }

    #[test]
    fn test_nested_xtruct2_round_trips() {
        let nest = Xtruct2 {
            byte_thing: Some(4),
            struct_thing: Some(sample_xtruct()),
            i32_thing: Some(5),
        };

        let decoded: Xtruct2 = decode(encode(&nest));

        assert_eq!(decoded, nest);
    }

    #[test]
    fn test_absent_fields_are_not_written() {
        let xtruct = Xtruct {
            i32_thing: Some(7),
            ..Default::default()
        };

        let bytes = encode(&xtruct);

        // i32 field 9: tag, id, value, then stop
        assert_eq!(bytes, vec![TType::I32 as u8, 0, 9, 0, 0, 0, 7, 0]);
    }

    #[test]
    fn test_insanity_round_trips_with_struct_list() {
        // Arrange
        let insanity = Insanity {
            user_map: Some([(5, 5000i64), (8, 8000)].into_iter().collect()),
            xtructs: Some(vec![sample_xtruct(), Xtruct::default()]),
        };

        // Act
        let decoded: Insanity = decode(encode(&insanity));

        // Assert
        assert_eq!(decoded, insanity);
    }

    #[test]
    fn test_xception_displays_code_and_message() {
        let err = Xception {
            error_code: Some(1001),
            message: Some("Xception".into()),
        };

        assert_eq!(err.to_string(), "Xception (code 1001): Xception");
    }
}
