//! Structural skipping of values whose schema is unknown.
//!
//! A decoder that meets a field id it does not recognise calls [`skip`] with
//! the field's wire type.  The type tag alone determines how many bytes and
//! nested elements to consume, which is what lets old readers accept data
//! written by newer schemas.

use tracing::trace;

use crate::protocol::wire::{TType, MAX_SKIP_DEPTH};
use crate::protocol::{Protocol, ProtocolError};

/// Consumes exactly one value of type `ttype` from `protocol`.
///
/// Structs and containers are walked recursively, up to
/// [`MAX_SKIP_DEPTH`] levels.  `Stop` and `Void` never describe a value on
/// the wire and are rejected.
pub fn skip(protocol: &mut dyn Protocol, ttype: TType) -> Result<(), ProtocolError> {
    skip_at_depth(protocol, ttype, MAX_SKIP_DEPTH)
}

fn skip_at_depth(
    protocol: &mut dyn Protocol,
    ttype: TType,
    depth: usize,
) -> Result<(), ProtocolError> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
    }
    trace!(?ttype, "skipping value");

    match ttype {
        TType::Bool => protocol.read_bool().map(drop),
        TType::Byte => protocol.read_byte().map(drop),
        TType::I16 => protocol.read_i16().map(drop),
        TType::I32 => protocol.read_i32().map(drop),
        TType::I64 => protocol.read_i64().map(drop),
        TType::Double => protocol.read_double().map(drop),
        TType::String => protocol.read_binary().map(drop),
        TType::Struct => {
            protocol.read_struct_begin()?;
            loop {
                let field = protocol.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                skip_at_depth(protocol, field.ttype, depth - 1)?;
                protocol.read_field_end()?;
            }
            protocol.read_struct_end()
        }
        TType::Map => {
            let header = protocol.read_map_begin()?;
            for _ in 0..header.size {
                skip_at_depth(protocol, header.key_type, depth - 1)?;
                skip_at_depth(protocol, header.value_type, depth - 1)?;
            }
            protocol.read_map_end()
        }
        TType::Set => {
            let header = protocol.read_set_begin()?;
            for _ in 0..header.size {
                skip_at_depth(protocol, header.element_type, depth - 1)?;
            }
            protocol.read_set_end()
        }
        TType::List => {
            let header = protocol.read_list_begin()?;
            for _ in 0..header.size {
                skip_at_depth(protocol, header.element_type, depth - 1)?;
            }
            protocol.read_list_end()
        }
        TType::Stop | TType::Void => Err(ProtocolError::InvalidData(format!(
            "cannot skip a value of type {ttype:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::{FieldHeader, ListHeader, MapHeader};
    use crate::protocol::BinaryProtocol;
    use crate::transport::{BufferTransport, Transport};

    fn encoded(write: impl FnOnce(&mut dyn Protocol)) -> BinaryProtocol<BufferTransport> {
        let mut writer = BinaryProtocol::new(BufferTransport::new());
        write(&mut writer);
        let bytes = writer.into_transport().into_bytes();
        BinaryProtocol::new(BufferTransport::from_bytes(bytes))
    }

    #[test]
    fn test_skip_consumes_exactly_one_primitive() {
        // Arrange
        let mut p = encoded(|p| {
            p.write_i64(42).unwrap();
            p.write_i32(7).unwrap();
        });

        // Act
        skip(&mut p, TType::I64).unwrap();

        // Assert
        assert_eq!(p.read_i32().unwrap(), 7);
    }

    #[test]
    fn test_skip_consumes_nested_struct_with_containers() {
        // Arrange – struct { 1: list<string>, 2: map<i32, struct { 1: double }> }, then a marker
        let mut p = encoded(|p| {
            p.write_struct_begin("Outer").unwrap();
            p.write_field_begin(&FieldHeader::new("names", TType::List, 1))
                .unwrap();
            p.write_list_begin(&ListHeader {
                element_type: TType::String,
                size: 2,
            })
            .unwrap();
            p.write_string("a").unwrap();
            p.write_string("bc").unwrap();
            p.write_list_end().unwrap();
            p.write_field_end().unwrap();
            p.write_field_begin(&FieldHeader::new("scores", TType::Map, 2))
                .unwrap();
            p.write_map_begin(&MapHeader {
                key_type: TType::I32,
                value_type: TType::Struct,
                size: 1,
            })
            .unwrap();
            p.write_i32(5).unwrap();
            p.write_struct_begin("Inner").unwrap();
            p.write_field_begin(&FieldHeader::new("x", TType::Double, 1))
                .unwrap();
            p.write_double(2.5).unwrap();
            p.write_field_end().unwrap();
            p.write_field_stop().unwrap();
            p.write_struct_end().unwrap();
            p.write_map_end().unwrap();
            p.write_field_end().unwrap();
            p.write_field_stop().unwrap();
            p.write_struct_end().unwrap();
            p.write_i16(0x7777).unwrap();
        });

        // Act
        skip(&mut p, TType::Struct).unwrap();

        // Assert
        assert_eq!(p.read_i16().unwrap(), 0x7777);
        assert_eq!(p.transport().remaining(), 0);
    }

    #[test]
    fn test_skip_rejects_void_and_stop() {
        let mut p = encoded(|_| {});

        assert!(matches!(
            skip(&mut p, TType::Void),
            Err(ProtocolError::InvalidData(_))
        ));
        assert!(matches!(
            skip(&mut p, TType::Stop),
            Err(ProtocolError::InvalidData(_))
        ));
    }

    #[test]
    fn test_skip_fails_on_unknown_tag_inside_struct() {
        // Arrange – a field carrying tag 9, which is not a wire type
        let mut p = BinaryProtocol::new(BufferTransport::from_bytes(vec![0x09, 0x00, 0x01]));

        // Act
        let result = skip(&mut p, TType::Struct);

        // Assert
        assert!(matches!(result, Err(ProtocolError::UnknownType(9))));
    }

    #[test]
    fn test_skip_enforces_depth_limit() {
        // Arrange – 65 nested lists, each holding one list
        let mut bytes = Vec::new();
        for _ in 0..=MAX_SKIP_DEPTH {
            bytes.extend_from_slice(&[TType::List as u8, 0, 0, 0, 1]);
        }
        let mut p = BinaryProtocol::new(BufferTransport::from_bytes(bytes));

        // Act
        let result = skip(&mut p, TType::List);

        // Assert
        assert!(matches!(result, Err(ProtocolError::DepthLimit(64))));
    }

    #[test]
    fn test_skip_accepts_nesting_at_the_limit() {
        // Arrange – 63 lists of one list each, innermost list empty: 64 levels
        let mut bytes = Vec::new();
        for _ in 0..MAX_SKIP_DEPTH - 1 {
            bytes.extend_from_slice(&[TType::List as u8, 0, 0, 0, 1]);
        }
        bytes.extend_from_slice(&[TType::I32 as u8, 0, 0, 0, 0]);
        let mut p = BinaryProtocol::new(BufferTransport::from_bytes(bytes));

        // Act
        let result = skip(&mut p, TType::List);

        // Assert
        assert!(result.is_ok(), "64 levels must be accepted: {result:?}");
        assert_eq!(p.transport().remaining(), 0);
    }

    #[test]
    fn test_skip_surfaces_truncation_as_transport_error() {
        let mut p = BinaryProtocol::new(BufferTransport::from_bytes(vec![0, 0, 0, 10, b'x']));

        let result = skip(&mut p, TType::String);

        assert!(result.unwrap_err().as_transport().is_some());
    }

    #[test]
    fn test_skip_on_closed_transport_fails() {
        let mut p = BinaryProtocol::new(BufferTransport::from_bytes(vec![1]));
        p.transport_mut().close();

        assert!(skip(&mut p, TType::Byte).is_err());
    }
}
