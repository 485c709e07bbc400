//! Binary protocol: fixed-width, big-endian, self-describing.
//!
//! Wire format:
//! ```text
//! message (strict):  [0x8001_0000 | kind : 4][name_len:4][name][seq_id:4] <struct>
//! message (legacy):  [name_len:4][name][kind:1][seq_id:4] <struct>
//! struct:            <field>* [stop:1]
//! field:             [type:1][id:2] <value>
//! list / set:        [elem_type:1][count:4] <value>*
//! map:               [key_type:1][value_type:1][count:4] (<key><value>)*
//! bool / byte:       1 byte
//! i16 / i32 / i64:   2 / 4 / 8 bytes, two's complement
//! double:            8 bytes, IEEE-754
//! string / binary:   [len:4][bytes]
//! ```
//! All multi-byte integers are big-endian.  Struct begin/end and field end
//! produce no bytes; a struct's extent is implied by its stop byte.

use crate::protocol::wire::{
    FieldHeader, ListHeader, MapHeader, MessageHeader, MessageKind, SetHeader, TType, KIND_MASK,
    VERSION_1, VERSION_MASK,
};
use crate::protocol::{Protocol, ProtocolError};
use crate::transport::{CloseHandle, Transport};

/// Largest slice of a string or binary value read from the transport at once.
const READ_CHUNK: usize = 64 * 1024;

/// Tunables for [`BinaryProtocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryProtocolConfig {
    /// Reject message headers that lack the version word.
    pub strict_read: bool,
    /// Write the versioned message header (as opposed to the legacy form).
    pub strict_write: bool,
    /// Longest string or binary accepted on read; `None` means unlimited.
    pub string_length_limit: Option<usize>,
    /// Largest container element count accepted on read; `None` means unlimited.
    pub container_length_limit: Option<usize>,
}

impl Default for BinaryProtocolConfig {
    /// Writes strict headers and accepts both header forms, with no limits.
    fn default() -> Self {
        Self {
            strict_read: false,
            strict_write: true,
            string_length_limit: None,
            container_length_limit: None,
        }
    }
}

/// The binary [`Protocol`] over a [`Transport`].
#[derive(Debug)]
pub struct BinaryProtocol<T> {
    transport: T,
    config: BinaryProtocolConfig,
}

impl<T: Transport> BinaryProtocol<T> {
    /// Wraps `transport` with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, BinaryProtocolConfig::default())
    }

    /// Wraps `transport` with an explicit configuration.
    pub fn with_config(transport: T, config: BinaryProtocolConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &BinaryProtocolConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // ── Utility helpers ───────────────────────────────────────────────────────

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut buf = [0u8; N];
        self.transport.read(&mut buf)?;
        Ok(buf)
    }

    fn read_ttype(&mut self) -> Result<TType, ProtocolError> {
        let [tag] = self.read_array::<1>()?;
        TType::try_from(tag).map_err(|_| ProtocolError::UnknownType(tag))
    }

    fn read_kind(&mut self, byte: u8) -> Result<MessageKind, ProtocolError> {
        MessageKind::try_from(byte).map_err(|_| ProtocolError::UnknownMessageKind(byte))
    }

    fn read_container_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.read_i32()?;
        check_length("container", len, self.config.container_length_limit)
    }

    /// Reads `len` bytes in chunks, so memory grows with the bytes that
    /// actually arrive rather than with the length claimed on the wire.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        while buf.len() < len {
            let start = buf.len();
            let end = start + (len - start).min(READ_CHUNK);
            buf.resize(end, 0);
            self.transport.read(&mut buf[start..end])?;
        }
        Ok(buf)
    }

    fn write_length(&mut self, what: &'static str, len: usize) -> Result<(), ProtocolError> {
        let len = i32::try_from(len).map_err(|_| ProtocolError::SizeLimit {
            what,
            len,
            limit: i32::MAX as usize,
        })?;
        self.write_i32(len)
    }

    fn write_ttype(&mut self, ttype: TType) -> Result<(), ProtocolError> {
        self.transport.write(&[ttype as u8])?;
        Ok(())
    }
}

/// Validates a decoded length against sign and the optional limit.
fn check_length(what: &'static str, len: i32, limit: Option<usize>) -> Result<usize, ProtocolError> {
    if len < 0 {
        return Err(ProtocolError::NegativeSize { what, len });
    }
    let len = len as usize;
    match limit {
        Some(limit) if len > limit => Err(ProtocolError::SizeLimit { what, len, limit }),
        _ => Ok(len),
    }
}

impl<T: Transport> Protocol for BinaryProtocol<T> {
    // ── Writing ───────────────────────────────────────────────────────────────

    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        if self.config.strict_write {
            let word = VERSION_1 | header.kind as u32;
            self.write_i32(word as i32)?;
            self.write_string(&header.name)?;
        } else {
            self.write_string(&header.name)?;
            self.write_byte(header.kind as i8)?;
        }
        self.write_i32(header.seq_id)
    }

    fn write_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_begin(&mut self, header: &FieldHeader) -> Result<(), ProtocolError> {
        if header.is_stop() {
            return Err(ProtocolError::InvalidData(
                "stop is a terminator, not a field type".into(),
            ));
        }
        self.write_ttype(header.ttype)?;
        self.write_i16(header.id)
    }

    fn write_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.write_ttype(TType::Stop)
    }

    fn write_list_begin(&mut self, header: &ListHeader) -> Result<(), ProtocolError> {
        self.write_ttype(header.element_type)?;
        self.write_length("container", header.size)
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError> {
        self.write_ttype(header.element_type)?;
        self.write_length("container", header.size)
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError> {
        self.write_ttype(header.key_type)?;
        self.write_ttype(header.value_type)?;
        self.write_length("container", header.size)
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.write_byte(if value { 0x01 } else { 0x00 })
    }

    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.transport.write(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.transport.write(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.transport.write(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.transport.write(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.transport.write(&value.to_bits().to_be_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        self.write_length("string", value.len())?;
        self.transport.write(value)?;
        Ok(())
    }

    // ── Reading ───────────────────────────────────────────────────────────────

    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        let first = self.read_i32()?;
        if first < 0 {
            let word = first as u32;
            let version = word & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProtocolError::BadVersion(version));
            }
            let kind = self.read_kind((word & KIND_MASK) as u8)?;
            let name = self.read_string()?;
            let seq_id = self.read_i32()?;
            return Ok(MessageHeader { name, kind, seq_id });
        }

        if self.config.strict_read {
            return Err(ProtocolError::MissingVersion);
        }
        // Legacy form: the first word was the method name length.
        let len = check_length("string", first, self.config.string_length_limit)?;
        let name = String::from_utf8(self.read_bytes(len)?)?;
        let kind_byte = self.read_byte()? as u8;
        let kind = self.read_kind(kind_byte)?;
        let seq_id = self.read_i32()?;
        Ok(MessageHeader { name, kind, seq_id })
    }

    fn read_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError> {
        let ttype = self.read_ttype()?;
        if ttype == TType::Stop {
            return Ok(FieldHeader::stop());
        }
        let id = self.read_i16()?;
        Ok(FieldHeader::new("", ttype, id))
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        let element_type = self.read_ttype()?;
        let size = self.read_container_len()?;
        Ok(ListHeader { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError> {
        let element_type = self.read_ttype()?;
        let size = self.read_container_len()?;
        Ok(SetHeader { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError> {
        let key_type = self.read_ttype()?;
        let value_type = self.read_ttype()?;
        let size = self.read_container_len()?;
        Ok(MapHeader {
            key_type,
            value_type,
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_byte()? == 1)
    }

    fn read_byte(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.read_binary()?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_i32()?;
        let len = check_length("string", len, self.config.string_length_limit)?;
        self.read_bytes(len)
    }

    // ── Transport control ─────────────────────────────────────────────────────

    fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        self.transport.close();
    }

    fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    fn close_handle(&self) -> CloseHandle {
        self.transport.close_handle()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
