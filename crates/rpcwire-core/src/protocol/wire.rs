//! Wire-level vocabulary: type tags, message kinds, and the headers that
//! precede messages, fields, and containers.
//!
//! These types carry no encoding logic of their own; see
//! [`crate::protocol::binary`] for how they are laid out in bytes.

// ── Protocol constants ────────────────────────────────────────────────────────

/// Version marker in the high 16 bits of a strict message header.
pub const VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of a strict message header.
pub const VERSION_MASK: u32 = 0xFFFF_0000;

/// Mask selecting the message kind of a strict message header.
pub const KIND_MASK: u32 = 0x0000_00FF;

/// Maximum nesting of structs and containers accepted by `skip`.
pub const MAX_SKIP_DEPTH: usize = 64;

// ── Type tags ─────────────────────────────────────────────────────────────────

/// The 1-byte wire type tag written before every field and container element
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TType {
    /// Terminates a struct's field list.  Never the type of a real value.
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    /// Strings and opaque binary share this tag.
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

impl TryFrom<u8> for TType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(TType::Stop),
            1 => Ok(TType::Void),
            2 => Ok(TType::Bool),
            3 => Ok(TType::Byte),
            4 => Ok(TType::Double),
            6 => Ok(TType::I16),
            8 => Ok(TType::I32),
            10 => Ok(TType::I64),
            11 => Ok(TType::String),
            12 => Ok(TType::Struct),
            13 => Ok(TType::Map),
            14 => Ok(TType::Set),
            15 => Ok(TType::List),
            _ => Err(()),
        }
    }
}

// ── Message kinds ─────────────────────────────────────────────────────────────

/// What a message envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// A request that expects a reply.
    Call = 1,
    /// A normal result for an earlier `Call`.
    Reply = 2,
    /// An application exception sent instead of a `Reply`.
    Exception = 3,
    /// A request that never gets a reply.
    Oneway = 4,
}

impl TryFrom<u8> for MessageKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(MessageKind::Call),
            2 => Ok(MessageKind::Reply),
            3 => Ok(MessageKind::Exception),
            4 => Ok(MessageKind::Oneway),
            _ => Err(()),
        }
    }
}

// ── Headers ───────────────────────────────────────────────────────────────────

/// The envelope preceding every request and reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Name of the remote method.
    pub name: String,
    /// What kind of message follows.
    pub kind: MessageKind,
    /// Correlates a reply with its request.
    pub seq_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, kind: MessageKind, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq_id,
        }
    }
}

/// Precedes each field of a struct.
///
/// The binary encoding does not carry field names; `name` is only filled in
/// on the write side, for protocols that use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHeader {
    pub name: &'static str,
    pub ttype: TType,
    pub id: i16,
}

impl FieldHeader {
    pub fn new(name: &'static str, ttype: TType, id: i16) -> Self {
        Self { name, ttype, id }
    }

    /// The header that ends a struct.
    pub fn stop() -> Self {
        Self::new("", TType::Stop, 0)
    }

    /// Returns `true` if this header terminates the struct.
    pub fn is_stop(&self) -> bool {
        self.ttype == TType::Stop
    }
}

/// Precedes the elements of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHeader {
    pub element_type: TType,
    pub size: usize,
}

/// Precedes the elements of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeader {
    pub element_type: TType,
    pub size: usize,
}

/// Precedes the entries of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub key_type: TType,
    pub value_type: TType,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttype_try_from_accepts_every_defined_tag() {
        for ttype in [
            TType::Stop,
            TType::Void,
            TType::Bool,
            TType::Byte,
            TType::Double,
            TType::I16,
            TType::I32,
            TType::I64,
            TType::String,
            TType::Struct,
            TType::Map,
            TType::Set,
            TType::List,
        ] {
            assert_eq!(TType::try_from(ttype as u8), Ok(ttype));
        }
    }

    #[test]
    fn test_ttype_try_from_rejects_gaps_in_the_tag_space() {
        for tag in [5u8, 7, 9, 16, 0xFF] {
            assert!(TType::try_from(tag).is_err(), "tag {tag} must be rejected");
        }
    }

    #[test]
    fn test_message_kind_round_trips_through_u8() {
        for kind in [
            MessageKind::Call,
            MessageKind::Reply,
            MessageKind::Exception,
            MessageKind::Oneway,
        ] {
            assert_eq!(MessageKind::try_from(kind as u8), Ok(kind));
        }
        assert!(MessageKind::try_from(0).is_err());
        assert!(MessageKind::try_from(5).is_err());
    }

    #[test]
    fn test_stop_header_is_stop() {
        assert!(FieldHeader::stop().is_stop());
        assert!(!FieldHeader::new("x", TType::I32, 1).is_stop());
    }

    #[test]
    fn test_strict_version_word_sets_the_high_bit() {
        // The high bit distinguishes strict headers from legacy name lengths.
        assert!((VERSION_1 as i32) < 0);
        assert_eq!(VERSION_1 & VERSION_MASK, VERSION_1);
    }
}
