//! The application exception a peer sends in place of a normal reply.

use std::fmt;

use crate::protocol::{Protocol, ProtocolError, TType};
use crate::schema::{read_struct, write_field, write_optional_field, write_struct, Decode, Encode, WireValue};

/// Why the peer failed a call.
///
/// Codes the peer sends that are not listed here are preserved in
/// [`ApplicationExceptionKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationExceptionKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    /// A reply carried no result for a method that returns one.
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
    Other(i32),
}

impl ApplicationExceptionKind {
    /// The numeric code carried in field 2.
    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::UnknownMethod => 1,
            Self::InvalidMessageType => 2,
            Self::WrongMethodName => 3,
            Self::BadSequenceId => 4,
            Self::MissingResult => 5,
            Self::InternalError => 6,
            Self::ProtocolError => 7,
            Self::InvalidTransform => 8,
            Self::InvalidProtocol => 9,
            Self::UnsupportedClientType => 10,
            Self::Other(code) => code,
        }
    }
}

impl From<i32> for ApplicationExceptionKind {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            8 => Self::InvalidTransform,
            9 => Self::InvalidProtocol,
            10 => Self::UnsupportedClientType,
            other => Self::Other(other),
        }
    }
}

/// Wire struct `{ 1: string message, 2: i32 type }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: Option<String>,
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "application exception ({:?}): {message}", self.kind),
            None => write!(f, "application exception ({:?})", self.kind),
        }
    }
}

impl std::error::Error for ApplicationException {}

impl Encode for ApplicationException {
    fn write(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "TApplicationException", |p| {
            write_optional_field(p, "message", 1, self.message.as_ref())?;
            write_field(p, "type", 2, &self.kind.code())
        })
    }
}

impl Decode for ApplicationException {
    fn read(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        let mut message = None;
        let mut kind = ApplicationExceptionKind::Unknown;
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (1, TType::String) => message = Some(p.read_string()?),
                (2, TType::I32) => kind = ApplicationExceptionKind::from(p.read_i32()?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(Self { kind, message })
    }
}

impl WireValue for ApplicationException {
    const TTYPE: TType = TType::Struct;

    fn write_value(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        self.write(protocol)
    }

    fn read_value(protocol: &mut dyn Protocol) -> Result<Self, ProtocolError> {
        Self::read(protocol)
    }
}
