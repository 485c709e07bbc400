//! One call type per conformance-service method.
//!
//! Arguments structs are named `<method>_args` and result structs carry the
//! return value in field 0 and declared exceptions from field 1 up.

use std::collections::BTreeMap;

use rpcwire_core::{
    read_struct, write_field, write_struct, ApplicationException, ApplicationExceptionKind,
    Decode, Protocol, ProtocolError, TType, WireValue,
};

use super::types::{Insanity, Xception, Xception2, Xtruct};
use crate::domain::{ClientError, MethodCall, ReplyingCall};

/// Reads a result struct whose only known field is the return value.
fn read_success<T: WireValue>(protocol: &mut dyn Protocol, method: &str) -> Result<T, ClientError> {
    let mut success = None;
    read_struct(protocol, |p, field| {
        if field.id == 0 && field.ttype == T::TTYPE {
            success = Some(T::read_value(p)?);
            return Ok(true);
        }
        Ok(false)
    })?;
    success.ok_or_else(|| missing_result(method))
}

fn missing_result(method: &str) -> ClientError {
    ApplicationException::new(
        ApplicationExceptionKind::MissingResult,
        format!("{method} failed: unknown result"),
    )
    .into()
}

// ── Single-argument echo methods ──────────────────────────────────────────────

/// A method that takes one argument, `thing` (field 1), and returns a value
/// of the same type.
///
/// Covers `testString`, `testByte`, `testI32`, `testI64`, `testDouble`,
/// `testStruct`, `testNest`, `testMap`, `testSet`, `testList`.
#[derive(Debug, Clone)]
pub struct EchoCall<T> {
    method: &'static str,
    thing: T,
}

impl<T> EchoCall<T> {
    pub fn new(method: &'static str, thing: T) -> Self {
        Self { method, thing }
    }
}

impl<T: WireValue + Send + 'static> MethodCall for EchoCall<T> {
    fn name(&self) -> &str {
        self.method
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        let args = format!("{}_args", self.method);
        write_struct(protocol, &args, |p| write_field(p, "thing", 1, &self.thing))
    }
}

impl<T: WireValue + Send + 'static> ReplyingCall for EchoCall<T> {
    type Output = T;

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<T, ClientError> {
        read_success(protocol, self.method)
    }
}

// ── testVoid ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TestVoidCall;

impl MethodCall for TestVoidCall {
    fn name(&self) -> &str {
        "testVoid"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testVoid_args", |_| Ok(()))
    }
}

impl ReplyingCall for TestVoidCall {
    type Output = ();

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<(), ClientError> {
        // A void result struct is empty; anything in it is skipped.
        read_struct(protocol, |_, _| Ok(false))?;
        Ok(())
    }
}

// ── testException ─────────────────────────────────────────────────────────────

/// `void testException(1: string arg) throws (1: Xception err1)`.
///
/// A conforming peer throws `Xception` for `"Xception"`, an application
/// exception for `"TException"`, and returns normally otherwise.
#[derive(Debug, Clone)]
pub struct TestExceptionCall {
    pub arg: String,
}

impl MethodCall for TestExceptionCall {
    fn name(&self) -> &str {
        "testException"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testException_args", |p| {
            write_field(p, "arg", 1, &self.arg)
        })
    }
}

impl ReplyingCall for TestExceptionCall {
    type Output = ();

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<(), ClientError> {
        let mut err1 = None;
        read_struct(protocol, |p, field| {
            if (field.id, field.ttype) == (1, TType::Struct) {
                err1 = Some(Xception::read(p)?);
                return Ok(true);
            }
            Ok(false)
        })?;
        match err1 {
            Some(err) => Err(ClientError::Service(Box::new(err))),
            None => Ok(()),
        }
    }
}

// ── testMultiException ────────────────────────────────────────────────────────

/// `Xtruct testMultiException(1: string arg0, 2: string arg1)
/// throws (1: Xception err1, 2: Xception2 err2)`.
#[derive(Debug, Clone)]
pub struct TestMultiExceptionCall {
    pub arg0: String,
    pub arg1: String,
}

impl MethodCall for TestMultiExceptionCall {
    fn name(&self) -> &str {
        "testMultiException"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testMultiException_args", |p| {
            write_field(p, "arg0", 1, &self.arg0)?;
            write_field(p, "arg1", 2, &self.arg1)
        })
    }
}

impl ReplyingCall for TestMultiExceptionCall {
    type Output = Xtruct;

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<Xtruct, ClientError> {
        let mut success = None;
        let mut err1 = None;
        let mut err2 = None;
        read_struct(protocol, |p, field| {
            match (field.id, field.ttype) {
                (0, TType::Struct) => success = Some(Xtruct::read(p)?),
                (1, TType::Struct) => err1 = Some(Xception::read(p)?),
                (2, TType::Struct) => err2 = Some(Xception2::read(p)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        if let Some(err) = err1 {
            return Err(ClientError::Service(Box::new(err)));
        }
        if let Some(err) = err2 {
            return Err(ClientError::Service(Box::new(err)));
        }
        success.ok_or_else(|| missing_result(self.name()))
    }
}

// ── testMulti ─────────────────────────────────────────────────────────────────

/// `Xtruct testMulti(1: byte arg0, 2: i32 arg1, 3: i64 arg2,
/// 4: map<i16, string> arg3, 5: Numberz arg4, 6: UserId arg5)`.
#[derive(Debug, Clone, Default)]
pub struct TestMultiCall {
    pub arg0: i8,
    pub arg1: i32,
    pub arg2: i64,
    pub arg3: BTreeMap<i16, String>,
    pub arg4: i32,
    pub arg5: i64,
}

impl MethodCall for TestMultiCall {
    fn name(&self) -> &str {
        "testMulti"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testMulti_args", |p| {
            write_field(p, "arg0", 1, &self.arg0)?;
            write_field(p, "arg1", 2, &self.arg1)?;
            write_field(p, "arg2", 3, &self.arg2)?;
            write_field(p, "arg3", 4, &self.arg3)?;
            write_field(p, "arg4", 5, &self.arg4)?;
            write_field(p, "arg5", 6, &self.arg5)
        })
    }
}

impl ReplyingCall for TestMultiCall {
    type Output = Xtruct;

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<Xtruct, ClientError> {
        read_success(protocol, self.name())
    }
}

// ── testInsanity ──────────────────────────────────────────────────────────────

/// `map<UserId, map<Numberz, Insanity>> testInsanity(1: Insanity argument)`.
#[derive(Debug, Clone, Default)]
pub struct TestInsanityCall {
    pub argument: Insanity,
}

impl MethodCall for TestInsanityCall {
    fn name(&self) -> &str {
        "testInsanity"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testInsanity_args", |p| {
            write_field(p, "argument", 1, &self.argument)
        })
    }
}

impl ReplyingCall for TestInsanityCall {
    type Output = BTreeMap<i64, BTreeMap<i32, Insanity>>;

    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<Self::Output, ClientError> {
        read_success(protocol, self.name())
    }
}

// ── testOneway ────────────────────────────────────────────────────────────────

/// `oneway void testOneway(1: i32 secondsToSleep)`.
#[derive(Debug, Clone, Copy)]
pub struct TestOnewayCall {
    pub seconds_to_sleep: i32,
}

impl MethodCall for TestOnewayCall {
    fn name(&self) -> &str {
        "testOneway"
    }

    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
        write_struct(protocol, "testOneway_args", |p| {
            write_field(p, "secondsToSleep", 1, &self.seconds_to_sleep)
        })
    }
}
