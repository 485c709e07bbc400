//! The service client: one async method per remote method.

use std::collections::{BTreeMap, BTreeSet};

use super::calls::{
    EchoCall, TestExceptionCall, TestInsanityCall, TestMultiCall, TestMultiExceptionCall,
    TestOnewayCall, TestVoidCall,
};
use super::types::{Insanity, Xtruct, Xtruct2};
use crate::application::ClientBase;
use crate::domain::ClientError;

/// Typed front end over a [`ClientBase`].
///
/// Calls share the base's single connection and are sent one at a time in
/// the order they reach the dispatcher.
#[derive(Debug, Clone)]
pub struct ConformanceClient {
    base: ClientBase,
}

impl ConformanceClient {
    pub fn new(base: ClientBase) -> Self {
        Self { base }
    }

    /// The underlying dispatcher, for `close()` and state queries.
    pub fn base(&self) -> &ClientBase {
        &self.base
    }

    pub fn close(&self) {
        self.base.close();
    }

    pub async fn test_void(&self) -> Result<(), ClientError> {
        self.base.call(TestVoidCall).await
    }

    pub async fn test_string(&self, thing: impl Into<String>) -> Result<String, ClientError> {
        self.base.call(EchoCall::new("testString", thing.into())).await
    }

    pub async fn test_bool(&self, thing: bool) -> Result<bool, ClientError> {
        self.base.call(EchoCall::new("testBool", thing)).await
    }

    pub async fn test_byte(&self, thing: i8) -> Result<i8, ClientError> {
        self.base.call(EchoCall::new("testByte", thing)).await
    }

    pub async fn test_i32(&self, thing: i32) -> Result<i32, ClientError> {
        self.base.call(EchoCall::new("testI32", thing)).await
    }

    pub async fn test_i64(&self, thing: i64) -> Result<i64, ClientError> {
        self.base.call(EchoCall::new("testI64", thing)).await
    }

    pub async fn test_double(&self, thing: f64) -> Result<f64, ClientError> {
        self.base.call(EchoCall::new("testDouble", thing)).await
    }

    pub async fn test_struct(&self, thing: Xtruct) -> Result<Xtruct, ClientError> {
        self.base.call(EchoCall::new("testStruct", thing)).await
    }

    pub async fn test_nest(&self, thing: Xtruct2) -> Result<Xtruct2, ClientError> {
        self.base.call(EchoCall::new("testNest", thing)).await
    }

    pub async fn test_map(
        &self,
        thing: BTreeMap<i32, i32>,
    ) -> Result<BTreeMap<i32, i32>, ClientError> {
        self.base.call(EchoCall::new("testMap", thing)).await
    }

    pub async fn test_string_map(
        &self,
        thing: BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        self.base.call(EchoCall::new("testStringMap", thing)).await
    }

    pub async fn test_set(&self, thing: BTreeSet<i32>) -> Result<BTreeSet<i32>, ClientError> {
        self.base.call(EchoCall::new("testSet", thing)).await
    }

    pub async fn test_list(&self, thing: Vec<i32>) -> Result<Vec<i32>, ClientError> {
        self.base.call(EchoCall::new("testList", thing)).await
    }

    /// Sends a `Numberz` enum value and receives it back.
    pub async fn test_enum(&self, thing: i32) -> Result<i32, ClientError> {
        self.base.call(EchoCall::new("testEnum", thing)).await
    }

    /// Sends a `UserId` and receives it back.
    pub async fn test_typedef(&self, thing: i64) -> Result<i64, ClientError> {
        self.base.call(EchoCall::new("testTypedef", thing)).await
    }

    pub async fn test_insanity(
        &self,
        argument: Insanity,
    ) -> Result<BTreeMap<i64, BTreeMap<i32, Insanity>>, ClientError> {
        self.base.call(TestInsanityCall { argument }).await
    }

    pub async fn test_multi(&self, call: TestMultiCall) -> Result<Xtruct, ClientError> {
        self.base.call(call).await
    }

    /// Fails with `ClientError::Service(Xception)` for `"Xception"` and with
    /// an application exception for `"TException"`.
    pub async fn test_exception(&self, arg: impl Into<String>) -> Result<(), ClientError> {
        self.base.call(TestExceptionCall { arg: arg.into() }).await
    }

    pub async fn test_multi_exception(
        &self,
        arg0: impl Into<String>,
        arg1: impl Into<String>,
    ) -> Result<Xtruct, ClientError> {
        self.base
            .call(TestMultiExceptionCall {
                arg0: arg0.into(),
                arg1: arg1.into(),
            })
            .await
    }

    /// Completes as soon as the request is flushed; the peer never replies.
    pub async fn test_oneway(&self, seconds_to_sleep: i32) -> Result<(), ClientError> {
        self.base.notify(TestOnewayCall { seconds_to_sleep }).await
    }
}
