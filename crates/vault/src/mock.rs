//! In-memory [`Transport`] for tests.
//!
//! Canned replies are keyed by exact wire path. Writes to a path without a
//! canned reply are stored, and a later read of that path returns them as
//! `data`, which is enough to exercise write-then-read on both KV layouts.

use crate::error::{Result, VaultError};
use crate::transport::{Transport, VaultResponse};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub op: Op,
    pub path: String,
    pub body: Option<Map<String, Value>>,
    pub token: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
enum Reply {
    Response(Value),
    Error { status: u16, message: String },
}

#[derive(Default)]
pub struct MockTransport {
    reads: HashMap<String, Reply>,
    writes: HashMap<String, Reply>,
    stored: Mutex<HashMap<String, Map<String, Value>>>,
    calls: Mutex<Vec<RecordedCall>>,
    token: RwLock<Option<String>>,
    namespace: RwLock<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_read(mut self, path: &str, response: Value) -> Self {
        self.reads.insert(path.to_string(), Reply::Response(response));
        self
    }

    pub fn on_write(mut self, path: &str, response: Value) -> Self {
        self.writes.insert(path.to_string(), Reply::Response(response));
        self
    }

    pub fn on_read_error(mut self, path: &str, status: u16, message: &str) -> Self {
        self.reads.insert(
            path.to_string(),
            Reply::Error {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn on_write_error(mut self, path: &str, status: u16, message: &str) -> Self {
        self.writes.insert(
            path.to_string(),
            Reply::Error {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `"read <path>"` / `"write <path>"` for every call, in order.
    pub fn paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| match call.op {
                Op::Read => format!("read {}", call.path),
                Op::Write => format!("write {}", call.path),
            })
            .collect()
    }

    pub fn last_write(&self, path: &str) -> Option<Map<String, Value>> {
        self.calls()
            .into_iter()
            .rev()
            .find(|call| call.op == Op::Write && call.path == path)
            .and_then(|call| call.body)
    }

    fn record(&self, op: Op, path: &str, body: Option<&Map<String, Value>>) {
        let call = RecordedCall {
            op,
            path: path.to_string(),
            body: body.cloned(),
            token: self.token(),
            namespace: self.namespace.read().unwrap().clone(),
        };
        self.calls.lock().unwrap().push(call);
    }

    fn answer(path: &str, reply: &Reply) -> Result<Option<VaultResponse>> {
        match reply {
            Reply::Response(Value::Null) => Ok(None),
            Reply::Response(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| VaultError::decode(path, e)),
            Reply::Error { status, message } => Err(VaultError::Server {
                path: path.to_string(),
                status: *status,
                errors: vec![message.clone()],
            }),
        }
    }
}

impl Transport for MockTransport {
    fn read(&self, path: &str) -> Result<Option<VaultResponse>> {
        self.record(Op::Read, path, None);
        if let Some(reply) = self.reads.get(path) {
            return Self::answer(path, reply);
        }
        let stored = self.stored.lock().unwrap().get(path).cloned();
        Ok(stored.map(|data| VaultResponse {
            data: Some(data),
            ..VaultResponse::default()
        }))
    }

    fn write(&self, path: &str, body: &Map<String, Value>) -> Result<Option<VaultResponse>> {
        self.record(Op::Write, path, Some(body));
        if let Some(reply) = self.writes.get(path) {
            return Self::answer(path, reply);
        }
        self.stored
            .lock()
            .unwrap()
            .insert(path.to_string(), body.clone());
        Ok(None)
    }

    fn set_namespace(&self, namespace: Option<&str>) {
        *self.namespace.write().unwrap() = namespace.map(str::to_string);
    }

    fn set_token(&self, token: &str) {
        *self.token.write().unwrap() = Some(token.to_string());
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }
}
