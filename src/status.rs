//! Status codes and operation results
//!
//! Every facade operation classifies its outcome into one of four
//! [`Status`] values and hands back an [`OpResult`].

use std::fmt;

use serde_json::Value;

/// Outcome of a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation completed, value valid if applicable
    Success,

    /// Key absent, malformed stored data, or an engine-level error
    Failure,

    /// Write exceeded the engine's capacity
    Overflow,

    /// Key found but its envelope had expired
    Timeout,
}

impl Status {
    /// Label used when a status is printed or compared as text
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failure => "ERROR",
            Status::Overflow => "OVERFLOW",
            Status::Timeout => "TIMEOUT",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result object returned from every facade operation
#[derive(Debug, Clone, PartialEq)]
pub struct OpResult<T = Value> {
    pub status: Status,

    /// Payload on success, `None` otherwise
    pub value: Option<T>,

    /// Text of the error that produced a non-success status, if any
    pub detail: Option<String>,
}

impl<T> OpResult<T> {
    pub fn new(status: Status, value: Option<T>) -> Self {
        Self {
            status,
            value,
            detail: None,
        }
    }

    /// Attach diagnostic text without touching the status
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Callback receiving the status and value of a read-style operation
pub type Callback<'a, T = Value> = &'a mut dyn FnMut(Status, Option<&T>);

/// Notify `callback` (if any) and then return the result object.
///
/// The callback sees exactly the status and value the caller gets back.
pub fn build_result<T>(status: Status, value: Option<T>, callback: Option<Callback<'_, T>>) -> OpResult<T> {
    if let Some(callback) = callback {
        callback(status, value.as_ref());
    }
    OpResult::new(status, value)
}
