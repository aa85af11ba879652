//! Typed error classification for the request pipeline.
//!
//! Validation, lookup, and bridge failures raised deep in the pipeline
//! need to surface as different HTTP status codes. [`Fault`] carries the
//! classification through `anyhow`, so the server recovers it with
//! `downcast_ref` instead of inspecting message text.

use std::fmt;

/// How a [`Fault`] should be reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The caller's input was rejected.
    BadRequest,
    /// A referenced entity does not exist.
    NotFound,
    /// The contract-wrapper service failed or refused the call.
    Bridge,
}

/// A classified pipeline error.
///
/// Construct through the helpers, which return `anyhow::Error` directly
/// so call sites read like `bail!`:
///
/// ```rust
/// # use causeway::fault::Fault;
/// fn check(amount: u64) -> anyhow::Result<()> {
///     if amount == 0 {
///         return Err(Fault::bad_request("amount must be greater than 0"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Fault {
    kind: FaultKind,
    message: String,
}

impl Fault {
    pub fn bad_request(message: impl Into<String>) -> anyhow::Error {
        Self::build(FaultKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> anyhow::Error {
        Self::build(FaultKind::NotFound, message)
    }

    pub fn bridge(message: impl Into<String>) -> anyhow::Error {
        Self::build(FaultKind::Bridge, message)
    }

    fn build(kind: FaultKind, message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Fault {
            kind,
            message: message.into(),
        })
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_downcast_recovers_kind() {
        let err = Fault::not_found("user not found: u1");
        let fault = err.downcast_ref::<Fault>().unwrap();
        assert_eq!(fault.kind(), FaultKind::NotFound);
        assert_eq!(err.to_string(), "user not found: u1");
    }

    #[test]
    fn test_downcast_through_context() {
        let err = Fault::bridge("Bridge call /split failed").context("while disbursing");
        let fault = err.downcast_ref::<Fault>().unwrap();
        assert_eq!(fault.kind(), FaultKind::Bridge);
    }
}
