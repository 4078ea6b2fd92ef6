//! Optional observability helpers for token resolution and request authorization.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `token_warden.op` with the `op` and `stage`
//!   (call site) fields, and to log swallowed observer failures.
//!   Without it every helper is a no-op, including the composite handler's default reporter;
//!   supply a reporter to surface messages elsewhere.
//! - Enable `metrics` to increment the `token_warden_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
	/// Token lookup through the getter.
	Resolve,
	/// Forced token refresh.
	Refresh,
	/// Outgoing request authorization.
	Authorize,
	/// One-shot replay after a 401.
	Retry,
	/// Error escalation through the composite handler.
	Escalate,
}
impl Op {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Op::Resolve => "resolve",
			Op::Refresh => "refresh",
			Op::Authorize => "authorize",
			Op::Retry => "retry",
			Op::Escalate => "escalate",
		}
	}
}
impl Display for Op {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
