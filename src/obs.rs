//! Observability helpers for session flows.
//!
//! Every flow runs inside a `master_session.flow` span carrying `flow` and `stage` fields.
//! Enable the `metrics` feature to increment the `master_session_flow_total` counter for every
//! attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Credential login.
	Login,
	/// Logout and local token teardown.
	Logout,
	/// Access-token refresh.
	Refresh,
	/// Application-entry session restore.
	Bootstrap,
	/// Encrypted refresh-token backup.
	Vault,
	/// Push subscription forwarding.
	Push,
}
impl FlowKind {
	/// Every flow the crate records.
	pub const ALL: [FlowKind; 6] = [
		FlowKind::Login,
		FlowKind::Logout,
		FlowKind::Refresh,
		FlowKind::Bootstrap,
		FlowKind::Vault,
		FlowKind::Push,
	];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Logout => "logout",
			FlowKind::Refresh => "refresh",
			FlowKind::Bootstrap => "bootstrap",
			FlowKind::Vault => "vault",
			FlowKind::Push => "push",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Every outcome a flow can record.
	pub const ALL: [FlowOutcome; 3] =
		[FlowOutcome::Attempt, FlowOutcome::Success, FlowOutcome::Failure];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
