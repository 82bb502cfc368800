//! Host capability queries used to gate push subscriptions.
//!
//! The session core never looks at user agents; everything environment-specific is answered
//! through [`PlatformCapabilities`].

// self
use crate::_prelude::*;

/// Capability questions the push flow asks about the host environment.
pub trait PlatformCapabilities
where
	Self: Send + Sync,
{
	/// Push notifications can be enabled right now.
	fn supports_push(&self) -> bool;

	/// Push becomes available only after installing the app to the home screen.
	fn requires_install_for_push(&self) -> bool;
}

/// Fixed answers, for hosts that know their capabilities up front and for tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaticCapabilities {
	/// Answer for [`PlatformCapabilities::supports_push`].
	pub push: bool,
	/// Answer for [`PlatformCapabilities::requires_install_for_push`].
	pub install_required: bool,
}
impl StaticCapabilities {
	/// Push available.
	pub const fn push_ready() -> Self {
		Self { push: true, install_required: false }
	}

	/// Push unavailable for good.
	pub const fn no_push() -> Self {
		Self { push: false, install_required: false }
	}
}
impl PlatformCapabilities for StaticCapabilities {
	fn supports_push(&self) -> bool {
		self.push
	}

	fn requires_install_for_push(&self) -> bool {
		self.install_required
	}
}

/// iOS release that introduced web push for home-screen apps.
const IOS_WEB_PUSH_SINCE: (u32, u32) = (16, 4);

/// Capabilities derived from a browser user agent plus a few feature flags reported by the page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserAgentCapabilities {
	user_agent: String,
	standalone: bool,
	service_worker: bool,
	push_manager: bool,
}
impl UserAgentCapabilities {
	/// Creates capabilities for `user_agent` with every browser feature flag off.
	pub fn new(user_agent: impl Into<String>) -> Self {
		Self { user_agent: user_agent.into(), ..Default::default() }
	}

	/// The app runs installed (display-mode standalone).
	pub fn standalone(mut self, standalone: bool) -> Self {
		self.standalone = standalone;

		self
	}

	/// Service workers are available.
	pub fn service_worker(mut self, available: bool) -> Self {
		self.service_worker = available;

		self
	}

	/// The Push API is exposed.
	pub fn push_manager(mut self, available: bool) -> Self {
		self.push_manager = available;

		self
	}

	/// `true` for iPhone, iPad, and iPod user agents.
	pub fn is_ios(&self) -> bool {
		["iPhone", "iPad", "iPod"].iter().any(|device| self.user_agent.contains(device))
	}

	/// iOS `(major, minor)` parsed from the `OS 16_4` user-agent token.
	pub fn ios_version(&self) -> Option<(u32, u32)> {
		if !self.is_ios() {
			return None;
		}

		let rest = &self.user_agent[self.user_agent.find(" OS ")? + 4..];
		let token = rest.split([' ', ';', ')']).next()?;
		let mut parts = token.split('_');
		let major = parts.next()?.parse().ok()?;
		let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);

		Some((major, minor))
	}

	fn ios_supports_web_push(&self) -> bool {
		self.ios_version().is_some_and(|version| version >= IOS_WEB_PUSH_SINCE)
	}
}
impl PlatformCapabilities for UserAgentCapabilities {
	fn supports_push(&self) -> bool {
		if !(self.service_worker && self.push_manager) {
			return false;
		}
		if self.is_ios() {
			return self.standalone && self.ios_supports_web_push();
		}

		true
	}

	fn requires_install_for_push(&self) -> bool {
		self.is_ios() && self.ios_supports_web_push() && !self.standalone
	}
}
