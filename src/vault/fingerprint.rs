//! Non-secret device fingerprint used as key-derivation input.

// std
use std::env;
// self
use crate::_prelude::*;

/// Version tag mixed into every fingerprint; bumping it orphans existing vault records.
pub const FINGERPRINT_VERSION: &str = "master-auth-v1";

/// Environment-derived string the vault key is derived from.
///
/// This is obfuscation against casual inspection, not a secret. A locale or timezone change
/// produces a different fingerprint, so records sealed before the change no longer decrypt
/// and read back as absent.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceFingerprint {
	version: String,
	origin: String,
	locale: String,
	timezone: String,
}
impl DeviceFingerprint {
	const DEFAULT_LOCALE: &'static str = "en-US";
	const DEFAULT_TIMEZONE: &'static str = "UTC";

	/// Builds a fingerprint with the current version tag.
	pub fn new(
		origin: impl Into<String>,
		locale: impl Into<String>,
		timezone: impl Into<String>,
	) -> Self {
		Self {
			version: FINGERPRINT_VERSION.into(),
			origin: origin.into(),
			locale: locale.into(),
			timezone: timezone.into(),
		}
	}

	/// Reads locale (`LC_ALL`, then `LANG`) and timezone (`TZ`) from the process environment.
	pub fn from_env(origin: impl Into<String>) -> Self {
		let locale = ["LC_ALL", "LANG"]
			.into_iter()
			.filter_map(|key| env::var(key).ok())
			.map(|raw| normalize_locale(&raw))
			.find(|value| !value.is_empty())
			.unwrap_or_else(|| Self::DEFAULT_LOCALE.into());
		let timezone = env::var("TZ")
			.ok()
			.map(|tz| tz.trim_start_matches(':').to_owned())
			.filter(|tz| !tz.is_empty())
			.unwrap_or_else(|| Self::DEFAULT_TIMEZONE.into());

		Self::new(origin, locale, timezone)
	}

	/// Overrides the version tag.
	pub fn with_version(mut self, version: impl Into<String>) -> Self {
		self.version = version.into();

		self
	}

	/// Key-derivation input: `version|origin|locale|timezone`.
	pub fn material(&self) -> String {
		format!("{}|{}|{}|{}", self.version, self.origin, self.locale, self.timezone)
	}
}
impl Debug for DeviceFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DeviceFingerprint")
			.field("version", &self.version)
			.field("origin", &self.origin)
			.field("locale", &self.locale)
			.field("timezone", &self.timezone)
			.finish()
	}
}

/// `ru_RU.UTF-8` -> `ru-RU`; `C`/`POSIX` carry no locale.
fn normalize_locale(raw: &str) -> String {
	let base = raw.split(['.', '@']).next().unwrap_or_default().trim();

	if base.is_empty() || base == "C" || base == "POSIX" {
		return String::new();
	}

	base.replace('_', "-")
}
