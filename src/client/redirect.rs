//! Navigation hook fired after a terminal authentication failure.

// self
use crate::_prelude::*;

/// Sends the user back to the login entry point.
///
/// Called at most once per failed refresh, after local tokens are cleared and before the
/// queued requests are rejected.
pub trait LoginRedirect
where
	Self: Send + Sync,
{
	/// Navigates to `login_path`.
	fn redirect_to_login(&self, login_path: &str);
}

/// Default hook for headless hosts: records the redirect in the log and does nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRedirect;
impl LoginRedirect for LogRedirect {
	fn redirect_to_login(&self, login_path: &str) {
		tracing::warn!(login_path, "session expired; login required");
	}
}

impl<F> LoginRedirect for F
where
	F: Fn(&str) + Send + Sync,
{
	fn redirect_to_login(&self, login_path: &str) {
		self(login_path)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn closures_act_as_redirect_hooks() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let hook: Arc<dyn LoginRedirect> = Arc::new(move |path: &str| sink.lock().push(path.to_owned()));

		hook.redirect_to_login("/login");
		LogRedirect.redirect_to_login("/login");

		assert_eq!(*seen.lock(), vec!["/login".to_owned()]);
	}
}
