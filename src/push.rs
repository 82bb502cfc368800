//! Push subscription forwarding.
//!
//! Subscription objects are opaque here: they are posted to the backend exactly as the host
//! produced them, after a capability check.

// self
use crate::{
	_prelude::*,
	client::{ApiClient, ApiRequest},
	error::PushUnavailable,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	platform::PlatformCapabilities,
};

/// Registers and removes push subscriptions through an authenticated client.
pub struct PushSubscriptions<C>
where
	C: ?Sized + HttpTransport,
{
	client: ApiClient<C>,
	capabilities: Arc<dyn PlatformCapabilities>,
}
impl<C> PushSubscriptions<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates the forwarder.
	pub fn new(client: ApiClient<C>, capabilities: Arc<dyn PlatformCapabilities>) -> Self {
		Self { client, capabilities }
	}

	/// Why push cannot be enabled, or `None` when it can.
	pub fn unavailable_reason(&self) -> Option<PushUnavailable> {
		if self.capabilities.supports_push() {
			None
		} else if self.capabilities.requires_install_for_push() {
			Some(PushUnavailable::InstallRequired)
		} else {
			Some(PushUnavailable::Unsupported)
		}
	}

	/// Sends `subscription` to the subscribe endpoint.
	pub async fn subscribe(&self, subscription: &serde_json::Value) -> Result<()> {
		if let Some(reason) = self.unavailable_reason() {
			return Err(Error::PushUnavailable { reason });
		}

		self.forward("subscribe", &self.client.config().endpoints.push_subscribe, subscription).await
	}

	/// Sends `subscription` to the unsubscribe endpoint.
	///
	/// Removal is forwarded even when push is no longer available, so the backend can drop a
	/// subscription created before the environment changed.
	pub async fn unsubscribe(&self, subscription: &serde_json::Value) -> Result<()> {
		self.forward("unsubscribe", &self.client.config().endpoints.push_unsubscribe, subscription)
			.await
	}

	async fn forward(
		&self,
		stage: &'static str,
		path: &str,
		subscription: &serde_json::Value,
	) -> Result<()> {
		let span = FlowSpan::new(FlowKind::Push, stage);

		obs::record_flow_outcome(FlowKind::Push, FlowOutcome::Attempt);

		let result = span
			.instrument(self.client.send(ApiRequest::post(path).json(subscription)?))
			.await;

		match result {
			Ok(_) => {
				obs::record_flow_outcome(FlowKind::Push, FlowOutcome::Success);

				Ok(())
			},
			Err(e) => {
				obs::record_flow_outcome(FlowKind::Push, FlowOutcome::Failure);
				tracing::warn!(stage, error = %e, "push subscription was not forwarded");

				Err(e)
			},
		}
	}
}
impl<C> Debug for PushSubscriptions<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PushSubscriptions")
			.field("available", &self.unavailable_reason().is_none())
			.finish()
	}
}
