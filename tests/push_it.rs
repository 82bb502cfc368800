#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use master_session::{
	_preludet::*,
	error::PushUnavailable,
	platform::{PlatformCapabilities, StaticCapabilities, UserAgentCapabilities},
	push::PushSubscriptions,
};

fn subscription() -> serde_json::Value {
	json!({
		"endpoint": "https://push.example/send/abc",
		"expirationTime": null,
		"keys": { "p256dh": "BNc...", "auth": "tBH..." }
	})
}

#[tokio::test]
async fn subscription_objects_are_forwarded_verbatim() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "access-1", "refresh-1");
	let subscribe = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/push/subscribe")
				.header("authorization", "Bearer access-1")
				.json_body(subscription());
			then.status(201);
		})
		.await;
	let unsubscribe = server
		.mock_async(|when, then| {
			when.method(POST).path("/push/unsubscribe").json_body(subscription());
			then.status(200);
		})
		.await;
	let capabilities: Arc<dyn PlatformCapabilities> = Arc::new(StaticCapabilities::push_ready());
	let push = PushSubscriptions::new(session.client.clone(), capabilities);

	push.subscribe(&subscription()).await.expect("Subscription should be forwarded.");
	push.unsubscribe(&subscription()).await.expect("Removal should be forwarded.");

	subscribe.assert_calls_async(1).await;
	unsubscribe.assert_calls_async(1).await;
}

#[tokio::test]
async fn uninstalled_ios_app_is_told_to_install() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "access-1", "refresh-1");
	let subscribe = server
		.mock_async(|when, then| {
			when.method(POST).path("/push/subscribe");
			then.status(201);
		})
		.await;
	let safari = UserAgentCapabilities::new(
		"Mozilla/5.0 (iPhone; CPU iPhone OS 16_4 like Mac OS X) AppleWebKit/605.1.15 \
		 (KHTML, like Gecko) Version/16.4 Mobile/15E148 Safari/604.1",
	)
	.service_worker(true)
	.push_manager(true);
	let push = PushSubscriptions::new(session.client.clone(), Arc::new(safari));
	let err = push
		.subscribe(&subscription())
		.await
		.expect_err("Push must be refused until the app is installed.");

	assert!(matches!(err, Error::PushUnavailable { reason: PushUnavailable::InstallRequired }));

	let push = PushSubscriptions::new(session.client.clone(), Arc::new(StaticCapabilities::no_push()));

	assert_eq!(push.unavailable_reason(), Some(PushUnavailable::Unsupported));

	subscribe.assert_calls_async(0).await;
}
