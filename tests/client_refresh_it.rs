#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
// self
use master_session::{
	_preludet::*,
	auth::{LoginCredentials, TokenSecret},
	client::{ApiRequest, RefreshPhase},
	error::{RefreshFailure, StatusError},
	storage::{ACCESS_TOKEN_KEY, KeyValueStore, LEGACY_TOKEN_KEY, REFRESH_TOKEN_KEY},
};

const REFRESH_DELAY: StdDuration = StdDuration::from_millis(300);

fn stored(session: &TestSession, key: &str) -> Option<String> {
	session.store.get(key).expect("Memory store reads should succeed.")
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "refresh-1");
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer stale-access");
			then.status(401).json_body(json!({ "message": "jwt expired" }));
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer fresh-access");
			then.status(200).json_body(json!({ "data": [{ "id": 101 }] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(200)
				.json_body(json!({
					"success": true,
					"data": { "accessToken": "fresh-access", "refreshToken": "refresh-2" }
				}))
				.delay(REFRESH_DELAY);
		})
		.await;
	let client = &session.client;
	let (a, b, c) = tokio::join!(
		client.send(ApiRequest::get("/orders")),
		client.send(ApiRequest::get("/orders")),
		client.send(ApiRequest::get("/orders")),
	);

	for response in [a, b, c] {
		let orders: Vec<serde_json::Value> = response
			.expect("Every queued request should be replayed successfully.")
			.data()
			.expect("Replayed order list should decode.");

		assert_eq!(orders, vec![json!({ "id": 101 })]);
	}

	refresh.assert_calls_async(1).await;
	stale.assert_calls_async(3).await;
	fresh.assert_calls_async(3).await;

	assert_eq!(stored(&session, ACCESS_TOKEN_KEY).as_deref(), Some("fresh-access"));
	assert_eq!(stored(&session, LEGACY_TOKEN_KEY).as_deref(), Some("fresh-access"));
	assert_eq!(stored(&session, REFRESH_TOKEN_KEY).as_deref(), Some("refresh-2"));
	assert_eq!(
		session.vault.get_refresh_token().await.map(|t| t.expose().to_owned()),
		Some("refresh-2".into()),
	);
	assert_eq!(client.refresh_phase(), RefreshPhase::Idle);
	assert_eq!(client.refresh_metrics().attempts(), 1);
	assert_eq!(client.refresh_metrics().replays(), 3);
	assert!(session.redirect.redirects().is_empty());
}

#[tokio::test]
async fn rejected_refresh_fails_every_waiter_and_clears_tokens() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "revoked-refresh");

	session.vault.save_refresh_token(&TokenSecret::new("revoked-refresh")).await;

	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/calls");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(400).json_body(json!({ "message": "refresh token revoked" })).delay(REFRESH_DELAY);
		})
		.await;
	let client = &session.client;
	let (a, b, c) = tokio::join!(
		client.send(ApiRequest::get("/calls")),
		client.send(ApiRequest::get("/calls")),
		client.send(ApiRequest::get("/calls")),
	);

	for result in [a, b, c] {
		let err = result.expect_err("Every queued request should be rejected.");

		assert!(
			matches!(err, Error::SessionExpired(RefreshFailure::Rejected { status: 400, .. })),
			"Unexpected error: {err:?}."
		);
	}

	refresh.assert_calls_async(1).await;
	stale.assert_calls_async(3).await;

	assert_eq!(stored(&session, ACCESS_TOKEN_KEY), None);
	assert_eq!(stored(&session, REFRESH_TOKEN_KEY), None);
	assert_eq!(stored(&session, LEGACY_TOKEN_KEY), None);
	assert_eq!(session.vault.get_refresh_token().await, None);
	assert_eq!(session.redirect.redirects(), vec!["/login".to_owned()]);
	assert!(!client.is_authenticated());
	assert_eq!(client.refresh_phase(), RefreshPhase::Idle);
	assert_eq!(client.refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn replayed_request_is_not_retried_twice() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "refresh-1");
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/statistics/master");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "fresh-access" }));
		})
		.await;
	let err = session
		.client
		.send(ApiRequest::get("/statistics/master"))
		.await
		.expect_err("A 401 after the replay must surface to the caller.");

	assert!(matches!(err, Error::Status(StatusError { status: 401, .. })));

	orders.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(
		stored(&session, REFRESH_TOKEN_KEY).as_deref(),
		Some("refresh-1"),
		"A refresh response without a new refresh token should keep the old one.",
	);
	assert!(session.redirect.redirects().is_empty());
}

#[tokio::test]
async fn login_and_refresh_endpoints_never_trigger_refresh() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "refresh-1");
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401).json_body(json!({ "message": "invalid credentials" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401);
		})
		.await;
	let err = session
		.client
		.login(&LoginCredentials::new("master-17", "wrong"))
		.await
		.expect_err("Wrong credentials should fail.");

	assert!(matches!(err, Error::Status(StatusError { status: 401, .. })));

	let err = session
		.client
		.send(ApiRequest::post("/auth/refresh?source=manual"))
		.await
		.expect_err("A direct refresh call answered with 401 should fail as-is.");

	assert!(matches!(err, Error::Status(StatusError { status: 401, .. })));

	let err = session
		.client
		.send(ApiRequest::post("auth/refresh"))
		.await
		.expect_err("A refresh path without a leading slash is still the refresh endpoint.");

	assert!(matches!(err, Error::Status(StatusError { status: 401, .. })));

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(2).await;

	assert_eq!(stored(&session, ACCESS_TOKEN_KEY).as_deref(), Some("stale-access"));
	assert!(session.redirect.redirects().is_empty());
}

#[tokio::test]
async fn missing_refresh_token_skips_refresh_and_redirects() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.base_url());
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header_missing("authorization");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "never" }));
		})
		.await;
	let err = session
		.client
		.get_json::<serde_json::Value>("/orders")
		.await
		.expect_err("Without a refresh token the request should fail.");

	assert!(matches!(err, Error::SessionExpired(RefreshFailure::MissingRefreshToken)));

	orders.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert_eq!(session.redirect.redirects(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn vaulted_refresh_token_covers_evicted_storage() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.base_url());

	assert!(session.vault.save_refresh_token(&TokenSecret::new("vaulted-refresh")).await);

	let anonymous = server
		.mock_async(|when, then| {
			when.method(GET).path("/cash/submissions").header_missing("authorization");
			then.status(401);
		})
		.await;
	let authorized = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/cash/submissions")
				.header("authorization", "Bearer restored-access");
			then.status(200).json_body(json!({ "data": [] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.json_body(json!({ "refreshToken": "vaulted-refresh" }));
			then.status(200).json_body(json!({ "accessToken": "restored-access" }));
		})
		.await;
	let submissions: Vec<serde_json::Value> = session
		.client
		.send(ApiRequest::get("/cash/submissions"))
		.await
		.expect("The vaulted refresh token should restore the session.")
		.data()
		.expect("Submission list should decode.");

	assert!(submissions.is_empty());

	anonymous.assert_calls_async(1).await;
	authorized.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(stored(&session, REFRESH_TOKEN_KEY).as_deref(), Some("vaulted-refresh"));
}

#[tokio::test]
async fn cancelled_leader_does_not_strand_waiters() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "refresh-1");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer stale-access");
			then.status(401);
		})
		.await;

	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer fresh-access");
			then.status(200).json_body(json!({ "data": [] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "fresh-access" })).delay(REFRESH_DELAY);
		})
		.await;
	let cancel = CancellationToken::new();
	let client = &session.client;
	let cancelled = client.send_with_cancel(ApiRequest::get("/orders"), &cancel);
	let trigger = async {
		tokio::time::sleep(REFRESH_DELAY / 3).await;
		cancel.cancel();
	};
	let (cancelled, _, waiter) =
		tokio::join!(cancelled, trigger, client.send(ApiRequest::get("/orders")));

	assert!(matches!(cancelled, Err(Error::Cancelled)));
	waiter.expect("The remaining request should still be replayed.");

	refresh.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(client.refresh_phase(), RefreshPhase::Idle);
	assert_eq!(client.access_token().map(|t| t.expose().to_owned()), Some("fresh-access".into()));
}

#[tokio::test]
async fn late_unauthorized_reuses_completed_refresh() {
	let server = MockServer::start_async().await;
	let session = build_signed_in_session(&server.base_url(), "stale-access", "refresh-1");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer stale-access");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/calls").header("authorization", "Bearer stale-access");
			then.status(401).delay(REFRESH_DELAY * 2);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer fresh-access");
			then.status(200).json_body(json!({ "data": [] }));
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "fresh-access" }));
		})
		.await;
	let client = &session.client;
	let (orders, calls) = tokio::join!(
		client.send(ApiRequest::get("/orders")),
		client.send(ApiRequest::get("/calls")),
	);

	orders.expect("Orders should be replayed with the fresh token.");
	calls.expect("A 401 arriving after the refresh should reuse its token.");

	refresh.assert_calls_async(1).await;
}
