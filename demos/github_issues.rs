//! Lists issues from a GitHub-shaped API through a cached, rate-limited descriptor.
//!
//! The connection string carries the bearer token, the cache TTL, the request budget, and a
//! default `Accept` header. The second listing is served from the in-memory cache, and a missing
//! issue is mapped into a typed error.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use rest_broker::{descriptor::ResourceDescriptor, endpoint::UpstreamFailure, error::Error};

#[derive(Debug, Deserialize)]
struct Issue {
	number: u64,
	title: String,
}

#[derive(Debug, thiserror::Error)]
#[error("GitHub answered {status}: {message}")]
struct GithubError {
	status: u16,
	message: String,
}

#[derive(Deserialize)]
struct GithubMessage {
	message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let listing = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/repos/hack-ink/rest-broker/issues")
				.query_param("state", "open")
				.header("authorization", "Bearer demo-token")
				.header("accept", "application/vnd.github+json");
			then.status(200).header("content-type", "application/json").body(
				"[{\"number\":7,\"title\":\"Cache warmup\"},{\"number\":9,\"title\":\"Retry budget\"}]",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/repos/hack-ink/rest-broker/issues/404");
			then.status(404).body("{\"message\":\"Not Found\"}");
		})
		.await;

	let conn = server
		.url("/?Name=GitHub&Cache=5m&MaxRequestsPerSecond=10&Header.Accept=application/vnd.github%2Bjson")
		.replacen("http://", "http://bearer:demo-token@", 1);
	let github = Arc::new(ResourceDescriptor::from_url(&conn)?.with_error_mapper(
		|failure: UpstreamFailure<'_>| {
			Error::mapped(GithubError {
				status: failure.response.status().as_u16(),
				message: failure
					.body_json::<GithubMessage>()
					.map(|m| m.message)
					.unwrap_or_else(|| failure.body_text()),
			})
		},
	));
	let issues = github
		.endpoint("/repos/hack-ink/rest-broker/issues")
		.name("issues")
		.query("state", "open")
		.returning::<Vec<Issue>>();

	println!("{issues}");

	for round in 1..=2 {
		for issue in issues.clone().get().await? {
			println!("Round {round}: #{} {}.", issue.number, issue.title);
		}
	}

	listing.assert_calls_async(1).await;

	match github.endpoint("/repos/hack-ink/rest-broker/issues/404").get().await {
		Err(e) => println!("Lookup failed as expected: {e}."),
		Ok(issue) => println!("Unexpected issue: {issue}."),
	}

	Ok(())
}
