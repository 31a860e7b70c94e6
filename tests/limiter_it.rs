// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use tokio::time::Instant;
// self
use rest_broker::{
	context::Context,
	descriptor::ResourceDescriptor,
	error::{CancellationError, Error},
	transport::{StubRouter, stub_response},
};

fn stubbed(conn: &str) -> Arc<ResourceDescriptor> {
	let stubs = StubRouter::default();

	stubs.handle(["api.test.com"], |_| stub_response(200, "{}"));

	Arc::new(
		ResourceDescriptor::from_url(conn).expect("Descriptor should parse.").with_stubs(stubs),
	)
}

#[tokio::test(start_paused = true)]
async fn descriptor_budget_spaces_calls() {
	let descriptor = stubbed("https://api.test.com/?MaxRequestsPerSecond=1");
	let start = Instant::now();

	for _ in 0..3 {
		descriptor.endpoint("/items").get().await.expect("Throttled call should succeed.");
	}

	assert!(start.elapsed() >= StdDuration::from_secs(2));
	assert!(start.elapsed() < StdDuration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn endpoint_limiter_replaces_descriptor_limiter() {
	let descriptor = stubbed("https://api.test.com/?MaxRequestsPerSecond=1");
	let endpoint = descriptor.endpoint("/items").limit(2.);
	let start = Instant::now();

	for _ in 0..3 {
		endpoint.clone().get().await.expect("Endpoint-limited call should succeed.");
	}

	assert!(start.elapsed() >= StdDuration::from_secs(1));
	assert!(start.elapsed() < StdDuration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn unlimited_descriptor_never_waits() {
	let descriptor = stubbed("https://api.test.com/");
	let start = Instant::now();

	for _ in 0..10 {
		descriptor.endpoint("/items").get().await.expect("Unthrottled call should succeed.");
	}

	assert_eq!(start.elapsed(), StdDuration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn deadline_shorter_than_the_wait_fails_fast() {
	let descriptor = stubbed("https://api.test.com/?MaxRequestsPerSecond=1");

	descriptor.endpoint("/items").get().await.expect("First call should pass immediately.");

	let start = Instant::now();
	let err = descriptor
		.endpoint("/items")
		.context(Context::background().with_timeout(StdDuration::from_millis(200)))
		.get()
		.await
		.expect_err("The token cannot arrive before the deadline.");

	assert!(matches!(err, Error::Cancelled(CancellationError::DeadlineExceeded)));
	assert_eq!(start.elapsed(), StdDuration::ZERO);

	// The unused reservation was returned, so the next caller waits one interval at most.
	descriptor.endpoint("/items").get().await.expect("Later call should succeed.");

	assert!(start.elapsed() <= StdDuration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_waiting_caller() {
	let descriptor = stubbed("https://api.test.com/?MaxRequestsPerSecond=0.1");

	descriptor.endpoint("/items").get().await.expect("First call should pass immediately.");

	let ctx = Context::background();
	let waiting = tokio::spawn(descriptor.endpoint("/items").context(ctx.clone()).get());

	tokio::time::sleep(StdDuration::from_millis(100)).await;
	ctx.cancel();

	let err = waiting
		.await
		.expect("Caller task should not panic.")
		.expect_err("Cancelled caller should fail.");

	assert!(err.is_cancelled());
}
