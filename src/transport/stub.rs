//! Hostname-keyed synthetic responses for tests.
//!
//! Attaching a [`StubRouter`] to a descriptor puts it in test mode: requests whose host has a
//! registered handler never reach the transport. Hosts without a handler fall through to the real
//! transport unchanged.

// self
use crate::{
	_prelude::*,
	transport::{HttpRequest, HttpResponse},
};

/// Handler producing a synthetic response for a matched request.
pub type StubHandler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Registry of hostname → handler pairs.
#[derive(Clone, Default)]
pub struct StubRouter {
	handlers: Arc<RwLock<HashMap<String, StubHandler>>>,
}
impl StubRouter {
	/// Registers `handler` for every host in `hostnames`, replacing earlier registrations.
	pub fn handle<I, S, F>(&self, hostnames: I, handler: F) -> &Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
		F: 'static + Fn(&HttpRequest) -> HttpResponse + Send + Sync,
	{
		let handler: StubHandler = Arc::new(handler);
		let mut handlers = self.handlers.write();

		for host in hostnames {
			handlers.insert(host.into(), handler.clone());
		}

		self
	}

	/// Removes the handler for `hostname`.
	pub fn remove(&self, hostname: &str) {
		self.handlers.write().remove(hostname);
	}

	/// Produces the synthetic response for `request`, if its host is registered.
	pub fn route(&self, request: &HttpRequest) -> Option<HttpResponse> {
		let host = request.uri().host()?;
		let handler = self.handlers.read().get(host).cloned()?;

		Some(handler(request))
	}
}
impl Debug for StubRouter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut hosts = self.handlers.read().keys().cloned().collect::<Vec<_>>();

		hosts.sort_unstable();

		f.debug_struct("StubRouter").field("hosts", &hosts).finish()
	}
}

/// Builds a response with `status` and a body, for use inside stub handlers.
pub fn stub_response(status: u16, body: impl Into<Vec<u8>>) -> HttpResponse {
	let mut response = HttpResponse::new(body.into());

	*response.status_mut() =
		http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

	response
}
