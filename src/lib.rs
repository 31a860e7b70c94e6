//! Cached, deduplicated, rate-limited HTTP resource client with transparent bearer-token
//! refresh.
//!
//! A [`ResourceDescriptor`](descriptor::ResourceDescriptor) describes one remote origin (URL,
//! default headers, cache TTL, rate budget, auth provider, transport) and lives for the whole
//! process. Each call builds an [`Endpoint`](endpoint::Endpoint) from it; executing the endpoint
//! fingerprints the request, serves cached bytes when possible, serializes identical in-flight
//! calls through a keyed [`Locker`](lock::Locker), throttles through a
//! [`RateLimiter`](limit::RateLimiter), and decodes the response into the caller's type.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod context;
pub mod descriptor;
pub mod endpoint;
pub mod error;
pub mod fingerprint;
pub mod limit;
pub mod lock;
pub mod obs;
pub mod store;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::{
		context::Context,
		error::{Error, Result},
	};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
