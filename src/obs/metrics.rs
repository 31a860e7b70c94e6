// self
use crate::{_prelude::*, obs::CallLabels};

/// Records the latency of one network call via the global metrics recorder (when enabled).
pub fn record_call(labels: &CallLabels, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(
			"rest_in_seconds",
			"domain" => labels.domain.clone(),
			"method" => labels.method.clone(),
			"path" => labels.path.clone()
		)
		.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (labels, elapsed);
	}
}
