//! Built-in skip strategies.

// self
use crate::{_prelude::*, http::HttpError};

/// Named predicate deciding whether a failed request bypasses escalation and reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipStrategy {
	/// Skip whenever the request set `skip_error_handle`.
	All,
	/// Skip only application-level failures: `skip_error_handle` set and a 2xx status.
	#[default]
	Biz,
}
impl SkipStrategy {
	/// Applies the strategy to `error`.
	pub fn should_skip(self, error: &HttpError) -> bool {
		if !error.config.skip_error_handle {
			return false;
		}

		match self {
			Self::All => true,
			Self::Biz => error.status().is_some_and(|status| (200..300).contains(&status)),
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SkipStrategy::All => "all",
			SkipStrategy::Biz => "biz",
		}
	}
}
impl Display for SkipStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
