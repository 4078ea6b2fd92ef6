//! Token values, change scenes, and the token manager.

pub mod hook;
pub mod manager;
pub mod observer;

pub use hook::*;
pub use manager::*;
pub use observer::*;

// self
use crate::_prelude::*;

/// Opaque token; redacted in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(String);
impl Token {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Token {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for Token {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for Token {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Token").field(&"<redacted>").finish()
	}
}
impl Display for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Why the cached token last changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenScene {
	/// A caller-supplied getter produced a different value.
	Custom,
	/// [`TokenManager::set_token`] stored a value.
	SetToken,
	/// Adopted from the one-shot carrier (cookie) store.
	ReadOnCookie,
	/// Adopted from the page URL query.
	ReadOnQuery,
	/// Read from the durable (local) store.
	ReadOnLocal,
	/// Read from the session store.
	ReadOnSession,
}
impl TokenScene {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenScene::Custom => "custom",
			TokenScene::SetToken => "set_token",
			TokenScene::ReadOnCookie => "read_on_cookie",
			TokenScene::ReadOnQuery => "read_on_query",
			TokenScene::ReadOnLocal => "read_on_local",
			TokenScene::ReadOnSession => "read_on_session",
		}
	}
}
impl Display for TokenScene {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = Token::new("super-secret");

		assert_eq!(format!("{token:?}"), "Token(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(token.expose(), "super-secret");
	}
}
