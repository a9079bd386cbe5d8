//! Transport-derived caller identity used to bucket rate-limit accounting.
//!
//! A [`ClientKey`] is never read from the request body. The host transport builds one from
//! whatever it trusts (peer address, authenticated session) and hands it to
//! [`ProxyService::handle`](crate::proxy::ProxyService::handle).

// std
use std::{borrow::Borrow, net::IpAddr, ops::Deref};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const CLIENT_KEY_MAX_LEN: usize = 128;

/// Error returned when a client key fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ClientKeyError {
	/// The key was empty.
	#[error("Client key cannot be empty.")]
	Empty,
	/// The key contains whitespace characters.
	#[error("Client key contains whitespace.")]
	ContainsWhitespace,
	/// The key exceeded the allowed length.
	#[error("Client key exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted length.
		max: usize,
	},
}

/// Stable identity of a caller for the lifetime of a rate-limit window.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientKey(String);
impl ClientKey {
	/// Creates a key from an already-trusted transport identifier.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ClientKeyError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Derives a key from the connection's peer address.
	pub fn from_peer(addr: IpAddr) -> Self {
		Self(format!("ip:{addr}"))
	}

	/// Derives a key from an authenticated session token.
	///
	/// The token is hashed so the raw secret is never stored as a map key or logged.
	pub fn from_session(token: impl AsRef<[u8]>) -> Self {
		let digest = Sha256::digest(token.as_ref());

		Self(format!("session:{}", URL_SAFE_NO_PAD.encode(digest)))
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for ClientKey {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ClientKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ClientKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ClientKey> for String {
	fn from(value: ClientKey) -> Self {
		value.0
	}
}
impl TryFrom<String> for ClientKey {
	type Error = ClientKeyError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for ClientKey {
	type Err = ClientKeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for ClientKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientKey({})", self.0)
	}
}
impl Display for ClientKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), ClientKeyError> {
	if view.is_empty() {
		return Err(ClientKeyError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(ClientKeyError::ContainsWhitespace);
	}
	if view.len() > CLIENT_KEY_MAX_LEN {
		return Err(ClientKeyError::TooLong { max: CLIENT_KEY_MAX_LEN });
	}

	Ok(())
}
