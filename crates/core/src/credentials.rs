use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Shared bearer credential.
///
/// Clones observe the same value. Subscribers are woken when it changes, which
/// is how a rejected credential anywhere in the client turns into a logout.
#[derive(Clone)]
pub struct Credentials {
	tx: Arc<watch::Sender<Option<String>>>,
}

impl Credentials {
	pub fn new(token: Option<String>) -> Self {
		let token = token.filter(|t| !t.trim().is_empty());
		let (tx, _rx) = watch::channel(token);
		Self { tx: Arc::new(tx) }
	}

	pub fn current(&self) -> Option<String> {
		self.tx.borrow().clone()
	}

	pub fn is_present(&self) -> bool {
		self.tx.borrow().is_some()
	}

	pub fn set(&self, token: impl Into<String>) {
		self.tx.send_replace(Some(token.into()));
	}

	/// Drop the credential. Returns `true` if one was present.
	pub fn clear(&self) -> bool {
		self.tx.send_if_modified(|token| token.take().is_some())
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
		self.tx.subscribe()
	}
}

impl Default for Credentials {
	fn default() -> Self {
		Self::new(None)
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials").field("present", &self.is_present()).finish()
	}
}
