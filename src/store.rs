//! In-memory holder for the session's current token bundle.
//!
//! The store performs no I/O. Reads take a `parking_lot` read guard and clone the bundle;
//! only the session's refresh path swaps it.

// self
use crate::{_prelude::*, auth::TokenBundle, error::ConfigError};

/// Current bundle plus staleness checks.
#[derive(Debug, Default)]
pub struct TokenStore {
	bundle: RwLock<Option<TokenBundle>>,
}
impl TokenStore {
	/// Creates a store seeded with `bundle`.
	pub fn new(bundle: TokenBundle) -> Self {
		Self { bundle: RwLock::new(Some(bundle)) }
	}

	/// Creates a store without a bundle; [`TokenStore::current`] fails until one is set.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Returns a clone of the current bundle.
	pub fn current(&self) -> Result<TokenBundle, ConfigError> {
		self.bundle.read().clone().ok_or(ConfigError::MissingBundle)
	}

	/// Returns `true` when less than `skew` remains before the current bundle expires.
	pub fn is_stale(&self, now: OffsetDateTime, skew: Duration) -> Result<bool, ConfigError> {
		self.bundle
			.read()
			.as_ref()
			.map(|bundle| bundle.is_stale_at(now, skew))
			.ok_or(ConfigError::MissingBundle)
	}

	/// Replaces the bundle wholesale, returning the previous one.
	pub fn replace(&self, bundle: TokenBundle) -> Option<TokenBundle> {
		self.bundle.write().replace(bundle)
	}
}
