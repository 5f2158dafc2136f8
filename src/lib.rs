//! Broker-backed token sessions, rate-limit aware REST dispatch, and level-parallel asset
//! tree enumeration for Earth Engine style compute APIs.
//!
//! A [`session::Session`] owns the current token bundle and refreshes it through a
//! [`refresh::TokenRefresher`] with single-flight semantics. A [`rest::RestDispatcher`] sends
//! templated requests with the session's headers and retries rate-limited calls, and a
//! [`tree::TreeEnumerator`] walks a folder tree breadth-first on top of the dispatcher.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod refresh;
pub mod rest;
pub mod session;
pub mod store;
pub mod tree;

mod _prelude {
	pub use std::{
		collections::{HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
