//! Auth-domain identifiers, token bundles, and broker handshake decoding.

pub mod handshake;
pub mod id;
pub mod token;

pub use handshake::*;
pub use id::*;
pub use token::{bundle::*, secret::*};
