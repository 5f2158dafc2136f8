//! Token bundle and secret models.

pub mod bundle;
pub mod secret;
