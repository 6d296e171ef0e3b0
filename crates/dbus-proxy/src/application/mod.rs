//! Application layer: proxies, listener bookkeeping and signal routing.
//!
//! Everything here is transport-agnostic.  The bus is reached only through
//! the [`crate::infrastructure::bus::Bus`] trait.

pub mod listeners;
pub mod methods;
pub mod proxy;
pub mod router;
pub mod subscription;
