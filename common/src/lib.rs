//! Shared configuration and the fingerprint data model used by every `dab` crate.

pub mod config;
pub mod fingerprint;
