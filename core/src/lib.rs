//! # Dab Core
//!
//! Network-facing probes and the orchestrator that merges their findings into a
//! [`FingerprintSet`](dab_common::fingerprint::FingerprintSet).
//!
//! * **[`network`]**: transport-level plumbing (TCP reachability, the shared NBNS endpoint).
//! * **[`scanner`]**: the individual identity probes and the [`Fingerprinter`] that fans them out.

pub mod network;
pub mod process;
pub mod scanner;

pub use scanner::Fingerprinter;
