//! Wire codecs used by the `dab` probes.
//!
//! Nothing in this crate performs I/O: it only builds outgoing datagrams and
//! decodes incoming ones.

pub mod dns;
pub mod nbns;
