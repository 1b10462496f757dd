use std::io::{self, Write};

use dab_common::fingerprint::{Fingerprint, FingerprintSet};

/// Writes one `kind value` line per fingerprint, sorted by kind then value.
pub fn fingerprints<W: Write>(out: &mut W, set: FingerprintSet) -> io::Result<()> {
    for fingerprint in set.into_sorted_vec() {
        line(out, &fingerprint)?;
    }
    out.flush()
}

fn line<W: Write>(out: &mut W, fingerprint: &Fingerprint) -> io::Result<()> {
    writeln!(out, "{fingerprint}")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
