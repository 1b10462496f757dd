mod commands;
mod terminal;

use commands::CommandLine;
use dab_core::Fingerprinter;
use terminal::{logging, print};
use tracing::{debug, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);

    let cfg = commands.config();
    debug!("{cfg:?}");

    let fingerprints = Fingerprinter::new(cfg).fingerprint(&commands.host).await;
    if fingerprints.is_empty() {
        info!("Nothing identified {}", commands.host);
    }

    let stdout = std::io::stdout();
    print::fingerprints(&mut stdout.lock(), fingerprints)?;
    Ok(())
}
