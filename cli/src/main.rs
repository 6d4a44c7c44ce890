mod commands;
mod terminal;

use commands::{CommandLine, probe};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet)?;
    print::banner(commands.quiet);

    probe::probe(&commands).await
}
