use clap::Parser;
use stocksim::cli::{run, Cli};
use stocksim::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);
    run(cli)
}
