use boardflow::cli::commands::Cli;
use boardflow::cli::handlers;
use boardflow::io::logging;
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
