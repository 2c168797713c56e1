use std::io;
use std::process;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use textpp::cli;
use textpp::Options;

/// Log filter, in `EnvFilter` syntax.
const LOG_ENV: &str = "TEXTPP_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(filter),
        )
        .init();
}

fn main() {
    init_tracing();

    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("textpp: {e}");
            eprintln!("{}", cli::USAGE);
            process::exit(2);
        }
    };

    // Output is only written once every input has been processed, so a
    // fatal error leaves stdout empty.
    let pp = match cli::run(&args, Options::from_env()) {
        Ok(pp) => pp,
        Err(e) => {
            eprintln!("textpp: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = pp.export(&mut io::stdout().lock()) {
        eprintln!("textpp: {e}");
        process::exit(1);
    }
}
