//! Image Mirror - incremental container image mirroring
//!
//! Reads the image catalog, decides per image which tags are new or changed
//! at the destination, and copies only those.

use image_mirror::cli::{Args, Outcome, Runner};
use image_mirror::logging::{init_tracing, parse_level};
use std::process;
use tracing::Level;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    let level = match args.log_level_name() {
        Some(name) => parse_level(&name).unwrap_or_else(|| {
            eprintln!("Unknown log level '{}', using info", name);
            Level::INFO
        }),
        None if args.verbose => Level::DEBUG,
        None => Level::INFO,
    };
    if let Err(e) = init_tracing(level, args.log_format) {
        eprintln!("{}", e);
    }

    let runner = Runner::new(args);
    match runner.run().await {
        Ok(Outcome::Success) => {}
        Ok(Outcome::Partial) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
