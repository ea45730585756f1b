#[macro_use]
extern crate log;

use gumdrop::Options;
use std::process;

use kaskade::config::LoadtesterConfiguration;
use kaskade::{KaskadeError, LoadTest};

fn main() {
    let configuration = LoadtesterConfiguration::parse_args_default_or_exit();
    if configuration.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return;
    }

    configuration.initialize_logger();

    if let Err(e) = run(&configuration) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(configuration: &LoadtesterConfiguration) -> Result<(), KaskadeError> {
    let session = configuration.load_session()?;
    let result = LoadTest::initialize(session)?.execute()?;
    configuration.write_result(&result)
}
