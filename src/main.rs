use std::fs::File;
use std::process::ExitCode;
use wallet_engine::run::{run, Args, Error};

fn main() -> ExitCode {
    env_logger::init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<(), Error> {
    let args = Args::parse(std::env::args().skip(1))?;
    let config = args.config()?;
    let wallets = File::open(&args.wallets)?;

    run(wallets, &config, &args.command, std::io::stdout().lock())
}
