use std::process::ExitCode;

use clap::Parser;
use nanobanana::config::{LookupContext, setup_logging};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = nanobanana::cli::CliOptions::parse();

    let _ = setup_logging(cli.debug);

    let result = match LookupContext::from_process() {
        Ok(ctx) => nanobanana::commands::run(&cli, &ctx).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
