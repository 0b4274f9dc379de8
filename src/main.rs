use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::error;

use cn_mailer::{Args, BatchOutcome, Config, Mailer, MailerResult, RelayDialer, StubDialer};

/// Exit code for a missing parameter
const USAGE: u8 = 2;

async fn send_all(config: &Config) -> MailerResult<BatchOutcome> {
    let mailer = Mailer::new(config)?;
    if config.dry_run {
        mailer.run(StubDialer::new_positive()).await
    } else {
        mailer.run(RelayDialer::new(config)).await
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Args::parse().validate() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            if let Err(err) = Args::command().print_help() {
                error!("could not print usage: {}", err);
            }
            return ExitCode::from(USAGE);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("could not start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(send_all(&config)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
