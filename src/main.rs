use clap::Parser;
use process_warden::commands::run::{self as run_command, EXIT_RUNTIME, EXIT_USAGE};
use process_warden::commands::{Cli, Commands};
use process_warden::error::{ErrorCategory, WardenError};
use process_warden::logging::init_logger;
use process_warden::split_command;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logger(cli.log_level.as_deref(), cli.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {:#}", err);
        return ExitCode::from(EXIT_USAGE);
    }

    match main_impl(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", err.user_message());
            match err.category() {
                ErrorCategory::Usage => ExitCode::from(EXIT_USAGE),
                ErrorCategory::Runtime => ExitCode::from(EXIT_RUNTIME),
            }
        }
    }
}

async fn main_impl(command: Commands) -> Result<ExitCode, WardenError> {
    match command {
        Commands::Run(args) => {
            let shutdown = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    // No signal handler available; never request shutdown.
                    std::future::pending::<()>().await;
                }
            };
            let report = run_command::execute(&args, shutdown).await?;
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                report.print();
            }
            Ok(run_command::exit_code(report.verdict))
        }
        Commands::Parse { command } => {
            for arg in split_command(&command)? {
                println!("{}", arg);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
