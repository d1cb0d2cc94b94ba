mod commands;
mod helpers;

use clap::Parser;
use sparkmec_core::domain::DiagnosticError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_diagnostic_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            eprintln!("{}", diagnostic.fatal_exit_line());
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("sparkmec".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "sparkmec",
    version,
    about = "Saha-Boltzmann plasma diagnostics for emission spectra"
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG applies otherwise
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the full diagnostic and write the JSON report with spectrum artifacts
    Run(commands::RunArgs),
    /// Correct the spectrum and write the peak table without reference data
    Prepare(commands::PrepareArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_diagnostic_command(args),
        CliCommand::Prepare(args) => commands::run_prepare_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DiagnosticError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DiagnosticError> for CliError {
    fn from(error: DiagnosticError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_diagnostic_error(&self) -> DiagnosticError {
        match self {
            Self::Usage(message) => DiagnosticError::input("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DiagnosticError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
