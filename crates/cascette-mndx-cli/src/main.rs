use clap::Parser;
use tracing::Level;

use cascette_mndx_cli::{Commands, OutputFormat, commands};

#[derive(Parser)]
#[command(
    name = "mndx",
    about = "Inspect MNDX root files and MAR name databases",
    version,
    author,
    long_about = "A command-line tool for reading the MNDX root files used by CASC storages of StarCraft II engine games: list packages and files, resolve paths to content keys and dump raw MAR name databases."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::handle(cli.command, cli.format)
}
