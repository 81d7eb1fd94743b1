mod api;
mod config;
mod init;
mod run;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use surveybot_logging::{init_tracing, init_tracing_with_file, LogFormat};

use crate::config::{Config, CONFIG_FILE_NAME};

#[derive(Parser, Debug)]
#[command(
    name = "surveybot",
    about = "Conversational survey bots backed by a completion model",
    version,
    author
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Log output format (overrides the config file)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatChoice>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Bind address (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Port (default from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Conduct a survey in the terminal
    Run {
        /// Survey definition file
        #[arg(short, long, default_value = init::EXAMPLE_SURVEY_FILE)]
        survey: PathBuf,

        /// Output the result bundle as JSON
        #[arg(long)]
        json_output: bool,
    },
    /// Write a starter config and example survey
    Init {
        /// Target directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { ref dir } = cli.command {
        return init::handle_init(dir).await;
    }

    let config = Config::load_or_default(&cli.config)?;
    let log_format: LogFormat = cli
        .log_format
        .map(Into::into)
        .unwrap_or(config.logging.format);

    let _guard = match config.logging.dir {
        Some(ref dir) => Some(init_tracing_with_file(&config.logging.level, log_format, dir)),
        None => {
            init_tracing(&config.logging.level, log_format);
            None
        }
    };

    match cli.command {
        Commands::Serve { host, port } => serve::handle_serve(&config, host, port).await,
        Commands::Run {
            survey,
            json_output,
        } => run::handle_run(&survey, json_output, &config, log_format).await,
        Commands::Init { .. } => Ok(()),
    }
}
