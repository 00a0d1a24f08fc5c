//! mpmigrate - Main entry point

use clap::Parser;
use mpmigrate_cli::commands::{self, select::SelectArgs, Completion};
use mpmigrate_cli::{Cli, Commands, ConfigCommand, ErrorKind};
use mpmigrate_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process::ExitCode;
use tracing::{error, warn};

fn main() -> ExitCode {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return ExitCode::SUCCESS;
    }

    // Ensure a command is provided
    let Some(command) = &cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        return ExitCode::from(2);
    };

    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let mut builder = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("mpmigrate");
    if let Some(dir) = &cli.log_dir {
        // The file keeps the full history of a scheduled run
        builder = builder
            .output(LogOutput::Both)
            .log_dir(dir)
            .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info });
    }

    // Environment variables take precedence
    let log_config = match builder.build().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {e}");
            LogConfig::default()
        },
    };

    // CLI should work without logging. The guard flushes the log file when
    // main returns, so every exit path below must return rather than exit.
    let _guard = init_logging(&log_config).ok();

    match execute_command(&cli, command) {
        Ok(Completion::Clean) => ExitCode::SUCCESS,
        Ok(Completion::WithFailures) => ExitCode::FAILURE,
        Err(e) if e.kind() == ErrorKind::LockContention => {
            warn!(error = %e, "Lock held by another run");
            eprintln!("{e}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Execute the CLI command
fn execute_command(cli: &Cli, command: &Commands) -> mpmigrate_cli::Result<Completion> {
    let config_path = cli.config.as_deref();

    match command {
        Commands::Select {
            source_dir,
            membership_file,
            dest_in_list,
            dest_not_in_list,
            match_mode,
            transfer_mode,
            format,
        } => commands::select::run(
            config_path,
            &SelectArgs {
                source_dir: source_dir.clone(),
                membership_file: membership_file.clone(),
                dest_in_list: dest_in_list.clone(),
                dest_not_in_list: dest_not_in_list.clone(),
                match_mode: *match_mode,
                transfer_mode: *transfer_mode,
                format: *format,
            },
        ),

        Commands::Migrate {
            series,
            no_iterate,
            settings,
            prune,
            format,
        } => commands::migrate::run(config_path, series, *no_iterate, settings, *prune, *format),

        Commands::Status {
            series,
            settings,
            format,
        } => commands::status::run(config_path, series, settings, *format).map(|()| Completion::Clean),

        Commands::Retry {
            series,
            item,
            yes,
            settings,
        } => commands::retry::run(config_path, series, item.as_deref(), *yes, settings)
            .map(|()| Completion::Clean),

        Commands::Config { command } => match command {
            ConfigCommand::Show { settings } => {
                commands::config::show(config_path, settings).map(|()| Completion::Clean)
            },
        },
    }
}
