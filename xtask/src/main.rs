//! Build automation tasks for mpmigrate
//!
//! This tool provides automation tasks for the mpmigrate workspace:
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for mpmigrate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<mpmigrate_cli::Cli>();

    let content = format!(
        r#"# mpmigrate CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

mpmigrate moves media packages into single-slot ingest queues, one bundle per
invocation. Progress is kept in `ingested` and `failed` marker files next to
the data, so it is safe to run from cron as often as you like.

## Quick Start

```bash
# Move the next bundle of a source tree into its queue
mpmigrate select /srv/export /srv/lists/archive.txt /srv/queues/archive /srv/queues/default

# Migrate the next pending item of a list of series
mpmigrate migrate @/srv/lists/series.txt

# One attempt only
mpmigrate migrate @/srv/lists/series.txt --no-iterate

# Progress overview
mpmigrate status @/srv/lists/series.txt

# Return failed items to pending
mpmigrate retry SERIES-1 --yes
```

## Commands

{}

## Environment Variables

- `MPMIGRATE_CONFIG` - Configuration file
- `MPMIGRATE_WORK_ROOT` - Root of the series tree
- `MPMIGRATE_MEMBERSHIP_FILE` - Membership list used for routing
- `MPMIGRATE_DEST_IN_LIST` - Queue for items on the membership list
- `MPMIGRATE_DEST_NOT_IN_LIST` - Queue for every other item
- `MPMIGRATE_LOCK_FILE` - Process lock file
- `MPMIGRATE_MATCH_MODE` - `exact` (default) or `substring`
- `MPMIGRATE_TRANSFER_MODE` - `move` (default) or `copy`
- `MPMIGRATE_LOG_DIR` - Directory for daily rolling log files
- `LOG_LEVEL`, `LOG_FORMAT`, `LOG_FILTER` - Logging overrides

## Configuration

Settings are read from `~/.config/mpmigrate/config.toml` (or `--config FILE`),
then environment variables, then command-line flags.

```toml
work_root = "/srv/migration"
membership_file = "/srv/lists/archive.txt"
dest_in_list = "/srv/queues/archive"
dest_not_in_list = "/srv/queues/default"
lock_file = "/run/mpmigrate/mpmigrate.pid"
match_mode = "exact"
transfer_mode = "move"
prune_ingested = false

[markers]
ingested = "ingested"
failed = "failed"
```

## Exit Codes

- `0` - Success, nothing to do, queues busy, or another run in progress
- `1` - Configuration or list errors, or a failed transfer
- `2` - Usage errors

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    // Create output directory if it doesn't exist
    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the generated documentation");
    println!("  2. Commit it to version control");

    Ok(())
}
