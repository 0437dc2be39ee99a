mod commands;

use std::path::PathBuf;

use batchview_ipc::format::TableFormat;
use batchview_ipc::IpcMode;
use clap::{Args, Parser, Subcommand};
use logutil::LogFormat;

/// Print the contents of Arrow IPC files and streams.
#[derive(Debug, Parser)]
#[command(name = "batchview", version)]
struct Cli {
    /// Increase log verbosity, repeat for more. `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as json.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a file or stream and print it as a table.
    Show(ShowArgs),
    /// Print the schema.
    Schema(SourceArgs),
    /// Write a small id/name table, useful for trying things out.
    Sample(SampleArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    path: PathBuf,

    /// IPC framing of the input, `file` or `stream`.
    #[arg(long)]
    mode: IpcMode,

    /// Memory map the input instead of reading it through a buffer.
    #[arg(long)]
    mmap: bool,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Only read the first batch.
    #[arg(long)]
    first: bool,

    /// Fail if the input has no batches.
    #[arg(long)]
    require_rows: bool,

    /// Output format, `pretty`, `frame` or `tsv`.
    #[arg(long, default_value_t = TableFormat::Pretty)]
    format: TableFormat,

    /// Column indices to keep, comma separated.
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<usize>>,
}

#[derive(Debug, Args)]
struct SampleArgs {
    path: PathBuf,

    #[arg(long)]
    mode: IpcMode,

    #[arg(long, default_value_t = 1)]
    batches: usize,

    #[arg(long, default_value_t = 3)]
    rows: usize,
}

fn main() {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) =
        logutil::configure_global_logger(logutil::level_from_verbosity(cli.verbose), format)
    {
        eprintln!("Failed to configure logging: {e}");
    }

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Command::Show(args) => commands::show(
            &mut stdout,
            commands::ShowOptions {
                path: args.source.path,
                mode: args.source.mode,
                mmap: args.source.mmap,
                first_only: args.first,
                require_rows: args.require_rows,
                format: args.format,
                projection: args.columns,
            },
        ),
        Command::Schema(args) => {
            commands::schema(&mut stdout, args.path, args.mode, args.mmap)
        }
        Command::Sample(args) => commands::sample(
            &mut stdout,
            &args.path,
            args.mode,
            args.batches,
            args.rows,
        ),
    };

    if let Err(e) = result {
        tracing::debug!(kind = %e.kind(), "command failed");
        eprintln!("Error: {e}");
        if let Some(backtrace) = e.get_backtrace() {
            eprintln!("{backtrace}");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_show() {
        let cli = Cli::try_parse_from([
            "batchview",
            "show",
            "data.arrow",
            "--mode",
            "stream",
            "--format",
            "tsv",
            "--columns",
            "0,2",
            "-vv",
        ])
        .unwrap();

        assert_eq!(2, cli.verbose);
        match cli.command {
            Command::Show(args) => {
                assert_eq!(IpcMode::Stream, args.source.mode);
                assert_eq!(TableFormat::Tsv, args.format);
                assert!(!args.source.mmap);
                assert_eq!(Some(vec![0, 2]), args.columns);
                assert!(!args.first);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_schema_mapped() {
        let cli =
            Cli::try_parse_from(["batchview", "schema", "data.arrow", "--mode", "File", "--mmap"])
                .unwrap();
        match cli.command {
            Command::Schema(args) => {
                assert_eq!(IpcMode::File, args.mode);
                assert!(args.mmap);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_mode_rejected() {
        assert!(
            Cli::try_parse_from(["batchview", "show", "data.arrow", "--mode", "feather"]).is_err()
        );
    }

    #[test]
    fn mode_is_required() {
        assert!(Cli::try_parse_from(["batchview", "show", "data.arrow"]).is_err());
    }
}
