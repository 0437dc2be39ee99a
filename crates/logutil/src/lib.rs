//! Shared logging setup for binaries and tests.
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Compact,
    /// Newline delimited json.
    Json,
}

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` directives take precedence over `default_level`. Stdout is left
/// alone so table output stays clean.
pub fn configure_global_logger(
    default_level: Level,
    format: LogFormat,
) -> Result<(), SetGlobalDefaultError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
}

/// Verbosity count from the command line to a default level.
pub fn level_from_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(Level::WARN, level_from_verbosity(0));
        assert_eq!(Level::DEBUG, level_from_verbosity(2));
        assert_eq!(Level::TRACE, level_from_verbosity(9));
    }
}
