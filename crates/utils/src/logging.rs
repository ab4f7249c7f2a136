//! provides logging helpers

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Redirects the diagnostic log to a file instead of stderr when set.
pub const LOG_PATH_ENV_VAR: &str = "LOG_PATH";

/// Builds the human readable fmt layer.
///
/// Writes to `log_path` (appending, never rotated) when given and
/// creatable, otherwise to stderr. Filtering is left to the caller.
pub fn get_fmt_layer<S>(log_path: Option<String>) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match log_path.as_deref().and_then(log_file_appender) {
        Some(appender) => layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .boxed(),
        None => layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    }
}

fn log_file_appender(path: &str) -> Option<RollingFileAppender> {
    let path = Path::new(path);
    let file_name = path.file_name()?.to_str()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
    {
        Ok(appender) => Some(appender),
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", path.display());
            None
        }
    }
}
