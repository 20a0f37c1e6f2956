use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Initialize the tracing subscriber with optional JSON output.
///
/// Logs go to stderr, leaving stdout to the readout, unless `log_file` is
/// given. The returned guard must be held until exit to flush file output.
pub fn init_tracing(json_output: bool, log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,speedo=debug,speedo_core=debug"));

    let (writer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "log file path has no file name")
            })?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(io::stderr), None),
    };
    let ansi = log_file.is_none();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json_output {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).with(filter).init();
    Ok(guard)
}
