use config::Environment;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::Error;
use std::panic::PanicHookInfo;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{self, InitError};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Maximum number of rotated log files kept on disk.
const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] Error),
}

/// Keeps the background log writer alive. Buffered logs are flushed when dropped.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Call this function once at the beginning of a test and then set the ENABLE_TRACING
/// environment variable to 1 to view tracing in the terminal:
///
/// ENABLE_TRACING=1 cargo test <test_name>
///
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            Environment::Dev.set();
            let _log_flusher =
                init_tracing("test", None).expect("Failed to initialize tracing for tests");
        }
    });
}

/// Initializes tracing for the application.
///
/// When `log_file` is `Some((dir, prefix))`, events are written to a daily rolling file
/// in `dir` whose name starts with `prefix`. Otherwise they go to stderr, since stdout
/// may carry change events. Production emits JSON, development emits pretty lines.
pub fn init_tracing(
    app_name: &str,
    log_file: Option<(&Path, &str)>,
) -> Result<LogFlusher, TracingError> {
    // Captures records emitted through the `log` crate by the database drivers.
    LogTracer::init()?;

    let is_prod = Environment::load()?.is_prod();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = match log_file {
        Some((dir, prefix)) => {
            let (writer, guard) = rolling_file_writer(dir, prefix)?;
            install_subscriber(filter, writer, is_prod, false)?;

            LogFlusher::Flusher(guard)
        }
        None => {
            install_subscriber(filter, std::io::stderr, is_prod, !is_prod)?;

            LogFlusher::NullFlusher
        }
    };

    set_tracing_panic_hook();

    ::tracing::info!(app_name, is_prod, "tracing initialized");

    Ok(log_flusher)
}

fn rolling_file_writer(
    dir: &Path,
    prefix: &str,
) -> Result<(NonBlocking, WorkerGuard), TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(prefix)
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;

    Ok(tracing_appender::non_blocking(file_appender))
}

fn install_subscriber<W>(
    filter: EnvFilter,
    writer: W,
    json: bool,
    ansi: bool,
) -> Result<(), TracingError>
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    if json {
        let subscriber = Registry::default().with(filter).with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .json()
                .with_current_span(true)
                .with_span_list(true),
        );
        set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(filter).with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .pretty(),
        );
        set_global_default(subscriber)?;
    }

    Ok(())
}

fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

/// Logs the panic payload, location and backtrace as a structured event.
fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    ::tracing::error!(
        panic.payload = payload,
        panic.location = location,
        panic.backtrace = backtrace.map(::tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}
