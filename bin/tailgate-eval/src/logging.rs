//! Logging.

use std::fmt::{self, Write as _};

use anyhow::{anyhow, Context as _};
use serde::Deserialize;
use tailgate_config::GenericConfiguration;
use tracing::{field, level_filters::LevelFilter, Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::Writer,
        time::{FormatTime as _, SystemTime},
        FmtContext, FormatEvent, FormatFields, Layer,
    },
    layer::SubscriberExt as _,
    registry::LookupSpan,
    util::SubscriberInitExt as _,
    EnvFilter, Layer as _,
};

const APP_NAME: &str = "TAILGATE";

fn default_log_level() -> LogLevel {
    LogLevel(EnvFilter::default().add_directive(LevelFilter::INFO.into()))
}

/// Logging configuration.
///
/// Read from the top-level `log_level` and `log_format_json` settings, which map to the `TAILGATE_LOG_LEVEL` and
/// `TAILGATE_LOG_FORMAT_JSON` environment variables.
#[derive(Deserialize)]
pub struct LoggingConfiguration {
    #[serde(default = "default_log_level")]
    log_level: LogLevel,

    #[serde(default)]
    log_format_json: bool,
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` from the given configuration.
    pub fn from_configuration(config: &GenericConfiguration) -> anyhow::Result<Self> {
        config
            .as_typed()
            .context("Failed to load logging configuration.")
    }
}

#[derive(Deserialize)]
#[serde(try_from = "String")]
struct LogLevel(EnvFilter);

impl TryFrom<String> for LogLevel {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(anyhow!("Log level cannot be empty."));
        }

        EnvFilter::builder()
            .parse(value)
            .map(Self)
            .context("Failed to parse valid log level.")
    }
}

/// Initializes the logging subsystem for `tracing`.
///
/// Logs are written to standard error, either as JSON or in a pipe-delimited, human-readable format.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error is returned.
pub fn initialize_logging(config: LoggingConfiguration) -> anyhow::Result<()> {
    let formatting_layer = if config.log_format_json {
        Layer::new()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        Layer::new()
            .event_format(PipeDelimitedFormatter)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(formatting_layer.with_filter(config.log_level.0))
        .try_init()
        .context("Failed to initialize logging.")
}

/// Formats events as `<time> | TAILGATE | <level> | <target> | key=value ... | <message>`.
struct PipeDelimitedFormatter;

impl<S, N> FormatEvent<S, N> for PipeDelimitedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let mut parts = EventParts::default();
        event.record(&mut parts);

        SystemTime.format_time(&mut writer)?;
        let level = event.metadata().level();
        write!(writer, " | {} | {} | {}", APP_NAME, level, event.metadata().target())?;
        if !parts.fields.is_empty() {
            write!(writer, " |{}", parts.fields)?;
        }
        writeln!(writer, " | {}", parts.message)
    }
}

/// Message and structured fields of a single event, rendered as text.
#[derive(Default)]
struct EventParts {
    message: String,
    fields: String,
}

impl EventParts {
    fn push(&mut self, field: &field::Field, value: fmt::Arguments<'_>) {
        // Writing into a `String` cannot fail.
        if field.name() == "message" {
            let _ = self.message.write_fmt(value);
        } else {
            let _ = write!(self.fields, " {}=", field.name());
            let _ = self.fields.write_fmt(value);
        }
    }
}

impl field::Visit for EventParts {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.push(field, format_args!("{}", value));
        } else {
            self.push(field, format_args!("{:?}", value));
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        self.push(field, format_args!("{:?}", value));
    }
}
