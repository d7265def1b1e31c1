//! Tracing subscriber initialisation for drsnap.
//!
//! Everything is driven by environment variables so the binary and the tests
//! share one code path:
//!
//! - `DRSNAP_LOG_LEVEL`: default filter when `RUST_LOG` is unset (`info`)
//! - `DRSNAP_LOG_OUTPUT`: `console`, `file` or `both` (`console`)
//! - `DRSNAP_LOG_FORMAT`: `human`, `json` or `compact` (`human`)
//! - `DRSNAP_LOG_FILE`: diagnostics file, rolled daily (`/tmp/drsnap.log`)
//! - `DRSNAP_LOG_FIELDS`: comma separated `key:value` span filters, e.g.
//!   `subscription:1234` to only see events recorded inside that subscription's span

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{field::Visit, span, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::{Context, Layer},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "/tmp/drsnap.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
    Compact,
}

/// A `key:value` pair an event's enclosing spans must carry to be emitted.
/// A value of `*` only requires the key to be present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFilter {
    pub key: String,
    pub value: String,
}

impl FieldFilter {
    fn matches(&self, fields: &HashMap<String, String>) -> bool {
        fields
            .get(&self.key)
            .is_some_and(|value| self.value == "*" || value.contains(&self.value))
    }
}

/// Parse `key:value,key:value`, skipping malformed entries.
pub fn parse_field_filters(spec: &str) -> Vec<FieldFilter> {
    spec.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(FieldFilter {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub file_path: PathBuf,
    pub field_filters: Vec<FieldFilter>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            format: LogFormat::Human,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
            field_filters: Vec::new(),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup. Unknown values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let output = match lookup("DRSNAP_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Console,
        };
        let format = match lookup("DRSNAP_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Human,
        };

        Self {
            level: lookup("DRSNAP_LOG_LEVEL").unwrap_or(defaults.level),
            output,
            format,
            file_path: lookup("DRSNAP_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
            field_filters: lookup("DRSNAP_LOG_FIELDS")
                .map(|spec| parse_field_filters(&spec))
                .unwrap_or_default(),
        }
    }

    /// Override the level, e.g. from a `--debug` flag.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

// --- Writer that duplicates output to two sinks ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

// --- Span field filtering ---
struct SpanFieldLayer {
    filters: Vec<FieldFilter>,
}

struct SpanFields(HashMap<String, String>);

impl<S> Layer<S> for SpanFieldLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = HashMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        span.extensions_mut().insert(SpanFields(fields));
    }

    fn enabled(&self, _meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        // With filters set, events outside any span are dropped.
        let Some(scope) = ctx.lookup_current().map(|span| span.scope()) else {
            return false;
        };

        let mut all_fields = HashMap::new();
        for span_ref in scope {
            if let Some(SpanFields(fields)) = span_ref.extensions().get::<SpanFields>() {
                for (k, v) in fields {
                    all_fields.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        self.filters.iter().all(|filter| filter.matches(&all_fields))
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

fn fmt_layer<S, W>(writer: W, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Human => layer.pretty().boxed(),
    }
}

fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if let Ok(directive) = "tokio=warn".parse() {
        filter = filter.add_directive(directive);
    }
    filter
}

/// Install the global subscriber described by `settings`.
///
/// Console output goes to stderr so stdout stays free for reports. The
/// returned guard must be kept alive for file output to be flushed.
pub fn init_subscriber(settings: &LogSettings) -> Option<WorkerGuard> {
    let subscriber = tracing_subscriber::registry()
        .with(build_filter(&settings.level))
        .with(SpanFieldLayer {
            filters: settings.field_filters.clone(),
        });

    let log_dir = settings
        .file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/tmp"));
    let log_filename = settings
        .file_path
        .file_name()
        .unwrap_or("drsnap.log".as_ref());

    let mut guard = None;
    let result = match settings.output {
        LogOutput::Console => subscriber
            .with(fmt_layer(io::stderr, settings.format, true))
            .try_init(),
        LogOutput::File => {
            let appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);
            subscriber
                .with(fmt_layer(non_blocking, settings.format, false))
                .try_init()
        }
        LogOutput::Both => {
            let appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);
            let tee = MakeTee {
                make_a: io::stderr,
                make_b: non_blocking,
            };
            subscriber
                .with(fmt_layer(tee, settings.format, false))
                .try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("drsnap: tracing already initialised: {e}");
    }
    guard
}
