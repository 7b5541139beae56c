//! The request-scoped logger collaborator.
//!
//! Every request carries a [`LoggerHandle`] in its
//! [`RequestState`](crate::RequestState). Handles are cheap to clone and can be
//! derived with permanent attributes (the request id is attached this way), so
//! every record emitted during a request is correlated.
//!
//! The default backend is [`TracingLogger`], which forwards records to the
//! `tracing` ecosystem. Tests swap in
//! [`RecordingLogger`](crate::fixtures::RecordingLogger).

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Severity of a log record.
///
/// The runtime layer only ever needs three levels: `Debug` for expected
/// events, `Warn` for server-class failures that were still classified, and
/// `Critical` for errors that carried no safety contract at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Expected, low-importance events.
    Debug,
    /// Classified server-side failures.
    Warn,
    /// Unexpected failures that need operator attention.
    Critical,
}

impl Severity {
    /// Returns the lowercase name of the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Warn => "warn",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured key-value attribute attached to a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    key: Cow<'static, str>,
    value: String,
}

impl Attr {
    /// Creates an attribute from any displayable value.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// Returns the attribute key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the rendered attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)
    }
}

/// A structured, leveled logger backend.
///
/// Implementations must tolerate concurrent calls from many requests.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Emits one record. Permanent attributes come before `attrs`.
    fn log(&self, severity: Severity, event: &str, attrs: &[Attr]);

    /// Derives a logger that adds `attr` to every record it emits.
    fn with_attr(&self, attr: Attr) -> Arc<dyn Logger>;
}

/// Shared handle to a [`Logger`].
#[derive(Debug, Clone)]
pub struct LoggerHandle(Arc<dyn Logger>);

impl LoggerHandle {
    /// Wraps a logger backend.
    pub fn new(logger: impl Logger + 'static) -> Self {
        Self(Arc::new(logger))
    }

    /// Wraps an already shared logger backend.
    #[must_use]
    pub fn from_arc(logger: Arc<dyn Logger>) -> Self {
        Self(logger)
    }

    /// Returns a handle to the `tracing` backed root logger.
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(TracingLogger::default())
    }

    /// Derives a handle that always carries `key=value`.
    #[must_use]
    pub fn with(&self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        Self(self.0.with_attr(Attr::new(key, value)))
    }

    /// Emits a record at the given severity.
    pub fn log(&self, severity: Severity, event: &str, attrs: &[Attr]) {
        self.0.log(severity, event, attrs);
    }

    /// Emits a debug record.
    pub fn debug(&self, event: &str, attrs: &[Attr]) {
        self.log(Severity::Debug, event, attrs);
    }

    /// Emits a warning record.
    pub fn warn(&self, event: &str, attrs: &[Attr]) {
        self.log(Severity::Warn, event, attrs);
    }

    /// Emits a critical record.
    pub fn critical(&self, event: &str, attrs: &[Attr]) {
        self.log(Severity::Critical, event, attrs);
    }
}

impl Default for LoggerHandle {
    fn default() -> Self {
        Self::tracing()
    }
}

/// Attribute keys emitted as first-class `tracing` fields.
///
/// Any other key is rendered into the single `attrs` field, since `tracing`
/// field names are fixed at the call site.
pub const STRUCTURED_KEYS: [&str; 10] = [
    "request_id",
    "node_id",
    "uri",
    "method",
    "rip",
    "function",
    "rtt",
    "uid",
    "scope",
    "err",
];

/// [`Logger`] backend that forwards records to `tracing`.
///
/// The event name and every key in [`STRUCTURED_KEYS`] become real fields,
/// so JSON output can be filtered by `request_id`. `Critical` maps to
/// `tracing::error!` with `critical = true` so log pipelines can alert on it
/// separately from ordinary errors.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    attrs: Vec<Attr>,
}

impl TracingLogger {
    /// Creates a root logger with no permanent attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record<'a>(&'a self, attrs: &'a [Attr]) -> Record<'a> {
        Record {
            attrs: self.attrs.iter().chain(attrs).collect(),
        }
    }
}

/// Permanent attributes followed by call-site ones.
struct Record<'a> {
    attrs: Vec<&'a Attr>,
}

impl<'a> Record<'a> {
    /// Value of `key`; a call-site attribute shadows a permanent one.
    fn field(&self, key: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .rev()
            .copied()
            .find(|attr| attr.key() == key)
            .map(Attr::value)
    }

    fn rest(&self) -> Option<String> {
        let rest: Vec<String> = self
            .attrs
            .iter()
            .filter(|attr| !STRUCTURED_KEYS.contains(&attr.key()))
            .map(ToString::to_string)
            .collect();
        (!rest.is_empty()).then(|| rest.join(" "))
    }
}

macro_rules! emit {
    ($level:expr, $event:expr, $record:expr $(, $flag:ident = $value:expr)?) => {{
        let record = $record;
        let rest = record.rest();
        tracing::event!(
            $level,
            $($flag = $value,)?
            event = %$event,
            request_id = record.field("request_id"),
            node_id = record.field("node_id"),
            uri = record.field("uri"),
            method = record.field("method"),
            rip = record.field("rip"),
            function = record.field("function"),
            rtt = record.field("rtt"),
            uid = record.field("uid"),
            scope = record.field("scope"),
            err = record.field("err"),
            attrs = rest.as_deref(),
        )
    }};
}

impl Logger for TracingLogger {
    fn log(&self, severity: Severity, event: &str, attrs: &[Attr]) {
        let record = self.record(attrs);
        match severity {
            Severity::Debug => emit!(tracing::Level::DEBUG, event, record),
            Severity::Warn => emit!(tracing::Level::WARN, event, record),
            Severity::Critical => emit!(tracing::Level::ERROR, event, record, critical = true),
        }
    }

    fn with_attr(&self, attr: Attr) -> Arc<dyn Logger> {
        let mut attrs = self.attrs.clone();
        attrs.push(attr);
        Arc::new(Self { attrs })
    }
}
