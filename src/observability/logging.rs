//! Structured JSON logging with request-scoped context.
//!
//! # Responsibilities
//! - Emit one JSON object per log call: level, timestamp, message, fields
//! - Carry correlation context (request id, user id, ip) across a request
//! - Time operations with checkpoint/end semantics
//!
//! # Design Decisions
//! - Level filtering happens before any serialization work
//! - Call-specific fields win over request context on key collision
//! - Null-valued fields are stripped before serialization
//! - Errors go to the error sink, everything else to the standard sink;
//!   ANSI color only on an interactive terminal, never on piped output
//! - Logging never returns errors and never panics in release paths

use std::fmt;
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{Map, Value};

/// Log severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a configured level; unknown values fall back to `info`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    fn ansi_color(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[90m",
            LogLevel::Info => "\x1b[36m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, level: LogLevel, line: &str);
}

/// Default sink: errors to stderr, everything else to stdout.
#[derive(Debug, Default)]
pub struct StdioSink;

impl LogSink for StdioSink {
    fn write_line(&self, level: LogLevel, line: &str) {
        let colorize = !cfg!(test)
            && match level {
                LogLevel::Error => std::io::stderr().is_terminal(),
                _ => std::io::stdout().is_terminal(),
            };

        let rendered = if colorize {
            format!("{}{}\x1b[0m", level.ansi_color(), line)
        } else {
            line.to_string()
        };

        // a failed write is swallowed: logging must never take a request down
        if level == LogLevel::Error {
            let _ = writeln!(std::io::stderr(), "{rendered}");
        } else {
            let _ = writeln!(std::io::stdout(), "{rendered}");
        }
    }
}

/// Capturing sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().expect("log sink mutex poisoned").clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, level: LogLevel, line: &str) {
        self.lines
            .lock()
            .expect("log sink mutex poisoned")
            .push((level, line.to_string()));
    }
}

/// Level-filtered JSON event emitter.
pub struct StructuredLogger {
    min_level: LogLevel,
    sink: Arc<dyn LogSink>,
}

impl StructuredLogger {
    pub fn new(min_level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self { min_level, sink }
    }

    pub fn stdio(min_level: LogLevel) -> Self {
        Self::new(min_level, Arc::new(StdioSink))
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Emit one record. Context fields are merged first, call-specific
    /// fields second, so call fields win on collision.
    fn emit(&self, level: LogLevel, message: &str, context: &Map<String, Value>, fields: Map<String, Value>) {
        if !self.enabled(level) {
            return;
        }

        let mut record = Map::new();
        record.insert("level".into(), Value::String(level.as_str().into()));
        record.insert(
            "timestamp".into(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        record.insert("message".into(), Value::String(message.into()));

        for (key, value) in context.iter().chain(fields.iter()) {
            if !value.is_null() {
                record.insert(key.clone(), value.clone());
            }
        }

        match serde_json::to_string(&Value::Object(record)) {
            Ok(line) => self.sink.write_line(level, &line),
            Err(_) => {} // unserializable field: drop the record, never fail
        }
    }

    pub fn log(&self, level: LogLevel, message: &str, fields: Map<String, Value>) {
        self.emit(level, message, &Map::new(), fields);
    }

    pub fn debug(&self, message: &str, fields: Map<String, Value>) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Map<String, Value>) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Map<String, Value>) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Map<String, Value>) {
        self.log(LogLevel::Error, message, fields);
    }
}

/// Build a field map from `(key, value)` pairs.
#[macro_export]
macro_rules! log_fields {
    ($($key:literal => $value:expr),* $(,)?) => {{
        let mut map = serde_json::Map::new();
        $(map.insert($key.to_string(), serde_json::json!($value));)*
        map
    }};
}

/// Request-scoped logger carrying a fixed request id plus mutable context.
pub struct RequestLogger {
    logger: Arc<StructuredLogger>,
    request_id: String,
    context: Mutex<Map<String, Value>>,
}

impl RequestLogger {
    pub fn new(logger: Arc<StructuredLogger>, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let mut context = Map::new();
        context.insert("request_id".into(), Value::String(request_id.clone()));
        Self {
            logger,
            request_id,
            context: Mutex::new(context),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Merge additional fields into the context. Not retroactive: only log
    /// calls made after this see the new fields.
    pub fn set_context(&self, fields: Map<String, Value>) {
        let mut context = self.context.lock().expect("log context mutex poisoned");
        for (key, value) in fields {
            if !value.is_null() {
                context.insert(key, value);
            }
        }
    }

    fn context_snapshot(&self) -> Map<String, Value> {
        self.context.lock().expect("log context mutex poisoned").clone()
    }

    pub fn log(&self, level: LogLevel, message: &str, fields: Map<String, Value>) {
        self.logger.emit(level, message, &self.context_snapshot(), fields);
    }

    pub fn request_start(&self, method: &str, path: &str) {
        self.log(
            LogLevel::Info,
            "request started",
            log_fields! { "method" => method, "path" => path },
        );
    }

    /// Log request completion. Severity follows the status code:
    /// 5xx → error, 4xx → warn, else info.
    pub fn request_end(&self, method: &str, path: &str, status: u16, duration_ms: u64) {
        let level = if status >= 500 {
            LogLevel::Error
        } else if status >= 400 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        self.log(
            level,
            "request completed",
            log_fields! {
                "method" => method,
                "path" => path,
                "status" => status,
                "duration_ms" => duration_ms,
                "status_class" => format!("{}xx", status / 100),
            },
        );
    }

    pub fn auth_event(&self, event: &str, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        self.log(
            level,
            "auth event",
            log_fields! { "event" => event, "success" => success },
        );
    }

    pub fn db_operation(&self, operation: &str, table: &str, duration_ms: u64, success: bool) {
        let level = if success { LogLevel::Debug } else { LogLevel::Warn };
        self.log(
            level,
            "db operation",
            log_fields! {
                "operation" => operation,
                "table" => table,
                "duration_ms" => duration_ms,
                "success" => success,
            },
        );
    }

    pub fn external_call(&self, service: &str, operation: &str, duration_ms: u64, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        self.log(
            level,
            "external call",
            log_fields! {
                "service" => service,
                "operation" => operation,
                "duration_ms" => duration_ms,
                "success" => success,
            },
        );
    }

    /// Start a timer scoped to this request's context.
    pub fn timer(&self, operation: &str) -> Timer {
        let mut context = self.context_snapshot();
        context.insert("operation".into(), Value::String(operation.into()));
        Timer {
            logger: self.logger.clone(),
            context,
            start: Instant::now(),
        }
    }
}

/// Operation timer producing debug checkpoints and a tagged final record.
pub struct Timer {
    logger: Arc<StructuredLogger>,
    context: Map<String, Value>,
    start: Instant,
}

impl Timer {
    /// Log elapsed time without ending the timer.
    pub fn checkpoint(&self, label: &str) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        self.logger.emit(
            LogLevel::Debug,
            "checkpoint",
            &self.context,
            log_fields! { "label" => label, "elapsed_ms" => elapsed_ms },
        );
    }

    /// Log total elapsed time and return it.
    pub fn end(self, mut extra: Map<String, Value>) -> u64 {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let performance = if elapsed_ms < 1_000 {
            "fast"
        } else if elapsed_ms < 5_000 {
            "normal"
        } else {
            "slow"
        };
        extra.insert("elapsed_ms".into(), Value::from(elapsed_ms));
        extra.insert("performance".into(), Value::String(performance.into()));
        self.logger
            .emit(LogLevel::Info, "operation completed", &self.context, extra);
        elapsed_ms
    }
}
