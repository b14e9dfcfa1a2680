//! Tracing utilities for query and transaction observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// quickdata_trace_query!(&sql_str, params.len());
/// ```
#[macro_export]
macro_rules! quickdata_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "quickdata.query");
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin, commit, rollback).
///
/// ```ignore
/// quickdata_trace_tx!("begin", "sqlite.rusqlite");
/// quickdata_trace_tx!("rollback", "memory");
/// ```
#[macro_export]
macro_rules! quickdata_trace_tx {
    ($event:literal, $driver:literal) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, driver = $driver, "quickdata.transaction");
    };
}

/// Emit a debug-level event for a repository or sync operation.
///
/// ```ignore
/// quickdata_trace_op!("create", entity = "posts", id = 4);
/// ```
#[macro_export]
macro_rules! quickdata_trace_op {
    ($op:literal $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(op = $op $(, $key = %$value)*, "quickdata.op");
    };
}

/// Emit a warn-level event for input that was skipped rather than rejected.
#[macro_export]
macro_rules! quickdata_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)+);
    };
}
