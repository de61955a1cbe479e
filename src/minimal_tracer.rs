// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::{
    env,
    fmt::{self, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::{SecondsFormat, Utc};
use tracing::{field::Visit, Id, Level, Subscriber};
use tracing_core::Field;

const ENV_RUST_LOG: &str = "RUST_LOG";

pub struct StringVisitor<'a> {
    string: &'a mut String,
}

impl<'a> StringVisitor<'a> {
    pub(crate) fn new(string: &'a mut String) -> Self {
        StringVisitor { string }
    }
}

impl Visit for StringVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            _ = write!(self.string, "{value} ");
        } else {
            _ = write!(self.string, "{} = {:?}; ", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            _ = write!(self.string, "{value:?} ");
        } else {
            _ = write!(self.string, "{} = {:?}; ", field.name(), value);
        }
    }
}

#[derive(Debug, PartialEq)]
struct LogFilter {
    target: Option<String>,
    level: Level,
}

/// A `tracing` subscriber that writes events to stderr, filtered by `RUST_LOG`.
///
/// `RUST_LOG` is a comma separated list of `level` or `target=level` directives. An event passes
/// when its level is at or above the level of a matching directive. Without `RUST_LOG`, `info` and
/// above are written.
pub struct MinimalTracer {
    filters: Vec<LogFilter>,
}

fn string_to_level(string: &str) -> Option<Level> {
    match string.trim().to_lowercase().as_str() {
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "warn" | "warning" => Some(Level::WARN),
        "trace" => Some(Level::TRACE),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn parse_filters(env_value: &str) -> Vec<LogFilter> {
    let mut filters: Vec<LogFilter> = Vec::with_capacity(10);
    for directive in env_value.split(',').filter(|d| !d.trim().is_empty()) {
        if let Some((target, level)) = directive.split_once('=') {
            filters.push(LogFilter {
                target: Some(target.trim().to_string()),
                level: string_to_level(level).unwrap_or(Level::TRACE),
            });
        } else if let Some(level) = string_to_level(directive) {
            filters.push(LogFilter {
                target: None,
                level,
            });
        } else {
            filters.push(LogFilter {
                target: Some(directive.trim().to_string()),
                level: Level::TRACE,
            });
        }
    }
    filters
}

impl MinimalTracer {
    fn new(env_value: Option<&str>) -> Self {
        let filters = match env_value {
            Some(env_value) => parse_filters(env_value),
            None => vec![LogFilter {
                target: None,
                level: Level::INFO,
            }],
        };
        MinimalTracer { filters }
    }

    pub fn register() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
        let env_value = env::var(ENV_RUST_LOG).ok();
        tracing::subscriber::set_global_default(MinimalTracer::new(env_value.as_deref()))
    }

    fn is_enabled(&self, level: &Level, target: &str) -> bool {
        self.filters.iter().any(|filter| {
            // Level orders verbose levels as greater: TRACE > DEBUG > ... > ERROR
            level <= &filter.level
                && filter
                    .target
                    .as_ref()
                    .map(|t| target.starts_with(t.as_str()))
                    .unwrap_or(true)
        })
    }
}

static AUTO_ID: AtomicUsize = AtomicUsize::new(1);

impl Subscriber for MinimalTracer {
    fn enabled(&self, metadata: &tracing::Metadata<'_>) -> bool {
        self.is_enabled(metadata.level(), metadata.target())
    }

    fn new_span(&self, _span: &tracing_core::span::Attributes<'_>) -> tracing_core::span::Id {
        Id::from_u64(AUTO_ID.fetch_add(1, Ordering::Relaxed) as u64)
    }

    fn record(&self, _span: &tracing_core::span::Id, _values: &tracing_core::span::Record<'_>) {}

    fn record_follows_from(
        &self,
        _span: &tracing_core::span::Id,
        _follows: &tracing_core::span::Id,
    ) {
    }

    fn event(&self, event: &tracing::Event<'_>) {
        let metadata = event.metadata();

        let level = metadata.level();
        let target = metadata.target();

        let mut text = String::new();

        let mut visitor = StringVisitor::new(&mut text);
        event.record(&mut visitor);

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        eprintln!("{now} {level} {target}: {}", text.trim_end());
    }

    fn enter(&self, _span: &tracing_core::span::Id) {}

    fn exit(&self, _span: &tracing_core::span::Id) {}
}
