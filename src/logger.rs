//!
//! Log output stamped with virtual time.
//!
//! The default `tracing` formatters print wall-clock timestamps, which are
//! meaningless inside a simulation. This module provides an opt-in
//! subscriber whose records are stamped with [`SimTime::now`] instead,
//! filtered through the usual `RUST_LOG` environment variable.
//!

use std::fmt;

use nu_ansi_term::Color;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::Writer, FmtContext, FormatEvent, FormatFields,
    },
    registry::LookupSpan,
    EnvFilter,
};

use crate::time::SimTime;

/// An event formatter that stamps records with the current simulation time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimTimeFormat;

fn level_color(level: Level) -> Color {
    match level {
        Level::ERROR => Color::Red,
        Level::WARN => Color::Yellow,
        Level::INFO => Color::Green,
        Level::DEBUG => Color::Cyan,
        Level::TRACE => Color::Magenta,
    }
}

impl<S, N> FormatEvent<S, N> for SimTimeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "[ {} ] {} {}: ",
            Color::DarkGray.paint(format!("{}", SimTime::now())),
            level_color(*meta.level()).paint(meta.level().as_str()),
            meta.target(),
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs a global subscriber using [`SimTimeFormat`] and the default
/// env filter.
///
/// # Errors
///
/// Fails if another global subscriber is already installed.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(SimTimeFormat)
        .try_init()
}

/// Installs a global subscriber using [`SimTimeFormat`] and the default
/// env filter.
///
/// # Panics
///
/// Panics if another global subscriber is already installed.
pub fn init() {
    try_init().expect("failed to install global log subscriber");
}
