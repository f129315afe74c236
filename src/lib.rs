#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub mod classifier;
pub mod digest;
pub mod err;
pub mod html_output;
pub mod paginator;
pub mod report;
pub mod trace_event;
pub mod trace_parser;
mod utils;

pub use classifier::{
    ClassificationStats, ClassifiedTrace, DiskIoRecord, EventCategory, ImageLoadRecord,
    IoDirection, NormalizedRecord, ProcessRecord, ThreadRecord, classify_event,
};
pub use digest::{md5_file, md5_reader};
pub use html_output::{HtmlReport, ReportContext};
pub use paginator::{DEFAULT_CHUNK_SIZE, PageStats, Pagination, ReportPage};
pub use report::{ReportSettings, TraceReport, page_file_name};
pub use trace_event::{EventAttributes, RawEvent, SubRecord};
pub use trace_parser::TraceParser;
pub use utils::{TICKS_PER_SECOND, decode_tick_duration, ticks_to_duration};

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
