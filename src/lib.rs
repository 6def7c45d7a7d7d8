//! ETL pipeline for music streaming event data.
//!
//! Transforms newline-delimited JSON records (listening sessions and song
//! catalog metadata) into a dimensional warehouse schema: a `songplays`
//! fact table plus `users`, `songs`, `artists` and `time` dimensions.
//!
//! Two load strategies share the same mapping rules:
//! - row-wise: per-record inserts with a lookup query resolving each fact
//!   row's song/artist keys, committed per input file
//! - set-wise: bulk COPY of raw files into staging tables followed by
//!   INSERT-SELECT transforms executed inside the engine

pub mod config;
pub mod errors;
pub mod loader;
pub mod mapper;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod schema;
