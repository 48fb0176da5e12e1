//! Core reasonfeed library (stream ingest, reasoning tree, transcript merge).

pub mod api;
pub mod config;
pub mod correlator;
pub mod engine;
pub mod error;
pub mod history;
pub mod payload;
pub mod stream;
pub mod tree;
pub mod view;
