//! Clippy widget core
//!
//! Headless core of an embeddable question-answering widget: a pure state
//! machine, a stream protocol demultiplexer, an answer accumulator, citation
//! resolution, and a cancellable stream session controller, driven by a
//! single runtime task and exposed to renderers over HTTP.

pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod references;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod transport;
