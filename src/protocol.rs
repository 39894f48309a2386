//! Stream protocol: SSE decoding and event demultiplexing
//!
//! Every observed server variant (single JSON reply, incremental
//! `partial_answer` streams, terminal `answer` streams) is reduced to one
//! sequence of [`TaggedEvent`]s and classified by a single dispatch function.

mod event;
mod sse;

pub use event::{
    demultiplex, AnswerPayload, StreamEvent, TaggedEvent, TAG_ANSWER, TAG_ERROR,
    TAG_PARTIAL_ANSWER, TAG_REFERENCES,
};
pub use sse::SseDecoder;
