//! Answer generation over retrieved transcript chunks.
//!
//! A chat model answers the question from the excerpts and names the offset
//! where the answer is found; the link builder turns that offset into a
//! YouTube link that starts playback there.

mod chat;
mod generator;
mod link;

pub use chat::{ChatModel, OpenAIChatModel};
pub use generator::{
    format_context, parse_answer, AnswerGenerator, AnswerResult, GENERATION_FAILED_ANSWER,
};
pub use link::{LinkBuilder, TimestampLink};
