// Event types for async communication

use uuid::Uuid;

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Aborted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// A piece of text decoded from the stream
    Chunk(String),
    /// The generation reached a terminal state
    Finished(Outcome),
}

/// An event tagged with the session that produced it, so late events from a
/// torn-down session can be told apart from the current one.
#[derive(Debug, Clone)]
pub struct AppEvent {
    pub session: Uuid,
    pub event: GenerationEvent,
}

impl AppEvent {
    pub const fn new(session: Uuid, event: GenerationEvent) -> Self {
        Self { session, event }
    }
}
