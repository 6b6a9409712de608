//! Cross-cutting runtime plumbing: injected time and id generation.

mod runtime_context;

pub use runtime_context::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
