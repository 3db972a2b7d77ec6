pub mod accumulator;
pub mod factory;
pub mod openai;
pub mod retry;

pub use accumulator::StreamAccumulator;
pub use factory::create_provider;
pub use openai::{OpenAiTransport, SamplingParams};
pub use retry::{RetryPolicy, RetryingProvider};
