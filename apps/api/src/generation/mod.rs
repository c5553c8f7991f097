// Résumé optimization: prompt construction, reply decoding and markdown cleanup.
// The backend call itself goes through llm_client.

pub mod markdown;
pub mod prompts;
pub mod response;

pub use markdown::normalize;
pub use prompts::GenerationRequest;
pub use response::{parse_reply, ParseError};
