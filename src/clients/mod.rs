pub mod ollama;

pub use ollama::{OllamaReviewer, ReviewError, Reviewer, review_text};
