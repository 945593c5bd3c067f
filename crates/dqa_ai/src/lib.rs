pub mod chain;
pub mod chunking;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod openai;
pub mod pipeline;
pub mod retrieve;
pub mod retry;
