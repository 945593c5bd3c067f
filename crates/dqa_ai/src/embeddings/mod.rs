use dqa_core::error::AppError;

pub trait Embedder: Send + Sync {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;

    /// Vector width the model is known to produce, if any.
    fn dimensions(&self, model: &str) -> Option<u32> {
        known_dimensions(model)
    }
}

pub fn known_dimensions(model: &str) -> Option<u32> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

pub mod openai_embed;
