use tiktoken_rs::CoreBPE;

use super::{Tokenizer, TokenizerSource};
use crate::error::AppError;

/// BPE tokenizers bundled with `tiktoken-rs`; `text-embedding-ada-002` maps to `cl100k_base`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiktokenSource;

struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl TokenizerSource for TiktokenSource {
    fn acquire(&self, model: &str) -> Result<Box<dyn Tokenizer>, AppError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            AppError::new("TOKENIZER_UNAVAILABLE", "Failed to load tokenizer for model")
                .with_details(format!("model={model}; err={e}"))
        })?;
        Ok(Box::new(TiktokenTokenizer { bpe }))
    }
}
