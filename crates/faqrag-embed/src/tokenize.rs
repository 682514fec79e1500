use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use faqrag_core::{Error, Result};

// [PAD] in BERT uncased vocabularies.
const PAD_ID: u32 = 0;

/// Tokenized batch ready for a BERT forward pass, all `[B, T]`.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Tokenize `texts`, truncate each to `max_len` and right-pad to the longest
/// sequence in the batch.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    device: &Device,
) -> Result<TokenBatch> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| Error::Embedding(format!("Tokenization failed: {}", e)))?;

    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = encodings
        .iter()
        .map(|enc| {
            let mut ids = enc.get_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            ids.truncate(max_len);
            mask.truncate(max_len);
            (ids, mask)
        })
        .collect();

    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    for (ids, mask) in &mut rows {
        ids.resize(seq_len, PAD_ID);
        mask.resize(seq_len, 0);
    }

    let batch = rows.len();
    let (ids, mask): (Vec<Vec<u32>>, Vec<Vec<u32>>) = rows.into_iter().unzip();
    let ids: Vec<u32> = ids.into_iter().flatten().collect();
    let mask: Vec<u32> = mask.into_iter().flatten().collect();

    let input_ids = Tensor::from_vec(ids, (batch, seq_len), device).map_err(Error::embedding)?;
    let attention_mask = Tensor::from_vec(mask, (batch, seq_len), device).map_err(Error::embedding)?;
    let token_type_ids = input_ids.zeros_like().map_err(Error::embedding)?;
    Ok(TokenBatch { input_ids, attention_mask, token_type_ids })
}
