/// Index used to fill sequences up to their fixed length. The embedding
/// tables carry a row for it, so padded positions flow through the encoders
/// like any other token, matching the model's training-time behavior.
pub const PAD_INDEX: u32 = 0;

/// Fits a token sequence to exactly `len` entries.
///
/// Shorter sequences are right-padded with `PAD_INDEX`; longer sequences
/// keep their last `len` tokens, so the most recent part of a long story
/// survives.
pub fn pad_to(ids: &[u32], len: usize) -> Vec<u32> {
    if ids.len() >= len {
        ids[ids.len() - len..].to_vec()
    } else {
        let mut padded = Vec::with_capacity(len);
        padded.extend_from_slice(ids);
        padded.resize(len, PAD_INDEX);
        padded
    }
}
