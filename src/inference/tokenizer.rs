use std::collections::{HashMap, HashSet};

use crate::artifact::TokenizerArtifact;

/// A word-level tokenizer replaying the vocabulary and cleaning policy of
/// the fitted tokenizer artifact.
pub struct WordTokenizer {
    word_index: HashMap<String, u32>,
    oov_index: Option<u32>,
    num_words: Option<u32>,
    lowercase: bool,
    filters: HashSet<char>,
    split: char,
}

impl WordTokenizer {
    pub fn new(artifact: TokenizerArtifact) -> Self {
        // Resolved once; validation guarantees the token is in the index.
        let oov_index = artifact
            .oov_token
            .as_ref()
            .and_then(|token| artifact.word_index.get(token))
            .copied();

        Self {
            word_index: artifact.word_index,
            oov_index,
            num_words: artifact.num_words,
            lowercase: artifact.lowercase,
            filters: artifact.filters.chars().collect(),
            split: artifact.split,
        }
    }

    /// Converts text to a sequence of token indices.
    ///
    /// Applies the artifact's cleaning policy (lowercasing, filter
    /// stripping), splits on the separator, and looks each word up in the
    /// vocabulary. Unknown words map to the out-of-vocabulary index when the
    /// artifact defines one and are dropped otherwise. Never fails; an input
    /// with no known words yields an empty sequence.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let cleaned: String = text
            .chars()
            .map(|c| if self.filters.contains(&c) { self.split } else { c })
            .collect();

        cleaned
            .split(self.split)
            .filter(|word| !word.is_empty())
            .filter_map(|word| self.index_of(word))
            .collect()
    }

    fn index_of(&self, word: &str) -> Option<u32> {
        match self.word_index.get(word) {
            Some(&index) if self.in_range(index) => Some(index),
            _ => self.oov_index,
        }
    }

    fn in_range(&self, index: u32) -> bool {
        self.num_words.map_or(true, |cap| index < cap)
    }

    /// Highest index `encode` can emit; used to check vocabulary
    /// compatibility against a model artifact at load time.
    pub fn max_index(&self) -> u32 {
        self.word_index
            .values()
            .copied()
            .filter(|&index| self.in_range(index))
            .chain(self.oov_index)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(oov: Option<&str>, num_words: Option<u32>) -> TokenizerArtifact {
        let mut word_index = HashMap::new();
        for (i, word) in ["mary", "went", "to", "the", "kitchen", "<oov>"]
            .iter()
            .enumerate()
        {
            word_index.insert(word.to_string(), i as u32 + 1);
        }
        TokenizerArtifact {
            word_index,
            oov_token: oov.map(str::to_string),
            num_words,
            lowercase: true,
            filters: "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n".to_string(),
            split: ' ',
        }
    }

    #[test]
    fn known_words_map_to_their_indices() {
        let tokenizer = WordTokenizer::new(artifact(None, None));
        assert_eq!(tokenizer.encode("mary went to the kitchen"), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn text_is_lowercased_and_punctuation_stripped() {
        let tokenizer = WordTokenizer::new(artifact(None, None));
        assert_eq!(tokenizer.encode("Mary went to the kitchen."), vec![1, 2, 3, 4, 5]);
        assert_eq!(tokenizer.encode("the kitchen?"), vec![4, 5]);
    }

    #[test]
    fn unknown_words_are_dropped_without_oov_token() {
        let tokenizer = WordTokenizer::new(artifact(None, None));
        assert_eq!(tokenizer.encode("mary visited paris"), vec![1]);
    }

    #[test]
    fn unknown_words_substitute_the_oov_index() {
        let tokenizer = WordTokenizer::new(artifact(Some("<oov>"), None));
        assert_eq!(tokenizer.encode("mary visited paris"), vec![1, 6, 6]);
    }

    #[test]
    fn vocabulary_cap_turns_high_indices_into_unknowns() {
        // Indices at or above the cap behave like unknown words.
        let dropped = WordTokenizer::new(artifact(None, Some(3)));
        assert_eq!(dropped.encode("mary went to the kitchen"), vec![1, 2]);
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        let tokenizer = WordTokenizer::new(artifact(Some("<oov>"), None));
        assert_eq!(tokenizer.encode(""), Vec::<u32>::new());
        assert_eq!(tokenizer.encode("   "), Vec::<u32>::new());
    }

    #[test]
    fn max_index_accounts_for_cap_and_oov() {
        assert_eq!(WordTokenizer::new(artifact(None, None)).max_index(), 6);
        assert_eq!(WordTokenizer::new(artifact(None, Some(3))).max_index(), 2);
        assert_eq!(WordTokenizer::new(artifact(Some("<oov>"), None)).max_index(), 6);
    }
}
