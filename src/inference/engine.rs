use std::error::Error;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::{ModelArtifact, TokenizerArtifact};
use crate::config::Settings;
use crate::inference::model::DualLstmModel;
use crate::inference::padding::pad_to;
use crate::inference::tokenizer::WordTokenizer;

/// Discrete answer produced by thresholding the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Answer::Yes => write!(f, "Yes"),
            Answer::No => write!(f, "No"),
        }
    }
}

/// Result of a single prediction.
///
/// `confidence_no` is `1 - confidence_yes` by construction, so the two
/// always sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub answer: Answer,
    pub confidence_yes: f32,
    pub confidence_no: f32,
}

/// The loaded inference context: tokenizer and model, constructed together
/// exactly once at startup and shared read-only across all requests.
///
/// A `QaEngine` cannot exist with partially loaded assets; any load failure
/// prevents construction, so there is no uninitialized state to guard
/// against at call time.
pub struct QaEngine {
    tokenizer: WordTokenizer,
    model: DualLstmModel,
    loaded_at: DateTime<Utc>,
}

impl QaEngine {
    /// Loads both artifacts from the locations named in the settings.
    pub fn load(settings: &Settings) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Self::load_from(&settings.model_path(), &settings.tokenizer_path())
    }

    /// Loads both artifacts from explicit paths.
    ///
    /// Fails if either file is missing, corrupt, or if the two artifacts are
    /// incompatible (the tokenizer can emit indices the model's embedding
    /// tables do not cover).
    pub fn load_from(
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        info!("Loading tokenizer from {}", tokenizer_path.display());
        let tokenizer = WordTokenizer::new(TokenizerArtifact::open(tokenizer_path)?);

        info!("Loading model from {}", model_path.display());
        let artifact = ModelArtifact::open(model_path)?;
        let model = DualLstmModel::from_artifact(&artifact)?;

        let max_index = tokenizer.max_index() as usize;
        if max_index >= model.params.vocab_size {
            return Err(format!(
                "Tokenizer emits index {} but the model vocabulary holds {} entries",
                max_index, model.params.vocab_size
            )
            .into());
        }

        info!("Model '{}' and tokenizer loaded successfully", model.params.name);

        Ok(Self {
            tokenizer,
            model,
            loaded_at: Utc::now(),
        })
    }

    /// Name of the loaded model, from the artifact metadata.
    pub fn model_name(&self) -> &str {
        &self.model.params.name
    }

    /// When the assets finished loading.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Answers a yes/no question about a story.
    ///
    /// Both texts are tokenized with the loaded vocabulary, fitted to the
    /// model's fixed sequence lengths, and run through the forward pass.
    /// The scalar output p becomes "Yes" when p > 0.5 and "No" otherwise,
    /// so p == 0.5 resolves to "No".
    pub fn predict(
        &self,
        story: &str,
        question: &str,
    ) -> Result<Prediction, Box<dyn Error + Send + Sync>> {
        let story_ids = pad_to(&self.tokenizer.encode(story), self.model.params.story_len);
        let question_ids = pad_to(
            &self.tokenizer.encode(question),
            self.model.params.question_len,
        );

        let probability = self.model.forward(&story_ids, &question_ids)?;

        let answer = if probability > 0.5 {
            Answer::Yes
        } else {
            Answer::No
        };

        Ok(Prediction {
            answer,
            confidence_yes: probability,
            confidence_no: 1.0 - probability,
        })
    }
}
