use std::error::Error;

use ndarray::{concatenate, Array1, Array2, Axis};
use tracing::debug;

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::inference::lstm::{sigmoid, Lstm};

/// Architecture identifier the artifact must carry.
pub const ARCHITECTURE: &str = "dual_lstm";

/// Dimensions and identity read from the artifact metadata.
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// Human-readable name of the model
    pub name: String,
    /// Number of embedding rows; token indices must stay below this
    pub vocab_size: usize,
    /// Width of each embedding row
    pub embedding_dim: usize,
    /// LSTM units per encoder branch
    pub hidden_dim: usize,
    /// Fixed story sequence length
    pub story_len: usize,
    /// Fixed question sequence length
    pub question_len: usize,
}

/// An embedding table with one row per vocabulary index.
pub struct Embedding {
    weight: Array2<f32>,
}

impl Embedding {
    pub fn new(weight: Array2<f32>) -> Self {
        Self { weight }
    }

    /// Looks up one embedding row per token index.
    pub fn lookup(&self, ids: &[u32]) -> Result<Array2<f32>, Box<dyn Error + Send + Sync>> {
        let mut rows = Array2::zeros((ids.len(), self.weight.ncols()));
        for (i, &id) in ids.iter().enumerate() {
            let id = id as usize;
            if id >= self.weight.nrows() {
                return Err(format!(
                    "Token index {} is out of range (max: {})",
                    id,
                    self.weight.nrows() - 1
                )
                .into());
            }
            rows.row_mut(i).assign(&self.weight.row(id));
        }
        Ok(rows)
    }
}

/// One input branch: embedding lookup followed by an LSTM.
struct Encoder {
    embed: Embedding,
    lstm: Lstm,
}

impl Encoder {
    fn encode(&self, ids: &[u32]) -> Result<Array1<f32>, Box<dyn Error + Send + Sync>> {
        let embedded = self.embed.lookup(ids)?;
        Ok(self.lstm.run(embedded.view()))
    }
}

/// The trained dual-encoder model: separate story and question branches
/// whose final hidden states are concatenated and projected to a single
/// sigmoid output.
pub struct DualLstmModel {
    /// Dimensions read from the artifact
    pub params: ModelParams,
    story: Encoder,
    question: Encoder,
    /// Output projection [2 * hidden_dim, 1]
    output_weight: Array2<f32>,
    output_bias: f32,
}

impl DualLstmModel {
    /// Extracts and shape-checks all weights from a parsed artifact.
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let architecture = artifact.require_str("general.architecture")?;
        if architecture != ARCHITECTURE {
            return Err(Box::new(ArtifactError::InvalidFormat(format!(
                "Unsupported architecture: {}",
                architecture
            ))));
        }

        let params = ModelParams {
            name: artifact.require_str("general.name")?.to_string(),
            vocab_size: artifact.require_u32("dual_lstm.vocab_size")? as usize,
            embedding_dim: artifact.require_u32("dual_lstm.embedding_dim")? as usize,
            hidden_dim: artifact.require_u32("dual_lstm.hidden_dim")? as usize,
            story_len: artifact.require_u32("dual_lstm.story_len")? as usize,
            question_len: artifact.require_u32("dual_lstm.question_len")? as usize,
        };

        if params.vocab_size == 0
            || params.embedding_dim == 0
            || params.hidden_dim == 0
            || params.story_len == 0
            || params.question_len == 0
        {
            return Err(Box::new(ArtifactError::InvalidFormat(
                "Model dimensions must all be non-zero".to_string(),
            )));
        }

        debug!(
            "Model parameters: vocab_size={}, embedding_dim={}, hidden_dim={}, story_len={}, question_len={}",
            params.vocab_size,
            params.embedding_dim,
            params.hidden_dim,
            params.story_len,
            params.question_len
        );

        let story = Self::load_encoder(artifact, "story_encoder", &params)?;
        let question = Self::load_encoder(artifact, "question_encoder", &params)?;

        let output_weight = artifact.tensor_2d("output.weight", 2 * params.hidden_dim, 1)?;
        let output_bias = artifact.tensor_1d("output.bias", 1)?[0];

        Ok(Self {
            params,
            story,
            question,
            output_weight,
            output_bias,
        })
    }

    fn load_encoder(
        artifact: &ModelArtifact,
        prefix: &str,
        params: &ModelParams,
    ) -> Result<Encoder, Box<dyn Error + Send + Sync>> {
        let embed = Embedding::new(artifact.tensor_2d(
            &format!("{}.embed.weight", prefix),
            params.vocab_size,
            params.embedding_dim,
        )?);
        let lstm = Lstm::new(
            artifact.tensor_2d(
                &format!("{}.lstm.kernel", prefix),
                params.embedding_dim,
                4 * params.hidden_dim,
            )?,
            artifact.tensor_2d(
                &format!("{}.lstm.recurrent", prefix),
                params.hidden_dim,
                4 * params.hidden_dim,
            )?,
            artifact.tensor_1d(&format!("{}.lstm.bias", prefix), 4 * params.hidden_dim)?,
        )?;
        Ok(Encoder { embed, lstm })
    }

    /// Runs both encoder branches and the output head.
    ///
    /// The returned probability is in [0, 1]. Callers pass sequences already
    /// padded to `story_len`/`question_len`; shorter or longer input still
    /// produces a valid output, the recurrence simply runs over however many
    /// steps it is given.
    pub fn forward(
        &self,
        story_ids: &[u32],
        question_ids: &[u32],
    ) -> Result<f32, Box<dyn Error + Send + Sync>> {
        let story_hidden = self.story.encode(story_ids)?;
        let question_hidden = self.question.encode(question_ids)?;

        let merged = concatenate(Axis(0), &[story_hidden.view(), question_hidden.view()])?;
        let logit = merged.dot(&self.output_weight.column(0)) + self.output_bias;

        Ok(sigmoid(logit))
    }
}
