use burn::{
    nn::{
        gru::{Gru, GruConfig},
        loss::CrossEntropyLossConfig,
        lstm::{Lstm, LstmConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::softmax, ElementConversion},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::data::batcher::Batch;

/// Recurrent layer between the embedding and the mean pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    #[default]
    Lstm,
    Gru,
}

impl FromStr for EncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lstm" => Ok(EncoderKind::Lstm),
            "gru"  => Ok(EncoderKind::Gru),
            other  => Err(format!("unknown encoder '{other}' (expected lstm or gru)")),
        }
    }
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TextClassifierConfig {
    /// Embedding table height (words + augmentation tokens)
    pub n_words:  usize,
    /// Embedding and hidden width
    pub dim_proj: usize,
    /// Number of labels at this level
    pub ydim:     usize,
    pub encoder:  EncoderKind,
    #[config(default = true)]
    pub use_dropout: bool,
}

impl TextClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextClassifier<B> {
        let embedding = EmbeddingConfig::new(self.n_words, self.dim_proj).init(device);
        let encoder = match self.encoder {
            EncoderKind::Lstm => Encoder::Lstm(LstmConfig::new(self.dim_proj, self.dim_proj, true).init(device)),
            EncoderKind::Gru  => Encoder::Gru(GruConfig::new(self.dim_proj, self.dim_proj, true).init(device)),
        };
        let dropout = DropoutConfig::new(if self.use_dropout { 0.5 } else { 0.0 }).init();
        let head    = LinearConfig::new(self.dim_proj, self.ydim).init(device);
        TextClassifier { embedding, encoder, dropout, head }
    }
}

/// The recurrent layer, one of the `EncoderKind`s.
#[derive(Module, Debug)]
pub enum Encoder<B: Backend> {
    Lstm(Lstm<B>),
    Gru(Gru<B>),
}

impl<B: Backend> Encoder<B> {
    /// [batch, seq, dim] → hidden states [batch, seq, dim]
    pub fn forward(&self, emb: Tensor<B, 3>) -> Tensor<B, 3> {
        match self {
            Encoder::Lstm(lstm) => lstm.forward(emb, None).0,
            Encoder::Gru(gru)   => gru.forward(emb, None),
        }
    }

    pub fn kind(&self) -> EncoderKind {
        match self {
            Encoder::Lstm(_) => EncoderKind::Lstm,
            Encoder::Gru(_)  => EncoderKind::Gru,
        }
    }
}

#[derive(Module, Debug)]
pub struct TextClassifier<B: Backend> {
    pub embedding: Embedding<B>,
    pub encoder:   Encoder<B>,
    pub dropout:   Dropout,
    pub head:      Linear<B>,
}

impl<B: Backend> TextClassifier<B> {
    /// tokens, mask: [batch, seq] → logits: [batch, ydim]
    pub fn forward(&self, tokens: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = tokens.dims();

        let emb    = self.embedding.forward(tokens);
        let hidden = self.encoder.forward(emb); // [batch, seq, dim]
        let dim    = hidden.dims()[2];

        // Padding sits at the tail, so the states of real steps never see it.
        // Mean over real steps only; an all-padding row divides by one.
        let summed = (hidden * mask.clone().reshape([batch_size, seq_len, 1]))
            .sum_dim(1)
            .reshape([batch_size, dim]);
        let counts = mask.sum_dim(1).clamp_min(1.0);
        let pooled = self.dropout.forward(summed / counts);

        self.head.forward(pooled)
    }

    /// Mean cross-entropy plus `decay_c * Σ U²` over the softmax weights.
    pub fn forward_loss(
        &self,
        tokens:  Tensor<B, 2, Int>,
        mask:    Tensor<B, 2>,
        labels:  Tensor<B, 1, Int>,
        decay_c: f64,
    ) -> Tensor<B, 1> {
        let logits = self.forward(tokens, mask);
        let ce     = CrossEntropyLossConfig::new().init(&logits.device());
        let loss   = ce.forward(logits, labels);
        if decay_c > 0.0 {
            let decay = self.head.weight.val().powf_scalar(2.0).sum().mul_scalar(decay_c);
            loss + decay
        } else {
            loss
        }
    }
}

/// Flat time-major batch buffers → batch-major tensors.
pub fn batch_tensors<B: Backend>(batch: &Batch, device: &B::Device) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
    let ids: Vec<i32> = batch.tokens.iter().map(|&t| t as i32).collect();
    let tokens = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device)
        .reshape([batch.maxlen, batch.size])
        .swap_dims(0, 1);
    let mask = Tensor::<B, 1>::from_floats(batch.mask.as_slice(), device)
        .reshape([batch.maxlen, batch.size])
        .swap_dims(0, 1);
    (tokens, mask)
}

pub fn label_tensor<B: Backend>(batch: &Batch, device: &B::Device) -> Tensor<B, 1, Int> {
    let labels: Vec<i32> = batch.labels.iter().map(|&l| l as i32).collect();
    Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device)
}

/// Softmax rows for every example of `batch`.
pub fn class_probabilities<B: Backend>(
    model:  &TextClassifier<B>,
    batch:  &Batch,
    device: &B::Device,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let (tokens, mask) = batch_tensors::<B>(batch, device);
    let logits         = model.forward(tokens, mask);
    let ydim           = logits.dims()[1];
    let flat: Vec<f32> = softmax(logits, 1)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read class probabilities: {e:?}"))?;
    Ok(flat.chunks(ydim.max(1)).map(<[f32]>::to_vec).collect())
}

/// Scalar loss tensor → f64.
pub fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f64 {
    loss.into_scalar().elem::<f64>()
}
