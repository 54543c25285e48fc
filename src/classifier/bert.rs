use std::path::{Path, PathBuf};

use candle_core::{DType, Device, IndexOp, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{Cache, Repo};
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::text::{Classification, TextClassifier, TextLabel};
use crate::error::ModelError;

/// Hub id of the default SMS spam model.
pub const DEFAULT_MODEL_ID: &str = "mrm8488/bert-tiny-finetuned-sms-spam-detection";

/// `LABEL_1` of the sequence-classification head is spam.
const SPAM_LABEL: usize = 1;
const NUM_LABELS: usize = 2;

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// The parts of `config.json` the classification head needs.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default = "default_max_positions")]
    max_position_embeddings: usize,
}

fn default_max_positions() -> usize {
    512
}

/// Paths of one model snapshot.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// A directory written by `save_pretrained`: `config.json`,
    /// `tokenizer.json`, and safetensors or PyTorch weights.
    pub fn in_dir(dir: &Path) -> Result<Self, ModelError> {
        let existing = |name: &str| {
            let path = dir.join(name);
            path.is_file().then_some(path)
        };
        let missing = |name: &str| {
            ModelError::Transformer(format!("{} not found in {}", name, dir.display()))
        };

        Ok(ModelFiles {
            config: existing("config.json").ok_or_else(|| missing("config.json"))?,
            tokenizer: existing("tokenizer.json").ok_or_else(|| missing("tokenizer.json"))?,
            weights: WEIGHT_FILES
                .iter()
                .find_map(|name| existing(*name))
                .ok_or_else(|| missing("model weights"))?,
        })
    }

    /// A snapshot already present in the local Hugging Face cache. Never
    /// touches the network.
    pub fn in_hf_cache(model_id: &str) -> Result<Self, ModelError> {
        let repo = Cache::default().repo(Repo::model(model_id.to_string()));
        let missing = |name: &str| {
            ModelError::Transformer(format!("{} for {} not in the HF cache", name, model_id))
        };

        Ok(ModelFiles {
            config: repo.get("config.json").ok_or_else(|| missing("config.json"))?,
            tokenizer: repo
                .get("tokenizer.json")
                .ok_or_else(|| missing("tokenizer.json"))?,
            weights: WEIGHT_FILES
                .iter()
                .find_map(|name| repo.get(*name))
                .ok_or_else(|| missing("model weights"))?,
        })
    }
}

/// BERT sequence classifier (encoder, tanh pooler, linear head) run on CPU.
pub struct BertSpamClassifier {
    model: BertModel,
    pooler: Linear,
    head: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_tokens: usize,
}

impl BertSpamClassifier {
    pub fn load(files: &ModelFiles) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(&files.config)
            .map_err(|e| ModelError::io(&files.config, e))?;
        let config_json: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| ModelError::Transformer(format!("invalid config.json: {e}")))?;
        let config: BertConfig = serde_json::from_value(config_json.clone())
            .map_err(|e| ModelError::Transformer(format!("invalid BERT config: {e}")))?;
        let head_config: HeadConfig = serde_json::from_value(config_json)
            .map_err(|e| ModelError::Transformer(format!("invalid BERT config: {e}")))?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| ModelError::Transformer(format!("failed to load tokenizer: {e}")))?;

        let device = Device::Cpu;
        let vb = if files.weights.extension().is_some_and(|ext| ext == "safetensors") {
            // SAFETY: the weights file is only read, and is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(&files.weights, DType::F32, &device)
        }
        .map_err(|e| ModelError::Transformer(format!("failed to load weights: {e}")))?;

        let hidden = head_config.hidden_size;
        let model = BertModel::load(vb.pp("bert"), &config)
            .map_err(|e| ModelError::Transformer(format!("failed to load BERT encoder: {e}")))?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .map_err(|e| ModelError::Transformer(format!("failed to load pooler: {e}")))?;
        let head = candle_nn::linear(hidden, NUM_LABELS, vb.pp("classifier"))
            .map_err(|e| ModelError::Transformer(format!("failed to load classifier head: {e}")))?;

        Ok(BertSpamClassifier {
            model,
            pooler,
            head,
            tokenizer,
            device,
            max_tokens: head_config.max_position_embeddings,
        })
    }

    /// Softmax over the two labels.
    fn label_probabilities(
        &self,
        ids: &[u32],
        type_ids: &[u32],
        mask: &[u32],
    ) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(mask, &self.device)?.unsqueeze(0)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        // [CLS] is at position 0
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.head.forward(&pooled)?;

        candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1()
    }
}

impl TextClassifier for BertSpamClassifier {
    fn name(&self) -> &'static str {
        "bert"
    }

    fn classify(&self, text: &str) -> Result<Classification, ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Inference(format!("tokenization failed: {e}")))?;

        let len = encoding.get_ids().len().min(self.max_tokens);
        let probs = self
            .label_probabilities(
                &encoding.get_ids()[..len],
                &encoding.get_type_ids()[..len],
                &encoding.get_attention_mask()[..len],
            )
            .map_err(|e| ModelError::Inference(format!("model inference failed: {e}")))?;

        let spam = probs
            .get(SPAM_LABEL)
            .copied()
            .map(f64::from)
            .ok_or_else(|| ModelError::Inference(format!("expected {} labels", NUM_LABELS)))?;

        Ok(if spam >= 0.5 {
            Classification {
                label: TextLabel::Spam,
                confidence: spam,
            }
        } else {
            Classification {
                label: TextLabel::Ham,
                confidence: 1.0 - spam,
            }
        })
    }
}
