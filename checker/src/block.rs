// block.rs — Closed catalog of block types
//
// Every block type the editor can place is a variant of `BlockType`. Each
// variant declares its input handles (in order), its output handles, and its
// parameter schema. Adding a block type is a compile-checked change: every
// exhaustive `match` over `BlockType` (here and in registry.rs) must be
// extended.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::param::{ParamSet, ParamSpec};

// ── Block type ──────────────────────────────────────────────────────────────

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockType {
    Input,
    Output,
    Linear,
    Conv2D,
    LSTM,
    Attention,
    LayerNorm,
    BatchNorm,
    Activation,
    Dropout,
    Flatten,
    Embedding,
    Softmax,
    Add,
    Concat,
    TextInput,
    TextEmbedding,
    PositionalEncoding,
    PositionalEmbedding,
    /// Annotation surface in the editor. Carries no tensors.
    Board,
}

/// Coarse grouping used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCategory {
    Io,
    Layer,
    Normalization,
    Elementwise,
    Merge,
    Text,
    Annotation,
}

/// A named input handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHandle {
    pub name: &'static str,
    /// Accepts any number of incoming edges.
    pub merge: bool,
}

impl InputHandle {
    const fn single(name: &'static str) -> Self {
        InputHandle { name, merge: false }
    }

    const fn merge(name: &'static str) -> Self {
        InputHandle { name, merge: true }
    }
}

pub const DEFAULT_INPUT: &str = "in";
pub const DEFAULT_OUTPUT: &str = "out";

const NO_INPUTS: &[InputHandle] = &[];
const SINGLE_INPUT: &[InputHandle] = &[InputHandle::single(DEFAULT_INPUT)];
const MERGE_INPUT: &[InputHandle] = &[InputHandle::merge(DEFAULT_INPUT)];
const ATTENTION_INPUTS: &[InputHandle] = &[
    InputHandle::single("query"),
    InputHandle::single("key"),
    InputHandle::single("value"),
];

const NO_OUTPUTS: &[&str] = &[];
const SINGLE_OUTPUT: &[&str] = &[DEFAULT_OUTPUT];

// ── Parameter schemas ───────────────────────────────────────────────────────

const ACTIVATIONS: &[&str] = &["relu", "gelu", "sigmoid", "tanh", "leaky_relu", "silu"];
const LOSS_FUNCTIONS: &[&str] = &["CrossEntropyLoss", "MSELoss", "BCEWithLogitsLoss"];

const INPUT_PARAMS: &[ParamSpec] = &[ParamSpec::text("dataset", "MNIST")];
const OUTPUT_PARAMS: &[ParamSpec] =
    &[ParamSpec::select("loss_fn", LOSS_FUNCTIONS, "CrossEntropyLoss")];
const LINEAR_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("in_features", 1.0, 784.0),
    ParamSpec::int("out_features", 1.0, 128.0),
];
const CONV2D_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("in_channels", 0.0, 0.0),
    ParamSpec::int("out_channels", 1.0, 32.0),
    ParamSpec::tuple("kernel_size", 1.0, 3.0),
    ParamSpec::tuple("stride", 1.0, 1.0),
    ParamSpec::tuple("padding", 0.0, 0.0),
];
const LSTM_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("input_size", 0.0, 0.0),
    ParamSpec::int("hidden_size", 1.0, 128.0),
    ParamSpec::int("num_layers", 1.0, 1.0).with_range(1.0, 8.0),
    ParamSpec::boolean("return_sequences", true),
];
const ATTENTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("embed_dim", 0.0, 0.0),
    ParamSpec::int("num_heads", 1.0, 1.0),
];
const LAYERNORM_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("normalized_shape", 0.0, 0.0),
    ParamSpec::float("eps", 0.0, 1.0, 1e-5),
];
const BATCHNORM_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("num_features", 0.0, 0.0),
    ParamSpec::float("momentum", 0.0, 1.0, 0.1),
];
const ACTIVATION_PARAMS: &[ParamSpec] = &[ParamSpec::select("activation", ACTIVATIONS, "relu")];
const DROPOUT_PARAMS: &[ParamSpec] = &[ParamSpec::float("p", 0.0, 1.0, 0.5)];
const EMBEDDING_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("num_embeddings", 1.0, 10000.0),
    ParamSpec::int("embedding_dim", 1.0, 128.0),
];
const SOFTMAX_PARAMS: &[ParamSpec] = &[ParamSpec::int("dim", -8.0, -1.0).with_range(-8.0, 8.0)];
const CONCAT_PARAMS: &[ParamSpec] = &[ParamSpec::int("axis", -8.0, 0.0).with_range(-8.0, 8.0)];
const TEXT_INPUT_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("seq_len", 1.0, 128.0),
    ParamSpec::int("vocab_size", 1.0, 10000.0),
];
const TEXT_EMBEDDING_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("vocab_size", 1.0, 10000.0),
    ParamSpec::int("embedding_dim", 1.0, 128.0),
];
const POSITIONAL_ENCODING_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("d_model", 0.0, 0.0),
    ParamSpec::int("max_len", 1.0, 5000.0),
];
const POSITIONAL_EMBEDDING_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("max_len", 1.0, 512.0),
    ParamSpec::int("d_model", 0.0, 0.0),
];
const NO_PARAMS: &[ParamSpec] = &[];

impl BlockType {
    pub const ALL: [BlockType; 20] = [
        BlockType::Input,
        BlockType::Output,
        BlockType::Linear,
        BlockType::Conv2D,
        BlockType::LSTM,
        BlockType::Attention,
        BlockType::LayerNorm,
        BlockType::BatchNorm,
        BlockType::Activation,
        BlockType::Dropout,
        BlockType::Flatten,
        BlockType::Embedding,
        BlockType::Softmax,
        BlockType::Add,
        BlockType::Concat,
        BlockType::TextInput,
        BlockType::TextEmbedding,
        BlockType::PositionalEncoding,
        BlockType::PositionalEmbedding,
        BlockType::Board,
    ];

    /// Canonical name, as serialized.
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Input => "Input",
            BlockType::Output => "Output",
            BlockType::Linear => "Linear",
            BlockType::Conv2D => "Conv2D",
            BlockType::LSTM => "LSTM",
            BlockType::Attention => "Attention",
            BlockType::LayerNorm => "LayerNorm",
            BlockType::BatchNorm => "BatchNorm",
            BlockType::Activation => "Activation",
            BlockType::Dropout => "Dropout",
            BlockType::Flatten => "Flatten",
            BlockType::Embedding => "Embedding",
            BlockType::Softmax => "Softmax",
            BlockType::Add => "Add",
            BlockType::Concat => "Concat",
            BlockType::TextInput => "TextInput",
            BlockType::TextEmbedding => "TextEmbedding",
            BlockType::PositionalEncoding => "PositionalEncoding",
            BlockType::PositionalEmbedding => "PositionalEmbedding",
            BlockType::Board => "Board",
        }
    }

    /// Resolve a type name, case-insensitively, including the editor's aliases.
    pub fn from_name(name: &str) -> Option<BlockType> {
        let lower = name.trim().to_ascii_lowercase();
        let ty = match lower.as_str() {
            "input" => BlockType::Input,
            "output" => BlockType::Output,
            "linear" | "dense" => BlockType::Linear,
            "conv2d" => BlockType::Conv2D,
            "lstm" => BlockType::LSTM,
            "attention" | "multiheadattention" => BlockType::Attention,
            "layernorm" | "layer_norm" => BlockType::LayerNorm,
            "batchnorm" | "batch_norm" | "batchnorm2d" => BlockType::BatchNorm,
            "activation" | "relu" | "gelu" | "sigmoid" | "tanh" => BlockType::Activation,
            "dropout" => BlockType::Dropout,
            "flatten" => BlockType::Flatten,
            "embedding" => BlockType::Embedding,
            "softmax" => BlockType::Softmax,
            "add" => BlockType::Add,
            "concat" => BlockType::Concat,
            "textinput" | "text_input" => BlockType::TextInput,
            "textembedding" | "text_embedding" => BlockType::TextEmbedding,
            "positionalencoding" | "positional_encoding" => BlockType::PositionalEncoding,
            "positionalembedding" | "positional_embedding" => BlockType::PositionalEmbedding,
            "board" => BlockType::Board,
            _ => return None,
        };
        Some(ty)
    }

    /// For names like `relu` that select an activation function as well as
    /// the block type, the function they imply.
    pub fn implied_activation(name: &str) -> Option<&'static str> {
        let lower = name.trim().to_ascii_lowercase();
        ACTIVATIONS.iter().copied().find(|a| *a == lower)
    }

    pub fn category(self) -> BlockCategory {
        match self {
            BlockType::Input | BlockType::Output => BlockCategory::Io,
            BlockType::Linear
            | BlockType::Conv2D
            | BlockType::LSTM
            | BlockType::Attention
            | BlockType::Embedding
            | BlockType::Flatten => BlockCategory::Layer,
            BlockType::LayerNorm | BlockType::BatchNorm => BlockCategory::Normalization,
            BlockType::Activation | BlockType::Dropout | BlockType::Softmax => {
                BlockCategory::Elementwise
            }
            BlockType::Add | BlockType::Concat => BlockCategory::Merge,
            BlockType::TextInput
            | BlockType::TextEmbedding
            | BlockType::PositionalEncoding
            | BlockType::PositionalEmbedding => BlockCategory::Text,
            BlockType::Board => BlockCategory::Annotation,
        }
    }

    /// Input handles in declaration order.
    pub fn inputs(self) -> &'static [InputHandle] {
        match self {
            BlockType::Input | BlockType::TextInput | BlockType::Board => NO_INPUTS,
            BlockType::Attention => ATTENTION_INPUTS,
            BlockType::Add | BlockType::Concat => MERGE_INPUT,
            BlockType::Output
            | BlockType::Linear
            | BlockType::Conv2D
            | BlockType::LSTM
            | BlockType::LayerNorm
            | BlockType::BatchNorm
            | BlockType::Activation
            | BlockType::Dropout
            | BlockType::Flatten
            | BlockType::Embedding
            | BlockType::Softmax
            | BlockType::TextEmbedding
            | BlockType::PositionalEncoding
            | BlockType::PositionalEmbedding => SINGLE_INPUT,
        }
    }

    pub fn outputs(self) -> &'static [&'static str] {
        match self {
            BlockType::Output | BlockType::Board => NO_OUTPUTS,
            _ => SINGLE_OUTPUT,
        }
    }

    pub fn input(self, handle: &str) -> Option<&'static InputHandle> {
        self.inputs().iter().find(|h| h.name == handle)
    }

    pub fn has_output(self, handle: &str) -> bool {
        self.outputs().contains(&handle)
    }

    /// Whether the engine computes shapes for this block type.
    pub fn carries_tensors(self) -> bool {
        self != BlockType::Board
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            BlockType::Input => INPUT_PARAMS,
            BlockType::Output => OUTPUT_PARAMS,
            BlockType::Linear => LINEAR_PARAMS,
            BlockType::Conv2D => CONV2D_PARAMS,
            BlockType::LSTM => LSTM_PARAMS,
            BlockType::Attention => ATTENTION_PARAMS,
            BlockType::LayerNorm => LAYERNORM_PARAMS,
            BlockType::BatchNorm => BATCHNORM_PARAMS,
            BlockType::Activation => ACTIVATION_PARAMS,
            BlockType::Dropout => DROPOUT_PARAMS,
            BlockType::Embedding => EMBEDDING_PARAMS,
            BlockType::Softmax => SOFTMAX_PARAMS,
            BlockType::Concat => CONCAT_PARAMS,
            BlockType::TextInput => TEXT_INPUT_PARAMS,
            BlockType::TextEmbedding => TEXT_EMBEDDING_PARAMS,
            BlockType::PositionalEncoding => POSITIONAL_ENCODING_PARAMS,
            BlockType::PositionalEmbedding => POSITIONAL_EMBEDDING_PARAMS,
            BlockType::Flatten | BlockType::Add | BlockType::Board => NO_PARAMS,
        }
    }

    /// A parameter set holding every schema default.
    pub fn default_params(self) -> ParamSet {
        let mut params = ParamSet::new();
        for spec in self.params() {
            params.set(spec.key, spec.default.to_value());
        }
        params
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown block type '{0}'")]
pub struct UnknownBlockType(pub String);

impl FromStr for BlockType {
    type Err = UnknownBlockType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::from_name(s).ok_or_else(|| UnknownBlockType(s.to_string()))
    }
}

impl Serialize for BlockType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for BlockType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::check_schema;

    #[test]
    fn names_roundtrip_through_from_name() {
        for ty in BlockType::ALL {
            assert_eq!(BlockType::from_name(ty.name()), Some(ty));
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(BlockType::from_name("relu"), Some(BlockType::Activation));
        assert_eq!(BlockType::from_name("text_input"), Some(BlockType::TextInput));
        assert_eq!(
            BlockType::from_name("positional_embedding"),
            Some(BlockType::PositionalEmbedding)
        );
        assert_eq!(BlockType::from_name("CONV2D"), Some(BlockType::Conv2D));
        assert_eq!(BlockType::from_name("transformer"), None);
    }

    #[test]
    fn implied_activation_only_for_function_names() {
        assert_eq!(BlockType::implied_activation("GELU"), Some("gelu"));
        assert_eq!(BlockType::implied_activation("activation"), None);
    }

    #[test]
    fn attention_has_three_inputs() {
        let names: Vec<_> = BlockType::Attention.inputs().iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["query", "key", "value"]);
    }

    #[test]
    fn only_add_and_concat_merge() {
        for ty in BlockType::ALL {
            let merges = ty.inputs().iter().any(|h| h.merge);
            assert_eq!(merges, matches!(ty, BlockType::Add | BlockType::Concat), "{ty}");
        }
    }

    #[test]
    fn sources_and_sinks() {
        assert!(BlockType::Input.inputs().is_empty());
        assert!(BlockType::Output.outputs().is_empty());
        assert!(BlockType::Linear.has_output("out"));
        assert!(!BlockType::Board.carries_tensors());
    }

    #[test]
    fn defaults_satisfy_their_own_schema() {
        for ty in BlockType::ALL {
            let params = ty.default_params();
            assert!(check_schema(ty.params(), &params).is_ok(), "{ty}");
            assert_eq!(params.len(), ty.params().len());
        }
    }

    #[test]
    fn serde_uses_canonical_name() {
        let json = serde_json::to_string(&BlockType::Conv2D).unwrap();
        assert_eq!(json, "\"Conv2D\"");
        let ty: BlockType = serde_json::from_str("\"layernorm\"").unwrap();
        assert_eq!(ty, BlockType::LayerNorm);
        assert!(serde_json::from_str::<BlockType>("\"nope\"").is_err());
    }
}
