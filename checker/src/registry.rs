// registry.rs — Per-block shape transfer functions
//
// `compute_output_shape` maps (block type, parameters, input shapes by handle)
// to an output shape or a `Failure`. Every rule is a pure function selected
// by an exhaustive match over `BlockType`. Schema violations are reported
// through the same `Failure` channel as dimension errors, before any
// required-handle or shape rule runs.
//
// Preconditions: none; any parameter bag and any input map are accepted.
// Postconditions: `Ok` shapes contain only positive known dims or `Unknown`.
// Failure modes: every `ShapeError` variant a node can carry locally.
// Side effects: none.

use std::collections::BTreeMap;

use crate::block::{BlockType, DEFAULT_INPUT as IN};
use crate::error::{Failure, ShapeError};
use crate::param::{check_schema, ParamReader, ParamSet};
use crate::shape::{Dim, Shape};

// ── Input shapes ────────────────────────────────────────────────────────────

/// Shapes arriving at each input handle, in edge order. Merge handles may
/// hold several shapes; a handle with no entry is unconnected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputShapes {
    by_handle: BTreeMap<String, Vec<Shape>>,
}

impl InputShapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: &str, shape: Shape) {
        self.by_handle
            .entry(handle.to_string())
            .or_default()
            .push(shape);
    }

    /// Builder form of `push`.
    pub fn with(mut self, handle: &str, shape: Shape) -> Self {
        self.push(handle, shape);
        self
    }

    pub fn all(&self, handle: &str) -> &[Shape] {
        self.by_handle.get(handle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, handle: &str) -> Option<&Shape> {
        self.all(handle).first()
    }

    pub fn is_connected(&self, handle: &str) -> bool {
        !self.all(handle).is_empty()
    }
}

// ── Datasets ────────────────────────────────────────────────────────────────

const DATASETS: &[(&str, [u64; 3])] = &[
    ("mnist", [1, 28, 28]),
    ("fashionmnist", [1, 28, 28]),
    ("cifar10", [3, 32, 32]),
];

/// Per-sample shape of a known dataset. Matching ignores case, `_` and `-`,
/// so `MNIST`, `fashion_mnist` and `CIFAR-10` all resolve.
pub fn dataset_shape(name: &str) -> Option<Shape> {
    let key: String = name
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    DATASETS
        .iter()
        .find(|(id, _)| *id == key)
        .map(|(_, dims)| Shape::from_dims(dims))
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Compute the output shape of one block.
pub fn compute_output_shape(
    block: BlockType,
    params: &ParamSet,
    inputs: &InputShapes,
) -> Result<Shape, Failure> {
    check_schema(block.params(), params)?;
    for handle in block.inputs() {
        if !inputs.is_connected(handle.name) {
            return Err(missing(handle.name));
        }
    }
    apply_rule(block, params, inputs)
}

/// Run a block's rule against a partial input map, as when a single new
/// connection is being considered. Unconnected handles and the block's own
/// parameter problems are not held against the candidate; only failures
/// attributed to an input handle are returned.
pub fn check_candidate(
    block: BlockType,
    params: &ParamSet,
    inputs: &InputShapes,
) -> Result<(), Failure> {
    if check_schema(block.params(), params).is_err() {
        return Ok(());
    }
    match apply_rule(block, params, inputs) {
        Err(failure)
            if failure.handle.is_some()
                && !matches!(failure.error, ShapeError::MissingInput { .. }) =>
        {
            Err(failure)
        }
        _ => Ok(()),
    }
}

fn apply_rule(block: BlockType, params: &ParamSet, inputs: &InputShapes) -> Result<Shape, Failure> {
    let p = ParamReader::new(block.params(), params);
    match block {
        BlockType::Input => input(&p),
        BlockType::TextInput => Ok(Shape::new(vec![Dim::Known(p.uint("seq_len")?)])),
        BlockType::Linear => linear(&p, single(inputs)?),
        BlockType::Conv2D => conv2d(&p, single(inputs)?),
        BlockType::LSTM => lstm(&p, single(inputs)?),
        BlockType::Attention => attention(&p, inputs),
        BlockType::LayerNorm => layer_norm(&p, single(inputs)?),
        BlockType::BatchNorm => batch_norm(&p, single(inputs)?),
        BlockType::Softmax => softmax(&p, single(inputs)?),
        BlockType::Activation | BlockType::Dropout | BlockType::Output => {
            Ok(single(inputs)?.clone())
        }
        BlockType::Flatten => {
            let x = single(inputs)?;
            Ok(Shape::new(vec![x.product().unwrap_or(Dim::Unknown)]))
        }
        BlockType::Embedding | BlockType::TextEmbedding => embedding(&p, single(inputs)?),
        BlockType::Add => add(inputs),
        BlockType::Concat => concat(&p, inputs),
        BlockType::PositionalEncoding => positional_encoding(&p, single(inputs)?),
        BlockType::PositionalEmbedding => positional_embedding(&p, single(inputs)?),
        // Never reaches the engine; an empty shape keeps the function total.
        BlockType::Board => Ok(Shape::default()),
    }
}

// ── Rules ───────────────────────────────────────────────────────────────────

fn input(p: &ParamReader) -> Result<Shape, Failure> {
    let dataset = p.text("dataset")?;
    match dataset_shape(&dataset) {
        Some(shape) => Ok(shape),
        None => Err(ShapeError::UnknownDataset { dataset }.into()),
    }
}

fn linear(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let in_features = p.uint("in_features")?;
    let out_features = p.uint("out_features")?;
    let last = x
        .last_dim()
        .ok_or_else(|| rank_mismatch(IN, "at least 1", x))?;
    expect_size(IN, "in_features", in_features, last)?;
    Ok(x.with_last_dim(Dim::Known(out_features)))
}

fn conv2d(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let (c, h, w) = match x.dims() {
        [c, h, w] => (*c, *h, *w),
        _ => return Err(rank_mismatch(IN, "3 ([C, H, W])", x)),
    };
    if let Some(in_channels) = p.size_constraint("in_channels")? {
        expect_size(IN, "in_channels", in_channels, c)?;
    }
    let out_channels = p.uint("out_channels")?;
    let (kh, kw) = p.pair("kernel_size")?;
    let (sh, sw) = p.pair("stride")?;
    let (ph, pw) = p.pair("padding")?;
    let oh = conv_extent("height", h, kh, sh, ph)?;
    let ow = conv_extent("width", w, kw, sw, pw)?;
    Ok(Shape::new(vec![Dim::Known(out_channels), oh, ow]))
}

/// `floor((n + 2·padding − kernel) / stride) + 1`, failing when ≤ 0.
fn conv_extent(axis: &str, n: Dim, kernel: u64, stride: u64, padding: u64) -> Result<Dim, Failure> {
    let Dim::Known(n) = n else {
        return Ok(Dim::Unknown);
    };
    let span = i128::from(n) + 2 * i128::from(padding) - i128::from(kernel);
    let out = span.div_euclid(i128::from(stride.max(1))) + 1;
    if out <= 0 {
        return Err(Failure::at(
            IN,
            ShapeError::InvalidSpatialReduction {
                axis: axis.to_string(),
                size: i64::try_from(out).unwrap_or(i64::MIN),
            },
        ));
    }
    Ok(u64::try_from(out).map_or(Dim::Unknown, Dim::Known))
}

fn lstm(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let (seq, features) = match x.dims() {
        [f] => (None, *f),
        [s, f] => (Some(*s), *f),
        _ => return Err(rank_mismatch(IN, "1 ([features]) or 2 ([seq, features])", x)),
    };
    if let Some(input_size) = p.size_constraint("input_size")? {
        expect_size(IN, "input_size", input_size, features)?;
    }
    let hidden = Dim::Known(p.uint("hidden_size")?);
    let dims = match (seq, p.flag("return_sequences")?) {
        (Some(seq), true) => vec![seq, hidden],
        _ => vec![hidden],
    };
    Ok(Shape::new(dims))
}

const ATTENTION_HANDLES: [&str; 3] = ["query", "key", "value"];

fn attention(p: &ParamReader, inputs: &InputShapes) -> Result<Shape, Failure> {
    let embed_dim = p.size_constraint("embed_dim")?;
    let num_heads = p.uint("num_heads")?;
    if let Some(e) = embed_dim {
        if e % num_heads.max(1) != 0 {
            return Err(ShapeError::invalid_param(
                "num_heads",
                format!("embed_dim {} is not divisible by {} heads", e, num_heads),
            )
            .into());
        }
    }

    // The configured embed_dim, or else the first connected handle, fixes
    // the trailing dimension every other handle must match.
    let mut reference = embed_dim;
    for handle in ATTENTION_HANDLES {
        let Some(shape) = inputs.first(handle) else {
            continue;
        };
        let last = shape
            .last_dim()
            .ok_or_else(|| rank_mismatch(handle, "at least 1", shape))?;
        match (reference, last) {
            (Some(expected), Dim::Known(actual)) if actual != expected => {
                return Err(Failure::at(
                    handle,
                    ShapeError::EmbeddingDimMismatch { expected, actual },
                ));
            }
            (None, Dim::Known(actual)) => reference = Some(actual),
            _ => {}
        }
    }

    let out = ATTENTION_HANDLES
        .iter()
        .find_map(|h| inputs.first(h))
        .cloned()
        .unwrap_or_default();
    Ok(out)
}

fn layer_norm(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let last = x
        .last_dim()
        .ok_or_else(|| rank_mismatch(IN, "at least 1", x))?;
    if let Some(n) = p.size_constraint("normalized_shape")? {
        expect_size(IN, "normalized_shape", n, last)?;
    }
    Ok(x.clone())
}

fn batch_norm(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let channels = x.dim(0).ok_or_else(|| rank_mismatch(IN, "at least 1", x))?;
    if let Some(n) = p.size_constraint("num_features")? {
        expect_size(IN, "num_features", n, channels)?;
    }
    Ok(x.clone())
}

fn softmax(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let axis = p.int("dim")?;
    resolve_axis(x, axis)?;
    Ok(x.clone())
}

fn embedding(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let embedding_dim = p.uint("embedding_dim")?;
    match x.dims() {
        [seq] => Ok(Shape::new(vec![*seq, Dim::Known(embedding_dim)])),
        _ => Err(rank_mismatch(IN, "1 ([seq])", x)),
    }
}

fn add(inputs: &InputShapes) -> Result<Shape, Failure> {
    let (first, rest) = inputs.all(IN).split_first().ok_or_else(|| missing(IN))?;
    let mut out = first.clone();
    for (i, shape) in rest.iter().enumerate() {
        out = unify(&out, shape).ok_or_else(|| {
            Failure::at_input(
                IN,
                i + 1,
                ShapeError::ShapeMismatch {
                    expected: first.clone(),
                    actual: shape.clone(),
                },
            )
        })?;
    }
    Ok(out)
}

fn concat(p: &ParamReader, inputs: &InputShapes) -> Result<Shape, Failure> {
    let (first, rest) = inputs.all(IN).split_first().ok_or_else(|| missing(IN))?;
    let axis = resolve_axis(first, p.int("axis")?)?;
    let mut dims = first.dims().to_vec();
    for (i, shape) in rest.iter().enumerate() {
        let agrees = shape.rank() == first.rank()
            && dims
                .iter()
                .zip(shape.dims())
                .enumerate()
                .all(|(i, (a, b))| i == axis || a.compatible(*b));
        if !agrees {
            return Err(Failure::at_input(
                IN,
                i + 1,
                ShapeError::AxisMismatch {
                    axis,
                    expected: first.clone(),
                    actual: shape.clone(),
                },
            ));
        }
        for (i, (slot, d)) in dims.iter_mut().zip(shape.dims()).enumerate() {
            if i == axis {
                *slot = slot.checked_add(*d).unwrap_or(Dim::Unknown);
            } else if *slot == Dim::Unknown {
                *slot = *d;
            }
        }
    }
    Ok(Shape::new(dims))
}

fn positional_encoding(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let last = x
        .last_dim()
        .ok_or_else(|| rank_mismatch(IN, "at least 1", x))?;
    if let Some(d_model) = p.size_constraint("d_model")? {
        expect_size(IN, "d_model", d_model, last)?;
    }
    if x.rank() >= 2 {
        expect_within(p.uint("max_len")?, x.dims()[x.rank() - 2])?;
    }
    Ok(x.clone())
}

fn positional_embedding(p: &ParamReader, x: &Shape) -> Result<Shape, Failure> {
    let (seq, d) = match x.dims() {
        [seq, d] => (*seq, *d),
        _ => return Err(rank_mismatch(IN, "2 ([seq, d_model])", x)),
    };
    if let Some(d_model) = p.size_constraint("d_model")? {
        expect_size(IN, "d_model", d_model, d)?;
    }
    expect_within(p.uint("max_len")?, seq)?;
    Ok(x.clone())
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn missing(handle: &str) -> Failure {
    Failure::at(
        handle,
        ShapeError::MissingInput {
            handle: handle.to_string(),
        },
    )
}

fn single(inputs: &InputShapes) -> Result<&Shape, Failure> {
    inputs.first(IN).ok_or_else(|| missing(IN))
}

fn rank_mismatch(handle: &str, expected: &str, actual: &Shape) -> Failure {
    Failure::at(
        handle,
        ShapeError::RankMismatch {
            expected: expected.to_string(),
            actual: actual.rank(),
        },
    )
}

/// A configured size must match a known input dimension.
fn expect_size(handle: &str, param: &str, expected: u64, actual: Dim) -> Result<(), Failure> {
    match actual {
        Dim::Known(actual) if actual != expected => Err(Failure::at(
            handle,
            ShapeError::DimensionMismatch {
                param: param.to_string(),
                expected,
                actual,
            },
        )),
        _ => Ok(()),
    }
}

fn expect_within(max_len: u64, seq: Dim) -> Result<(), Failure> {
    match seq {
        Dim::Known(actual) if actual > max_len => Err(Failure::at(
            IN,
            ShapeError::SequenceTooLong { max_len, actual },
        )),
        _ => Ok(()),
    }
}

fn resolve_axis(x: &Shape, axis: i64) -> Result<usize, Failure> {
    x.normalize_axis(axis).ok_or_else(|| {
        Failure::at(
            IN,
            ShapeError::AxisOutOfRange {
                axis,
                rank: x.rank(),
            },
        )
    })
}

/// Dimension-wise merge of two compatible shapes, preferring known dims.
fn unify(a: &Shape, b: &Shape) -> Option<Shape> {
    if !a.compatible(b) {
        return None;
    }
    let dims = a
        .dims()
        .iter()
        .zip(b.dims())
        .map(|(x, y)| if *x == Dim::Unknown { *y } else { *x })
        .collect();
    Some(Shape::new(dims))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[u64]) -> Shape {
        Shape::from_dims(dims)
    }

    fn one(x: Shape) -> InputShapes {
        InputShapes::new().with(IN, x)
    }

    fn run(block: BlockType, params: ParamSet, inputs: InputShapes) -> Result<Shape, Failure> {
        compute_output_shape(block, &params, &inputs)
    }

    #[test]
    fn input_datasets() {
        let mnist = ParamSet::new().with("dataset", "MNIST");
        assert_eq!(run(BlockType::Input, mnist, InputShapes::new()).unwrap(), shape(&[1, 28, 28]));
        let cifar = ParamSet::new().with("dataset", "cifar10");
        assert_eq!(run(BlockType::Input, cifar, InputShapes::new()).unwrap(), shape(&[3, 32, 32]));
        assert_eq!(dataset_shape("fashion_mnist"), Some(shape(&[1, 28, 28])));
    }

    #[test]
    fn unknown_dataset() {
        let params = ParamSet::new().with("dataset", "ImageNet");
        let f = run(BlockType::Input, params, InputShapes::new()).unwrap_err();
        assert_eq!(
            f.error,
            ShapeError::UnknownDataset {
                dataset: "ImageNet".to_string()
            }
        );
        assert_eq!(f.handle, None);
    }

    #[test]
    fn flatten_then_linear() {
        let flat = run(BlockType::Flatten, ParamSet::new(), one(shape(&[1, 28, 28]))).unwrap();
        assert_eq!(flat, shape(&[784]));
        let params = ParamSet::new()
            .with("in_features", 784u64)
            .with("out_features", 128u64);
        assert_eq!(run(BlockType::Linear, params, one(flat)).unwrap(), shape(&[128]));
    }

    #[test]
    fn linear_last_dim_mismatch() {
        let params = ParamSet::new()
            .with("in_features", 10u64)
            .with("out_features", 5u64);
        let f = run(BlockType::Linear, params, one(shape(&[1, 28, 28]))).unwrap_err();
        assert_eq!(
            f.error,
            ShapeError::DimensionMismatch {
                param: "in_features".to_string(),
                expected: 10,
                actual: 28
            }
        );
        assert_eq!(f.handle.as_deref(), Some("in"));
    }

    #[test]
    fn linear_keeps_leading_dims() {
        let params = ParamSet::new()
            .with("in_features", 64u64)
            .with("out_features", 32u64);
        assert_eq!(
            run(BlockType::Linear, params, one(shape(&[16, 64]))).unwrap(),
            shape(&[16, 32])
        );
    }

    #[test]
    fn missing_input_precedes_rule() {
        let f = run(BlockType::Linear, ParamSet::new(), InputShapes::new()).unwrap_err();
        assert_eq!(
            f.error,
            ShapeError::MissingInput {
                handle: "in".to_string()
            }
        );
    }

    #[test]
    fn schema_violation_precedes_missing_input() {
        let params = ParamSet::new().with("out_features", 0u64);
        let f = run(BlockType::Linear, params, InputShapes::new()).unwrap_err();
        assert!(matches!(f.error, ShapeError::InvalidParam { ref key, .. } if key == "out_features"));
    }

    #[test]
    fn conv2d_output_extent() {
        let params = ParamSet::new()
            .with("out_channels", 16u64)
            .with("kernel_size", 3u64)
            .with("stride", 1u64)
            .with("padding", 1u64);
        assert_eq!(
            run(BlockType::Conv2D, params, one(shape(&[3, 32, 32]))).unwrap(),
            shape(&[16, 32, 32])
        );
    }

    #[test]
    fn conv2d_rectangular_kernel_and_stride() {
        let params = ParamSet::new()
            .with("out_channels", 8u64)
            .with("kernel_size", vec![3.0, 5.0])
            .with("stride", 2u64)
            .with("padding", 0u64);
        // h: floor((28 - 3) / 2) + 1 = 13, w: floor((28 - 5) / 2) + 1 = 12
        assert_eq!(
            run(BlockType::Conv2D, params, one(shape(&[1, 28, 28]))).unwrap(),
            shape(&[8, 13, 12])
        );
    }

    #[test]
    fn conv2d_collapses_spatial_dims() {
        let params = ParamSet::new()
            .with("kernel_size", 5u64)
            .with("stride", 1u64)
            .with("padding", 0u64);
        let f = run(BlockType::Conv2D, params, one(shape(&[1, 3, 3]))).unwrap_err();
        assert_eq!(
            f.error,
            ShapeError::InvalidSpatialReduction {
                axis: "height".to_string(),
                size: -1
            }
        );
    }

    #[test]
    fn conv2d_needs_rank_three() {
        let f = run(BlockType::Conv2D, ParamSet::new(), one(shape(&[784]))).unwrap_err();
        assert_eq!(f.code().0, "E0106");
    }

    #[test]
    fn conv2d_checks_configured_in_channels() {
        let params = ParamSet::new().with("in_channels", 3u64);
        let f = run(BlockType::Conv2D, params, one(shape(&[1, 28, 28]))).unwrap_err();
        assert!(matches!(
            f.error,
            ShapeError::DimensionMismatch { expected: 3, actual: 1, .. }
        ));
    }

    #[test]
    fn lstm_sequences() {
        let params = ParamSet::new().with("hidden_size", 64u64);
        assert_eq!(
            run(BlockType::LSTM, params.clone(), one(shape(&[20, 32]))).unwrap(),
            shape(&[20, 64])
        );
        let last_only = params.with("return_sequences", false);
        assert_eq!(
            run(BlockType::LSTM, last_only, one(shape(&[20, 32]))).unwrap(),
            shape(&[64])
        );
        let flat = ParamSet::new().with("hidden_size", 64u64);
        assert_eq!(run(BlockType::LSTM, flat, one(shape(&[32]))).unwrap(), shape(&[64]));
    }

    #[test]
    fn lstm_input_size() {
        let params = ParamSet::new().with("input_size", 16u64);
        let f = run(BlockType::LSTM, params, one(shape(&[20, 32]))).unwrap_err();
        assert!(matches!(f.error, ShapeError::DimensionMismatch { expected: 16, actual: 32, .. }));
    }

    fn qkv(q: &[u64], k: &[u64], v: &[u64]) -> InputShapes {
        InputShapes::new()
            .with("query", shape(q))
            .with("key", shape(k))
            .with("value", shape(v))
    }

    #[test]
    fn attention_outputs_query_shape() {
        let out = run(BlockType::Attention, ParamSet::new(), qkv(&[10, 32], &[12, 32], &[12, 32]));
        assert_eq!(out.unwrap(), shape(&[10, 32]));
    }

    #[test]
    fn attention_embedding_mismatch_attributed_to_handle() {
        let f = run(BlockType::Attention, ParamSet::new(), qkv(&[10, 32], &[10, 64], &[10, 32]))
            .unwrap_err();
        assert_eq!(f.error, ShapeError::EmbeddingDimMismatch { expected: 32, actual: 64 });
        assert_eq!(f.handle.as_deref(), Some("key"));
    }

    #[test]
    fn attention_requires_all_three_handles() {
        let inputs = InputShapes::new().with("query", shape(&[10, 32]));
        let f = run(BlockType::Attention, ParamSet::new(), inputs).unwrap_err();
        assert_eq!(f.error, ShapeError::MissingInput { handle: "key".to_string() });
    }

    #[test]
    fn attention_heads_must_divide_embed_dim() {
        let params = ParamSet::new()
            .with("embed_dim", 30u64)
            .with("num_heads", 4u64);
        let f = run(BlockType::Attention, params, qkv(&[10, 30], &[10, 30], &[10, 30])).unwrap_err();
        assert!(matches!(f.error, ShapeError::InvalidParam { ref key, .. } if key == "num_heads"));
    }

    #[test]
    fn norms_validate_configured_sizes() {
        let ln = ParamSet::new().with("normalized_shape", 64u64);
        assert!(run(BlockType::LayerNorm, ln.clone(), one(shape(&[10, 64]))).is_ok());
        assert!(run(BlockType::LayerNorm, ln, one(shape(&[10, 32]))).is_err());

        let bn = ParamSet::new().with("num_features", 16u64);
        assert!(run(BlockType::BatchNorm, bn.clone(), one(shape(&[16, 8, 8]))).is_ok());
        let f = run(BlockType::BatchNorm, bn, one(shape(&[3, 8, 8]))).unwrap_err();
        assert_eq!(f.code().0, "E0101");
    }

    #[test]
    fn identity_blocks() {
        let x = shape(&[4, 5]);
        for block in [BlockType::Activation, BlockType::Dropout, BlockType::Softmax, BlockType::Output] {
            assert_eq!(run(block, ParamSet::new(), one(x.clone())).unwrap(), x, "{block}");
        }
    }

    #[test]
    fn softmax_axis_out_of_range() {
        let params = ParamSet::new().with("dim", 2i64);
        let f = run(BlockType::Softmax, params, one(shape(&[10]))).unwrap_err();
        assert_eq!(f.error, ShapeError::AxisOutOfRange { axis: 2, rank: 1 });
    }

    #[test]
    fn embedding_appends_dim() {
        let params = ParamSet::new().with("embedding_dim", 32u64);
        assert_eq!(
            run(BlockType::Embedding, params.clone(), one(shape(&[50]))).unwrap(),
            shape(&[50, 32])
        );
        assert!(run(BlockType::TextEmbedding, params, one(shape(&[50, 2]))).is_err());
    }

    fn merged(shapes: &[&[u64]]) -> InputShapes {
        shapes
            .iter()
            .fold(InputShapes::new(), |acc, s| acc.with(IN, shape(s)))
    }

    #[test]
    fn add_requires_identical_shapes() {
        let f = run(BlockType::Add, ParamSet::new(), merged(&[&[10], &[20]])).unwrap_err();
        assert_eq!(
            f.error,
            ShapeError::ShapeMismatch {
                expected: shape(&[10]),
                actual: shape(&[20])
            }
        );
        assert_eq!(
            run(BlockType::Add, ParamSet::new(), merged(&[&[10], &[10]])).unwrap(),
            shape(&[10])
        );
    }

    #[test]
    fn add_fills_unknown_dims() {
        let inputs = InputShapes::new()
            .with(IN, Shape::new(vec![Dim::Unknown, Dim::Known(8)]))
            .with(IN, shape(&[4, 8]));
        assert_eq!(run(BlockType::Add, ParamSet::new(), inputs).unwrap(), shape(&[4, 8]));
    }

    #[test]
    fn concat_sums_axis() {
        let params = ParamSet::new().with("axis", -1i64);
        assert_eq!(
            run(BlockType::Concat, params, merged(&[&[10, 32], &[10, 16], &[10, 8]])).unwrap(),
            shape(&[10, 56])
        );
    }

    #[test]
    fn concat_disagreement_off_axis() {
        let params = ParamSet::new().with("axis", 0i64);
        let f = run(BlockType::Concat, params, merged(&[&[4, 8], &[4, 9]])).unwrap_err();
        assert!(matches!(f.error, ShapeError::AxisMismatch { axis: 0, .. }));
    }

    #[test]
    fn merge_failures_name_the_offending_input() {
        let f = run(BlockType::Add, ParamSet::new(), merged(&[&[10], &[10], &[20]])).unwrap_err();
        assert_eq!(f.handle.as_deref(), Some(IN));
        assert_eq!(f.input, Some(2));

        let params = ParamSet::new().with("axis", -1i64);
        let f = run(BlockType::Concat, params, merged(&[&[8, 16], &[4, 16], &[8, 32]])).unwrap_err();
        assert_eq!(f.input, Some(1));
    }

    #[test]
    fn single_input_merge_is_identity() {
        assert_eq!(
            run(BlockType::Concat, ParamSet::new(), merged(&[&[3, 4]])).unwrap(),
            shape(&[3, 4])
        );
    }

    #[test]
    fn text_pipeline() {
        let seq = run(
            BlockType::TextInput,
            ParamSet::new().with("seq_len", 64u64),
            InputShapes::new(),
        )
        .unwrap();
        assert_eq!(seq, shape(&[64]));
        let emb = run(
            BlockType::TextEmbedding,
            ParamSet::new().with("embedding_dim", 128u64),
            one(seq),
        )
        .unwrap();
        let params = ParamSet::new()
            .with("d_model", 128u64)
            .with("max_len", 32u64);
        let f = run(BlockType::PositionalEmbedding, params, one(emb.clone())).unwrap_err();
        assert_eq!(f.error, ShapeError::SequenceTooLong { max_len: 32, actual: 64 });

        let pe = ParamSet::new().with("d_model", 128u64);
        assert_eq!(run(BlockType::PositionalEncoding, pe, one(emb.clone())).unwrap(), emb);
    }

    #[test]
    fn unknown_dims_never_mismatch() {
        let x = Shape::new(vec![Dim::Unknown]);
        let params = ParamSet::new()
            .with("in_features", 10u64)
            .with("out_features", 5u64);
        assert_eq!(run(BlockType::Linear, params, one(x)).unwrap(), shape(&[5]));
    }

    #[test]
    fn candidate_ignores_unconnected_handles() {
        let inputs = InputShapes::new().with("key", shape(&[10, 64]));
        let params = ParamSet::new().with("embed_dim", 32u64);
        let f = check_candidate(BlockType::Attention, &params, &inputs).unwrap_err();
        assert_eq!(f.error, ShapeError::EmbeddingDimMismatch { expected: 32, actual: 64 });

        let inputs = InputShapes::new().with("key", shape(&[10, 32]));
        assert!(check_candidate(BlockType::Attention, &params, &inputs).is_ok());
    }

    #[test]
    fn candidate_ignores_target_misconfiguration() {
        let params = ParamSet::new().with("dataset", "nope");
        assert!(check_candidate(BlockType::Input, &params, &InputShapes::new()).is_ok());
        let params = ParamSet::new().with("out_features", -1i64);
        assert!(check_candidate(BlockType::Linear, &params, &one(shape(&[4]))).is_ok());
    }
}
