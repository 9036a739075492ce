//! Built-in patterns.
//!
//! ```text
//! RMSNorm (LLaMA-style):
//!
//!     Power(*, *)   Constant
//!          │           │
//!          ▼           ▼
//!          ReduceMean
//!              │
//!              ▼
//!        Add(·, *)   (either operand order)
//!              │
//!              ▼
//!            Sqrt
//! ```

use graphtag_core::{OpKind, PatternParams, normalize_ident};

use crate::descriptor::{InputSpec, Pattern, PatternBuilder};
use crate::filter::{AttrPredicate, NodeFilter};

pub const RMS_NORM: &str = "rms_norm";
pub const EMBEDDING_GATHER: &str = "embedding_gather";

/// Names accepted by [`by_name`] (spelling is case and separator insensitive).
pub const NAMES: [&str; 2] = [RMS_NORM, EMBEDDING_GATHER];

/// `Power → ReduceMean → Add → Sqrt`, rooted at the `Sqrt`.
///
/// Binds four slots: `power`, `reduce`, `add`, `sqrt`. The power's operands
/// and the add's other operand may be anything; the reduction axes must be
/// a constant. The `add` is commutative, so `Add(eps, mean)` matches too.
pub fn rms_norm() -> Pattern {
    let mut p = PatternBuilder::new(RMS_NORM);
    let power = p.op("power", OpKind::Power, &[InputSpec::any(), InputSpec::any()]);
    let reduce = p.op(
        "reduce",
        OpKind::ReduceMean,
        &[power.into(), InputSpec::kind(OpKind::Constant)],
    );
    let add = p.op("add", OpKind::Add, &[reduce.into(), InputSpec::any()]);
    p.commutative(add);
    let sqrt = p.op("sqrt", OpKind::Sqrt, &[add.into()]);
    p.build(sqrt).expect("rms_norm pattern is well-formed")
}

/// Embedding-table dimensions an [`embedding_gather`] pattern should require.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingShape {
    pub vocab_size: Option<usize>,
    pub hidden_size: Option<usize>,
}

impl From<&PatternParams> for EmbeddingShape {
    fn from(params: &PatternParams) -> Self {
        Self {
            vocab_size: params.vocab_size,
            hidden_size: params.hidden_size,
        }
    }
}

/// Token-embedding lookup: `Gather(table, Convert(Parameter), *)`, rooted at
/// the `Gather`.
///
/// Binds `convert` and `gather`. When `shape` gives sizes, the gathered
/// table must be rank 2 with the given vocabulary (axis 0) and hidden
/// (axis 1) dimensions.
pub fn embedding_gather(shape: EmbeddingShape) -> Pattern {
    let mut table = NodeFilter::any();
    if shape.vocab_size.is_some() || shape.hidden_size.is_some() {
        table = table.with(AttrPredicate::Rank(2));
    }
    if let Some(size) = shape.vocab_size {
        table = table.with(AttrPredicate::DimEq { axis: 0, size });
    }
    if let Some(size) = shape.hidden_size {
        table = table.with(AttrPredicate::DimEq { axis: 1, size });
    }

    let mut p = PatternBuilder::new(EMBEDDING_GATHER);
    let convert = p.op("convert", OpKind::Convert, &[InputSpec::kind(OpKind::Parameter)]);
    let gather = p.op(
        "gather",
        OpKind::Gather,
        &[InputSpec::guard(table), convert.into(), InputSpec::any()],
    );
    p.build(gather).expect("embedding_gather pattern is well-formed")
}

/// A single node of the given kind, with unconstrained inputs.
pub fn single_op(kind: OpKind) -> Pattern {
    let mut p = PatternBuilder::new(format!("op:{kind}"));
    let slot = p.leaf(kind.as_str(), NodeFilter::kind(kind));
    p.build(slot).expect("single-slot pattern is well-formed")
}

/// Look up a library pattern by name.
pub fn by_name(name: &str, params: &PatternParams) -> Option<Pattern> {
    let wanted = normalize_ident(name);
    if wanted == normalize_ident(RMS_NORM) {
        Some(rms_norm())
    } else if wanted == normalize_ident(EMBEDDING_GATHER) || wanted == "embedding" {
        Some(embedding_gather(EmbeddingShape::from(params)))
    } else {
        None
    }
}
