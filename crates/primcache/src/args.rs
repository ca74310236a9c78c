//! Argument roles and descriptor queries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary operands of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operand {
    Src,
    Weights,
    Bias,
    Dst,
}

impl Operand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operand::Src => "src",
            Operand::Weights => "weights",
            Operand::Bias => "bias",
            Operand::Dst => "dst",
        }
    }
}

/// Logical argument slot a memory object is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArgRole {
    Data(Operand),
    /// Scale decoration of an operand.
    Scales(Operand),
    /// Zero-point decoration of an operand.
    ZeroPoints(Operand),
    /// Second input of the post-op at this position in the post-op chain.
    PostOpSrc(u8),
    Workspace,
    Scratchpad,
}

impl ArgRole {
    pub const SRC: ArgRole = ArgRole::Data(Operand::Src);
    pub const WEIGHTS: ArgRole = ArgRole::Data(Operand::Weights);
    pub const BIAS: ArgRole = ArgRole::Data(Operand::Bias);
    pub const DST: ArgRole = ArgRole::Data(Operand::Dst);
}

impl fmt::Display for ArgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgRole::Data(operand) => f.write_str(operand.as_str()),
            ArgRole::Scales(operand) => write!(f, "scales({})", operand.as_str()),
            ArgRole::ZeroPoints(operand) => write!(f, "zero_points({})", operand.as_str()),
            ArgRole::PostOpSrc(index) => write!(f, "post_op_src({index})"),
            ArgRole::Workspace => f.write_str("workspace"),
            ArgRole::Scratchpad => f.write_str("scratchpad"),
        }
    }
}

/// Memory-descriptor kinds a plan can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MdKind {
    Src,
    DiffSrc,
    Weights,
    DiffWeights,
    Dst,
    DiffDst,
    Workspace,
    Scratchpad,
}

/// Everything a caller may ask a plan; only some of it is a memory descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Src,
    DiffSrc,
    Weights,
    DiffWeights,
    Dst,
    DiffDst,
    Workspace,
    Scratchpad,
    PrimitiveKind,
    NumInputs,
    NumOutputs,
    ImplInfo,
    MemoryConsumption,
}

impl Query {
    /// The descriptor kind this query names, or `None` for non-descriptor queries.
    pub const fn md_kind(self) -> Option<MdKind> {
        match self {
            Query::Src => Some(MdKind::Src),
            Query::DiffSrc => Some(MdKind::DiffSrc),
            Query::Weights => Some(MdKind::Weights),
            Query::DiffWeights => Some(MdKind::DiffWeights),
            Query::Dst => Some(MdKind::Dst),
            Query::DiffDst => Some(MdKind::DiffDst),
            Query::Workspace => Some(MdKind::Workspace),
            Query::Scratchpad => Some(MdKind::Scratchpad),
            Query::PrimitiveKind | Query::NumInputs | Query::NumOutputs | Query::ImplInfo | Query::MemoryConsumption => None,
        }
    }
}
