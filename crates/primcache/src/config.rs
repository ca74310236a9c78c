//! Plan construction attributes filled in by configuration closures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element-wise activation applied as a post-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Silu,
    Gelu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Silu => "silu",
            Activation::Gelu => "gelu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryAlg {
    Add,
    Mul,
}

/// One step of the post-op chain, applied to the accumulator in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostOp {
    Eltwise(Activation),
    /// Combine with a second tensor bound as [`ArgRole::PostOpSrc`](crate::args::ArgRole::PostOpSrc)
    /// at this post-op's position.
    Binary { alg: BinaryAlg },
}

/// Who owns the plan's temporary memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScratchpadMode {
    #[default]
    Library,
    /// The plan reports a scratchpad descriptor and expects it to be bound.
    User,
}

/// Attributes a configuration closure may set before a plan is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanConfig {
    post_ops: Vec<PostOp>,
    scratchpad_mode: ScratchpadMode,
}

impl PlanConfig {
    pub fn append_eltwise(&mut self, activation: Activation) -> &mut Self {
        self.post_ops.push(PostOp::Eltwise(activation));
        self
    }

    pub fn append_binary(&mut self, alg: BinaryAlg) -> &mut Self {
        self.post_ops.push(PostOp::Binary { alg });
        self
    }

    pub fn set_scratchpad_mode(&mut self, mode: ScratchpadMode) -> &mut Self {
        self.scratchpad_mode = mode;
        self
    }

    #[inline]
    pub fn post_ops(&self) -> &[PostOp] {
        &self.post_ops
    }

    #[inline]
    pub fn scratchpad_mode(&self) -> ScratchpadMode {
        self.scratchpad_mode
    }

    /// Chain positions of the binary post-ops.
    pub fn binary_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.post_ops
            .iter()
            .enumerate()
            .filter_map(|(index, op)| matches!(op, PostOp::Binary { .. }).then_some(index))
    }
}
