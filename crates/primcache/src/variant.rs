//! Catalogue of post-operation variants.
//!
//! A variant is both part of the [`OpKey`](crate::key::OpKey) and the source of
//! the configuration closure used when that key misses, so the two can never
//! disagree.

use std::fmt;

use serde::Serialize;

use crate::args::ArgRole;
use crate::config::{Activation, BinaryAlg, PlanConfig};
use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum OpVariant {
    #[default]
    Plain,
    Activation(Activation),
    /// Adds a same-shape residual tensor to the output.
    ResidualAdd,
    /// Activation first, then the residual add.
    ActivationResidual(Activation),
    /// Slot for caller-supplied closures; applies nothing itself.
    Custom(&'static str),
}

impl OpVariant {
    /// Apply this variant's post-ops to `config`.
    pub fn configure(&self, config: &mut PlanConfig) -> Result<(), PlanError> {
        match *self {
            OpVariant::Plain | OpVariant::Custom(_) => {}
            OpVariant::Activation(activation) => {
                config.append_eltwise(activation);
            }
            OpVariant::ResidualAdd => {
                config.append_binary(BinaryAlg::Add);
            }
            OpVariant::ActivationResidual(activation) => {
                config.append_eltwise(activation).append_binary(BinaryAlg::Add);
            }
        }
        Ok(())
    }

    /// [`configure`](Self::configure) as a value accepted by
    /// [`PlanCache::resolve`](crate::caching::PlanCache::resolve).
    pub fn closure(self) -> impl FnOnce(&mut PlanConfig) -> Result<(), PlanError> {
        move |config| self.configure(config)
    }

    /// Role the residual operand is bound under, if the variant has one.
    pub const fn residual_role(&self) -> Option<ArgRole> {
        match self {
            OpVariant::ResidualAdd => Some(ArgRole::PostOpSrc(0)),
            OpVariant::ActivationResidual(_) => Some(ArgRole::PostOpSrc(1)),
            _ => None,
        }
    }
}

impl fmt::Display for OpVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpVariant::Plain => f.write_str("plain"),
            OpVariant::Activation(activation) => write!(f, "{activation}"),
            OpVariant::ResidualAdd => f.write_str("resadd"),
            OpVariant::ActivationResidual(activation) => write!(f, "{activation}+resadd"),
            OpVariant::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}
