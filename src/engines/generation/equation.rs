use crate::config::GeneticsConfig;
use crate::engines::evaluation::{evaluate, Bindings};
use crate::engines::generation::{operators, parser};
use crate::error::Result;
use crate::types::ExprNode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An expression tree together with its infix text.
///
/// The text is whatever the caller parsed until the tree changes; after any
/// genetic operator it is regenerated from the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    infix: String,
    root: ExprNode,
}

impl Equation {
    pub fn parse(infix: &str) -> Result<Self> {
        let root = parser::parse_expression(infix)?;
        Ok(Self {
            infix: infix.to_string(),
            root,
        })
    }

    pub fn from_root(root: ExprNode) -> Self {
        let infix = root.to_string();
        Self { infix, root }
    }

    pub fn infix(&self) -> &str {
        &self.infix
    }

    pub fn root(&self) -> &ExprNode {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn evaluate(&self, bindings: &Bindings) -> f64 {
        evaluate(&self.root, bindings)
    }

    /// Mutable access to the tree; the infix text is regenerated afterwards
    pub(crate) fn modify<F: FnOnce(&mut ExprNode)>(&mut self, f: F) {
        f(&mut self.root);
        self.refresh_infix();
    }

    fn refresh_infix(&mut self) {
        self.infix = self.root.to_string();
    }

    pub fn cross<R: Rng>(&self, other: &Equation, rng: &mut R) -> (Equation, Equation) {
        operators::crossover(self, other, rng)
    }

    pub fn mutate<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Equation {
        operators::mutate(self, params, rng)
    }

    pub fn mutate_in_place<R: Rng>(&mut self, params: &GeneticsConfig, rng: &mut R) {
        operators::mutate_in_place(self, params, rng)
    }

    pub fn introduce<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Equation {
        operators::introduce(self, params, rng)
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.infix)
    }
}

impl std::str::FromStr for Equation {
    type Err = crate::error::AestheticError;

    fn from_str(s: &str) -> Result<Self> {
        Equation::parse(s)
    }
}
