use crate::types::{ExprNode, Variable};
use std::collections::HashMap;

/// Variable values for one evaluation
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<Variable, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::new()
            .with(Variable::X, x)
            .with(Variable::Y, y)
            .with(Variable::Z, z)
    }

    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.values.insert(variable, value);
        self
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.values.insert(variable, value);
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied()
    }
}

/// Evaluates a tree with IEEE semantics: division by zero gives inf or NaN
/// rather than an error. An unbound variable evaluates to 0.0.
pub fn evaluate(node: &ExprNode, bindings: &Bindings) -> f64 {
    match node {
        ExprNode::Constant(value) => *value,
        ExprNode::Variable(variable) => bindings.get(*variable).unwrap_or(0.0),
        ExprNode::Unary(op, child) => op.apply(evaluate(child, bindings)),
        ExprNode::Binary(op, left, right) => {
            op.apply(evaluate(left, bindings), evaluate(right, bindings))
        }
        ExprNode::Ternary(op, left, middle, right) => op.apply(
            evaluate(left, bindings),
            evaluate(middle, bindings),
            evaluate(right, bindings),
        ),
    }
}
