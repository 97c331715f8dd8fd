use crate::config::GeneticsConfig;
use crate::engines::generation::equation::Equation;
use crate::types::{BinaryOp, ExprNode, TernaryOp, UnaryOp, Variable};
use rand::Rng;

/// Operator choice before its children exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
}

impl Operator {
    pub fn arity(&self) -> usize {
        match self {
            Operator::Unary(_) => 1,
            Operator::Binary(_) => 2,
            Operator::Ternary(_) => 3,
        }
    }

    fn all() -> Vec<Operator> {
        UnaryOp::ALL
            .iter()
            .map(|op| Operator::Unary(*op))
            .chain(BinaryOp::ALL.iter().map(|op| Operator::Binary(*op)))
            .chain(TernaryOp::ALL.iter().map(|op| Operator::Ternary(*op)))
            .collect()
    }

    /// Builds the node from exactly `arity()` children
    fn with_children(self, mut children: Vec<ExprNode>) -> ExprNode {
        debug_assert_eq!(children.len(), self.arity());
        match self {
            Operator::Unary(op) => ExprNode::unary(op, children.remove(0)),
            Operator::Binary(op) => {
                let right = children.remove(1);
                let left = children.remove(0);
                ExprNode::binary(op, left, right)
            }
            Operator::Ternary(op) => {
                let right = children.remove(2);
                let middle = children.remove(1);
                let left = children.remove(0);
                ExprNode::ternary(op, left, middle, right)
            }
        }
    }
}

pub fn random_constant<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> f64 {
    rng.gen_range(params.constant_min..params.constant_max)
}

/// x, y, z or a constant, each equally likely
pub fn random_leaf<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> ExprNode {
    let choice = rng.gen_range(0..Variable::ALL.len() + 1);
    match Variable::ALL.get(choice) {
        Some(variable) => ExprNode::Variable(*variable),
        None => ExprNode::Constant(random_constant(params, rng)),
    }
}

pub fn random_operator<R: Rng>(rng: &mut R) -> Operator {
    let operators = Operator::all();
    operators[rng.gen_range(0..operators.len())]
}

/// Random subtree grown top-down. Each node is an operator with probability
/// `operator_chance`; nodes at `max_tree_depth` are always leaves.
pub fn random_node<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> ExprNode {
    grow(params, rng, 1)
}

fn grow<R: Rng>(params: &GeneticsConfig, rng: &mut R, depth: usize) -> ExprNode {
    if depth >= params.max_tree_depth || rng.gen::<f64>() >= params.operator_chance {
        return random_leaf(params, rng);
    }
    let operator = random_operator(rng);
    let children = (0..operator.arity())
        .map(|_| grow(params, rng, depth + 1))
        .collect();
    operator.with_children(children)
}

// Clifford attractor templates: constants drawn once and shared between terms.

/// `sin(a*y) + c*cos(a*x)`
pub fn clifford_x<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> Equation {
    let a = random_constant(params, rng);
    let c = random_constant(params, rng);
    Equation::from_root(clifford_term(a, c))
}

/// `sin(b*y) + d*cos(b*x)`
pub fn clifford_y<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> Equation {
    let b = random_constant(params, rng);
    let d = random_constant(params, rng);
    Equation::from_root(clifford_term(b, d))
}

/// `a*x + b*y`
pub fn linear_z<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> Equation {
    let a = random_constant(params, rng);
    let b = random_constant(params, rng);
    Equation::from_root(ExprNode::binary(
        BinaryOp::Add,
        ExprNode::binary(BinaryOp::Mul, ExprNode::constant(a), ExprNode::var(Variable::X)),
        ExprNode::binary(BinaryOp::Mul, ExprNode::constant(b), ExprNode::var(Variable::Y)),
    ))
}

fn clifford_term(scale: f64, weight: f64) -> ExprNode {
    ExprNode::binary(
        BinaryOp::Add,
        ExprNode::unary(
            UnaryOp::Sin,
            ExprNode::binary(BinaryOp::Mul, ExprNode::constant(scale), ExprNode::var(Variable::Y)),
        ),
        ExprNode::binary(
            BinaryOp::Mul,
            ExprNode::constant(weight),
            ExprNode::unary(
                UnaryOp::Cos,
                ExprNode::binary(BinaryOp::Mul, ExprNode::constant(scale), ExprNode::var(Variable::X)),
            ),
        ),
    )
}
