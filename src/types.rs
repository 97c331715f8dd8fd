use serde::{Deserialize, Serialize};
use std::fmt;

/// Variables an equation may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    X,
    Y,
    Z,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::X, Variable::Y, Variable::Z];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Variable::X),
            "y" => Some(Variable::Y),
            "z" => Some(Variable::Z),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Z => "z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Sin,
    Cos,
    Tan,
    Abs,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 4] = [UnaryOp::Sin, UnaryOp::Cos, UnaryOp::Tan, UnaryOp::Abs];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(UnaryOp::Sin),
            "cos" => Some(UnaryOp::Cos),
            "tan" => Some(UnaryOp::Tan),
            "abs" => Some(UnaryOp::Abs),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Abs => "abs",
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            UnaryOp::Sin => value.sin(),
            UnaryOp::Cos => value.cos(),
            UnaryOp::Tan => value.tan(),
            UnaryOp::Abs => value.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 5] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Pow,
    ];

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            '*' => Some(BinaryOp::Mul),
            '/' => Some(BinaryOp::Div),
            '^' => Some(BinaryOp::Pow),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Pow => '^',
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    pub fn apply(&self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => left.powf(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TernaryOp {
    /// `if(cond, then, else)`: `then` when `cond > 0`
    If,
}

impl TernaryOp {
    pub const ALL: [TernaryOp; 1] = [TernaryOp::If];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "if" => Some(TernaryOp::If),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TernaryOp::If => "if",
        }
    }

    pub fn apply(&self, cond: f64, then: f64, otherwise: f64) -> f64 {
        match self {
            TernaryOp::If => {
                if cond > 0.0 {
                    then
                } else {
                    otherwise
                }
            }
        }
    }
}

/// Expression tree node. Children are owned boxes, so the arity of every
/// operator is fixed by its variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    Constant(f64),
    Variable(Variable),
    Unary(UnaryOp, Box<ExprNode>),
    Binary(BinaryOp, Box<ExprNode>, Box<ExprNode>),
    Ternary(TernaryOp, Box<ExprNode>, Box<ExprNode>, Box<ExprNode>),
}

/// Generative channel an equation drives, in renderer argument order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    R,
    G,
    B,
}

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::X, Axis::Y, Axis::Z, Axis::R, Axis::G, Axis::B];

    /// Argument passed to the renderer when a fractal has no equation for the axis
    pub fn default_argument(&self) -> &'static str {
        match self {
            Axis::X | Axis::Y | Axis::Z => "0",
            Axis::R | Axis::G | Axis::B => "1",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::R => "r",
            Axis::G => "g",
            Axis::B => "b",
        }
    }
}

/// Genetic operation that produced a fractal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Cross,
    Mutate,
    Introduce,
    Random,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Cross => "cross",
            Operation::Mutate => "mutate",
            Operation::Introduce => "introduce",
            Operation::Random => "random",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a fractal's image artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArtifactState {
    #[default]
    Pending,
    Rendering,
    Ready,
    Discarded,
    Failed,
}
