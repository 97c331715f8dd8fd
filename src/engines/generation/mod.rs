pub mod ast;
pub mod parser;
pub mod equation;
pub mod random;
pub mod operators;
pub mod fractal;
pub mod population;

pub use equation::Equation;
pub use parser::parse_expression;
pub use fractal::{lock_fractal, Fractal, Genes, Lineage, SharedFractal};
pub use population::{Generation, Population, Selection, POPULATION_SIZE};
