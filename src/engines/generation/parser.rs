//! Infix expression parser.
//!
//! Text is tokenized, reordered into postfix with the shunting-yard
//! algorithm, and the postfix sequence is folded into an [`ExprNode`] tree.
//! Operator names are resolved to enum variants here, once, so evaluation
//! never matches on strings.

use crate::error::{AestheticError, Result};
use crate::types::{BinaryOp, ExprNode, TernaryOp, UnaryOp, Variable};

/// Binding strength of prefix minus: tighter than `*`, looser than `^`
const NEGATE_PRECEDENCE: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Operator(char),
    LeftParen,
    RightParen,
    Comma,
}

#[derive(Debug, Clone, Copy)]
enum Function {
    Unary(UnaryOp),
    Ternary(TernaryOp),
}

impl Function {
    fn arity(&self) -> usize {
        match self {
            Function::Unary(_) => 1,
            Function::Ternary(_) => 3,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Function::Unary(op) => op.name(),
            Function::Ternary(op) => op.name(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Postfix {
    Number(f64),
    Variable(Variable),
    Negate,
    Binary(BinaryOp),
    Call(Function),
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Binary(BinaryOp),
    Negate,
    Call(Function),
    /// Opening parenthesis; `Some` when it opened a function call
    Paren(Option<CallFrame>),
}

#[derive(Debug, Clone, Copy)]
struct CallFrame {
    position: usize,
    args: usize,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // Optional exponent: e, E followed by an optionally signed integer
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text = &input[start..i];
            let value = text
                .parse::<f64>()
                .map_err(|_| AestheticError::parse(start, format!("invalid number '{}'", text)))?;
            if !value.is_finite() {
                return Err(AestheticError::parse(start, format!("number out of range '{}'", text)));
            }
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
            tokens.push((start, Token::Ident(input[start..i].to_string())));
            continue;
        }

        let token = match c {
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ',' => Token::Comma,
            '+' | '-' | '*' | '/' | '^' => Token::Operator(c),
            _ => {
                return Err(AestheticError::parse(
                    i,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        tokens.push((i, token));
        i += 1;
    }

    Ok(tokens)
}

/// Pops pending operators onto the output until an opening parenthesis
fn drain_to_paren(stack: &mut Vec<Pending>, output: &mut Vec<Postfix>) {
    while let Some(top) = stack.last().copied() {
        match top {
            Pending::Paren(_) => break,
            Pending::Binary(op) => output.push(Postfix::Binary(op)),
            Pending::Negate => output.push(Postfix::Negate),
            Pending::Call(function) => output.push(Postfix::Call(function)),
        }
        stack.pop();
    }
}

fn to_postfix(tokens: &[(usize, Token)], input_len: usize) -> Result<Vec<Postfix>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Pending> = Vec::new();
    let mut expect_operand = true;
    let mut iter = tokens.iter().peekable();

    while let Some((position, token)) = iter.next() {
        let position = *position;
        match token {
            Token::Number(value) => {
                if !expect_operand {
                    return Err(AestheticError::parse(position, "expected an operator"));
                }
                output.push(Postfix::Number(*value));
                expect_operand = false;
            }
            Token::Ident(name) => {
                if !expect_operand {
                    return Err(AestheticError::parse(position, "expected an operator"));
                }
                if let Some(variable) = Variable::from_name(name) {
                    output.push(Postfix::Variable(variable));
                    expect_operand = false;
                    continue;
                }
                let function = if let Some(op) = UnaryOp::from_name(name) {
                    Function::Unary(op)
                } else if let Some(op) = TernaryOp::from_name(name) {
                    Function::Ternary(op)
                } else {
                    return Err(AestheticError::parse(
                        position,
                        format!("unknown identifier '{}'", name),
                    ));
                };
                match iter.next() {
                    Some((paren_pos, Token::LeftParen)) => {
                        stack.push(Pending::Call(function));
                        stack.push(Pending::Paren(Some(CallFrame {
                            position: *paren_pos,
                            args: 0,
                        })));
                    }
                    _ => {
                        return Err(AestheticError::parse(
                            position,
                            format!("expected '(' after '{}'", function.name()),
                        ))
                    }
                }
            }
            Token::LeftParen => {
                if !expect_operand {
                    return Err(AestheticError::parse(position, "expected an operator"));
                }
                stack.push(Pending::Paren(None));
            }
            Token::Operator(symbol) => {
                if expect_operand {
                    match symbol {
                        '-' => stack.push(Pending::Negate),
                        '+' => {}
                        _ => {
                            return Err(AestheticError::parse(
                                position,
                                format!("operator '{}' is missing its left operand", symbol),
                            ))
                        }
                    }
                    continue;
                }
                let op = BinaryOp::from_symbol(*symbol).ok_or_else(|| {
                    AestheticError::parse(position, format!("unknown operator '{}'", symbol))
                })?;
                while let Some(top) = stack.last().copied() {
                    let (top_precedence, postfix) = match top {
                        Pending::Binary(top_op) => (top_op.precedence(), Postfix::Binary(top_op)),
                        Pending::Negate => (NEGATE_PRECEDENCE, Postfix::Negate),
                        _ => break,
                    };
                    let pops = top_precedence > op.precedence()
                        || (top_precedence == op.precedence() && !op.is_right_associative());
                    if !pops {
                        break;
                    }
                    output.push(postfix);
                    stack.pop();
                }
                stack.push(Pending::Binary(op));
                expect_operand = true;
            }
            Token::Comma => {
                if expect_operand {
                    return Err(AestheticError::parse(position, "empty argument"));
                }
                drain_to_paren(&mut stack, &mut output);
                match stack.last_mut() {
                    Some(Pending::Paren(Some(frame))) => frame.args += 1,
                    _ => {
                        return Err(AestheticError::parse(
                            position,
                            "',' outside of a function call",
                        ))
                    }
                }
                expect_operand = true;
            }
            Token::RightParen => {
                if expect_operand {
                    return Err(AestheticError::parse(position, "expected an operand before ')'"));
                }
                drain_to_paren(&mut stack, &mut output);
                match stack.pop() {
                    Some(Pending::Paren(None)) => {}
                    Some(Pending::Paren(Some(frame))) => {
                        let function = match stack.pop() {
                            Some(Pending::Call(function)) => function,
                            _ => {
                                return Err(AestheticError::parse(
                                    frame.position,
                                    "function call without a function",
                                ))
                            }
                        };
                        let args = frame.args + 1;
                        if args != function.arity() {
                            return Err(AestheticError::parse(
                                frame.position,
                                format!(
                                    "'{}' takes {} argument(s), got {}",
                                    function.name(),
                                    function.arity(),
                                    args
                                ),
                            ));
                        }
                        output.push(Postfix::Call(function));
                    }
                    _ => return Err(AestheticError::parse(position, "unbalanced ')'")),
                }
                expect_operand = false;
            }
        }
    }

    if expect_operand {
        return Err(AestheticError::parse(input_len, "unexpected end of expression"));
    }

    while let Some(top) = stack.pop() {
        match top {
            Pending::Binary(op) => output.push(Postfix::Binary(op)),
            Pending::Negate => output.push(Postfix::Negate),
            Pending::Call(_) | Pending::Paren(_) => {
                return Err(AestheticError::parse(input_len, "unbalanced '('"))
            }
        }
    }

    Ok(output)
}

fn build_tree(postfix: Vec<Postfix>) -> Result<ExprNode> {
    let mut stack: Vec<ExprNode> = Vec::new();
    let underflow = || AestheticError::parse(0, "malformed expression");

    for item in postfix {
        let node = match item {
            Postfix::Number(value) => ExprNode::Constant(value),
            Postfix::Variable(variable) => ExprNode::Variable(variable),
            Postfix::Negate => match stack.pop().ok_or_else(underflow)? {
                ExprNode::Constant(value) => ExprNode::Constant(-value),
                other => ExprNode::binary(BinaryOp::Mul, ExprNode::Constant(-1.0), other),
            },
            Postfix::Binary(op) => {
                let right = stack.pop().ok_or_else(underflow)?;
                let left = stack.pop().ok_or_else(underflow)?;
                ExprNode::binary(op, left, right)
            }
            Postfix::Call(Function::Unary(op)) => {
                let child = stack.pop().ok_or_else(underflow)?;
                ExprNode::unary(op, child)
            }
            Postfix::Call(Function::Ternary(op)) => {
                let right = stack.pop().ok_or_else(underflow)?;
                let middle = stack.pop().ok_or_else(underflow)?;
                let left = stack.pop().ok_or_else(underflow)?;
                ExprNode::ternary(op, left, middle, right)
            }
        };
        stack.push(node);
    }

    let root = stack.pop().ok_or_else(underflow)?;
    if !stack.is_empty() {
        return Err(underflow());
    }
    Ok(root)
}

/// Parse infix text into an expression tree
pub fn parse_expression(input: &str) -> Result<ExprNode> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(AestheticError::parse(0, "empty expression"));
    }
    let postfix = to_postfix(&tokens, input.len())?;
    build_tree(postfix)
}
