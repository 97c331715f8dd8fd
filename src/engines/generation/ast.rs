use crate::types::{BinaryOp, ExprNode, TernaryOp, UnaryOp, Variable};
use std::fmt;

impl ExprNode {
    pub fn constant(value: f64) -> Self {
        ExprNode::Constant(value)
    }

    pub fn var(variable: Variable) -> Self {
        ExprNode::Variable(variable)
    }

    pub fn unary(op: UnaryOp, child: ExprNode) -> Self {
        ExprNode::Unary(op, Box::new(child))
    }

    pub fn binary(op: BinaryOp, left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn ternary(op: TernaryOp, left: ExprNode, middle: ExprNode, right: ExprNode) -> Self {
        ExprNode::Ternary(op, Box::new(left), Box::new(middle), Box::new(right))
    }

    pub fn arity(&self) -> usize {
        match self {
            ExprNode::Constant(_) | ExprNode::Variable(_) => 0,
            ExprNode::Unary(..) => 1,
            ExprNode::Binary(..) => 2,
            ExprNode::Ternary(..) => 3,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.arity() == 0
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ExprNode::Constant(_))
    }

    /// Children in preorder position (left, middle, right)
    pub fn children(&self) -> Vec<&ExprNode> {
        match self {
            ExprNode::Constant(_) | ExprNode::Variable(_) => Vec::new(),
            ExprNode::Unary(_, child) => vec![child.as_ref()],
            ExprNode::Binary(_, left, right) => vec![left.as_ref(), right.as_ref()],
            ExprNode::Ternary(_, left, middle, right) => {
                vec![left.as_ref(), middle.as_ref(), right.as_ref()]
            }
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut ExprNode> {
        match self {
            ExprNode::Constant(_) | ExprNode::Variable(_) => Vec::new(),
            ExprNode::Unary(_, child) => vec![child.as_mut()],
            ExprNode::Binary(_, left, right) => vec![left.as_mut(), right.as_mut()],
            ExprNode::Ternary(_, left, middle, right) => {
                vec![left.as_mut(), middle.as_mut(), right.as_mut()]
            }
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().iter().map(|c| c.leaf_count()).sum()
        }
    }

    /// Preorder indices of every leaf
    pub fn leaf_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut next = 0;
        Self::collect_leaves(self, &mut next, &mut indices);
        indices
    }

    fn collect_leaves(node: &ExprNode, next: &mut usize, out: &mut Vec<usize>) {
        if node.is_leaf() {
            out.push(*next);
        }
        *next += 1;
        for child in node.children() {
            Self::collect_leaves(child, next, out);
        }
    }

    /// Node at preorder `index`; the root is index 0
    pub fn subtree(&self, index: usize) -> Option<&ExprNode> {
        let mut remaining = index;
        Self::find(self, &mut remaining)
    }

    fn find<'a>(node: &'a ExprNode, remaining: &mut usize) -> Option<&'a ExprNode> {
        if *remaining == 0 {
            return Some(node);
        }
        *remaining -= 1;
        for child in node.children() {
            if let Some(found) = Self::find(child, remaining) {
                return Some(found);
            }
        }
        None
    }

    pub fn subtree_mut(&mut self, index: usize) -> Option<&mut ExprNode> {
        let mut remaining = index;
        Self::find_mut(self, &mut remaining)
    }

    fn find_mut<'a>(node: &'a mut ExprNode, remaining: &mut usize) -> Option<&'a mut ExprNode> {
        if *remaining == 0 {
            return Some(node);
        }
        *remaining -= 1;
        for child in node.children_mut() {
            if let Some(found) = Self::find_mut(child, remaining) {
                return Some(found);
            }
        }
        None
    }

    /// Visit every node mutably in preorder
    pub fn for_each_mut<F: FnMut(&mut ExprNode)>(&mut self, f: &mut F) {
        f(self);
        for child in self.children_mut() {
            child.for_each_mut(f);
        }
    }

    pub fn constants(&self) -> Vec<f64> {
        let mut values = Vec::new();
        self.collect_constants(&mut values);
        values
    }

    fn collect_constants(&self, out: &mut Vec<f64>) {
        if let ExprNode::Constant(value) = self {
            out.push(*value);
        }
        for child in self.children() {
            child.collect_constants(out);
        }
    }

    /// Preorder labels of every non-constant node
    pub fn structure_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        self.collect_labels(&mut labels);
        labels
    }

    fn collect_labels(&self, out: &mut Vec<String>) {
        match self {
            ExprNode::Constant(_) => out.push("#".to_string()),
            ExprNode::Variable(v) => out.push(v.name().to_string()),
            ExprNode::Unary(op, _) => out.push(op.name().to_string()),
            ExprNode::Binary(op, _, _) => out.push(op.symbol().to_string()),
            ExprNode::Ternary(op, _, _, _) => out.push(op.name().to_string()),
        }
        for child in self.children() {
            child.collect_labels(out);
        }
    }

    /// Writes the node as infix text. Binary nodes below the top level are
    /// parenthesised so the text parses back to the same tree.
    fn write_infix(&self, f: &mut fmt::Formatter<'_>, top: bool) -> fmt::Result {
        match self {
            ExprNode::Constant(value) => {
                if value.is_sign_negative() && !top {
                    write!(f, "({})", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            ExprNode::Variable(v) => f.write_str(v.name()),
            ExprNode::Unary(op, child) => {
                write!(f, "{}(", op.name())?;
                child.write_infix(f, true)?;
                f.write_str(")")
            }
            ExprNode::Binary(op, left, right) => {
                if !top {
                    f.write_str("(")?;
                }
                left.write_infix(f, false)?;
                write!(f, "{}", op.symbol())?;
                right.write_infix(f, false)?;
                if !top {
                    f.write_str(")")?;
                }
                Ok(())
            }
            ExprNode::Ternary(op, left, middle, right) => {
                write!(f, "{}(", op.name())?;
                left.write_infix(f, true)?;
                f.write_str(", ")?;
                middle.write_infix(f, true)?;
                f.write_str(", ")?;
                right.write_infix(f, true)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_infix(f, true)
    }
}
