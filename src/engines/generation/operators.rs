use crate::config::GeneticsConfig;
use crate::engines::generation::equation::Equation;
use crate::engines::generation::random::random_node;
use crate::types::ExprNode;
use rand::Rng;

/// Subtree crossover on clones of `a` and `b`.
///
/// One node is chosen uniformly from each tree, excluding the roots, and the
/// two subtrees trade places. Nodes are relocated, never copied or dropped, so
/// the combined node count is unchanged. A single-node tree has no swap point;
/// the clones come back unchanged in that case.
pub fn crossover<R: Rng>(a: &Equation, b: &Equation, rng: &mut R) -> (Equation, Equation) {
    let mut child1 = a.clone();
    let mut child2 = b.clone();

    let count1 = child1.node_count();
    let count2 = child2.node_count();
    if count1 < 2 || count2 < 2 {
        return (child1, child2);
    }

    let point1 = rng.gen_range(1..count1);
    let point2 = rng.gen_range(1..count2);

    // Lift the second subtree out, drop it into the first tree, and put what
    // was there back into the second tree.
    let mut carried = ExprNode::Constant(0.0);
    child2.modify(|root| {
        if let Some(node) = root.subtree_mut(point2) {
            std::mem::swap(node, &mut carried);
        }
    });
    child1.modify(|root| {
        if let Some(node) = root.subtree_mut(point1) {
            std::mem::swap(node, &mut carried);
        }
    });
    child2.modify(|root| {
        if let Some(node) = root.subtree_mut(point2) {
            std::mem::swap(node, &mut carried);
        }
    });

    (child1, child2)
}

/// Mutation on a clone of `equation`
pub fn mutate<R: Rng>(equation: &Equation, params: &GeneticsConfig, rng: &mut R) -> Equation {
    let mut child = equation.clone();
    mutate_in_place(&mut child, params, rng);
    child
}

/// Perturbs constants only. Each constant shifts with probability
/// `mutate_chance` by a delta in `[-mutate_range, mutate_range)` and is then
/// folded with `% mutate_fold` so values stay near zero.
pub fn mutate_in_place<R: Rng>(equation: &mut Equation, params: &GeneticsConfig, rng: &mut R) {
    equation.modify(|root| {
        root.for_each_mut(&mut |node| {
            if let ExprNode::Constant(value) = node {
                if rng.gen::<f64>() < params.mutate_chance {
                    let delta = rng.gen_range(-params.mutate_range..params.mutate_range);
                    *value = (*value + delta) % params.mutate_fold;
                }
            }
        });
    });
}

/// Replaces one random leaf of a clone with a freshly grown subtree
pub fn introduce<R: Rng>(equation: &Equation, params: &GeneticsConfig, rng: &mut R) -> Equation {
    let mut child = equation.clone();
    let leaves = child.root().leaf_indices();
    let target = leaves[rng.gen_range(0..leaves.len())];
    let subtree = random_node(params, rng);
    child.modify(|root| {
        if let Some(node) = root.subtree_mut(target) {
            *node = subtree;
        }
    });
    child
}
