use crate::config::GeneticsConfig;
use crate::data::{Artifact, ArtifactStore};
use crate::engines::generation::equation::Equation;
use crate::engines::generation::random::{clifford_x, clifford_y, linear_z};
use crate::error::Result;
use crate::types::{ArtifactState, Axis, Operation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fractals are shared between the population and their render job
pub type SharedFractal = Arc<Mutex<Fractal>>;

/// Locks a shared fractal, recovering the data if a job panicked while
/// holding it
pub fn lock_fractal(fractal: &SharedFractal) -> MutexGuard<'_, Fractal> {
    match fractal.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One equation per generative axis, kept in renderer argument order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Genes(BTreeMap<Axis, Equation>);

impl Genes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: Axis, equation: Equation) -> Self {
        self.0.insert(axis, equation);
        self
    }

    /// Clifford attractor in x and y plus a linear depth channel
    pub fn random<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> Self {
        Self::new()
            .with(Axis::X, clifford_x(params, rng))
            .with(Axis::Y, clifford_y(params, rng))
            .with(Axis::Z, linear_z(params, rng))
    }

    pub fn get(&self, axis: Axis) -> Option<&Equation> {
        self.0.get(&axis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Axis, &Equation)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable key for the equation set: `fractal_` plus 16 hex digits of a
    /// blake3 digest over the axis-tagged infix strings
    pub fn identity(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (axis, equation) in &self.0 {
            hasher.update(axis.label().as_bytes());
            hasher.update(b"=");
            hasher.update(equation.infix().as_bytes());
            hasher.update(b"\n");
        }
        let hex = hasher.finalize().to_hex();
        format!("fractal_{}", &hex.as_str()[..16])
    }

    /// One infix argument per axis, defaults filling the gaps
    pub fn renderer_arguments(&self) -> Vec<String> {
        Axis::ALL
            .iter()
            .map(|axis| match self.0.get(axis) {
                Some(equation) => equation.infix().to_string(),
                None => axis.default_argument().to_string(),
            })
            .collect()
    }

    /// Axis-wise crossover, keeping the first child of each pair. Axes the
    /// other parent lacks are copied unchanged.
    pub fn cross<R: Rng>(&self, other: &Genes, rng: &mut R) -> Genes {
        let mut child = BTreeMap::new();
        for (axis, equation) in &self.0 {
            let crossed = match other.0.get(axis) {
                Some(other_equation) => equation.cross(other_equation, rng).0,
                None => equation.clone(),
            };
            child.insert(*axis, crossed);
        }
        Genes(child)
    }

    pub fn mutate<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Genes {
        let mut child = self.clone();
        child.mutate_in_place(params, rng);
        child
    }

    pub fn mutate_in_place<R: Rng>(&mut self, params: &GeneticsConfig, rng: &mut R) {
        for equation in self.0.values_mut() {
            equation.mutate_in_place(params, rng);
        }
    }

    pub fn introduce<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Genes {
        Genes(
            self.0
                .iter()
                .map(|(axis, equation)| (*axis, equation.introduce(params, rng)))
                .collect(),
        )
    }
}

/// How a fractal was bred. Parents are immutable snapshots of the parents'
/// genes at breeding time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub operation: Operation,
    pub parents: Vec<Arc<Genes>>,
}

impl Lineage {
    pub fn random() -> Self {
        Self {
            operation: Operation::Random,
            parents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fractal {
    id: String,
    genes: Genes,
    lineage: Lineage,
    #[serde(skip)]
    state: ArtifactState,
    #[serde(skip)]
    image: Option<Artifact>,
}

impl Fractal {
    pub fn new(genes: Genes, lineage: Lineage) -> Self {
        Self {
            id: genes.identity(),
            genes,
            lineage,
            state: ArtifactState::Pending,
            image: None,
        }
    }

    pub fn random<R: Rng>(params: &GeneticsConfig, rng: &mut R) -> Self {
        Self::new(Genes::random(params, rng), Lineage::random())
    }

    pub fn into_shared(self) -> SharedFractal {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn genes(&self) -> &Genes {
        &self.genes
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn image(&self) -> Option<&Artifact> {
        self.image.as_ref()
    }

    pub fn snapshot(&self) -> Arc<Genes> {
        Arc::new(self.genes.clone())
    }

    pub fn renderer_arguments(&self) -> Vec<String> {
        self.genes.renderer_arguments()
    }

    pub fn cross<R: Rng>(&self, other: &Fractal, rng: &mut R) -> Fractal {
        Fractal::new(
            self.genes.cross(&other.genes, rng),
            Lineage {
                operation: Operation::Cross,
                parents: vec![self.snapshot(), other.snapshot()],
            },
        )
    }

    pub fn mutate<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Fractal {
        Fractal::new(
            self.genes.mutate(params, rng),
            Lineage {
                operation: Operation::Mutate,
                parents: vec![self.snapshot()],
            },
        )
    }

    pub fn introduce<R: Rng>(&self, params: &GeneticsConfig, rng: &mut R) -> Fractal {
        Fractal::new(
            self.genes.introduce(params, rng),
            Lineage {
                operation: Operation::Introduce,
                parents: vec![self.snapshot()],
            },
        )
    }

    /// Perturbs this fractal's constants without changing its lineage
    pub fn in_place_mutate<R: Rng>(&mut self, params: &GeneticsConfig, rng: &mut R) {
        self.genes.mutate_in_place(params, rng);
        self.id = self.genes.identity();
    }

    /// Rebuilds the genes from the recorded lineage, keeping the lineage
    pub fn redo<R: Rng>(&mut self, params: &GeneticsConfig, rng: &mut R) {
        let parents = &self.lineage.parents;
        let genes = match (self.lineage.operation, parents.first(), parents.get(1)) {
            (Operation::Cross, Some(first), Some(second)) => first.cross(second, rng),
            (Operation::Mutate, Some(parent), _) => parent.mutate(params, rng),
            (Operation::Mutate, None, _) => self.genes.mutate(params, rng),
            (Operation::Introduce, Some(parent), _) => parent.introduce(params, rng),
            _ => Genes::random(params, rng),
        };
        log::debug!("Regenerating {} from {} lineage", self.id, self.lineage.operation);
        self.genes = genes;
        self.id = self.genes.identity();
    }

    /// True when the rendered artifact is below the sparse threshold
    pub fn is_sparse_image(&self, store: &ArtifactStore, threshold_bytes: u64) -> Result<bool> {
        Ok(store.size_bytes(&self.id)? < threshold_bytes)
    }

    pub(crate) fn set_state(&mut self, state: ArtifactState) {
        self.state = state;
    }

    /// Loads the rendered file into memory; the file is removed
    pub(crate) fn load_image(&mut self, store: &ArtifactStore) -> Result<()> {
        let artifact = store.load(&self.id)?;
        self.image = Some(artifact);
        self.state = ArtifactState::Ready;
        Ok(())
    }

    /// Drops the image and deletes any artifact file for this identity
    pub fn discard(&mut self, store: &ArtifactStore) {
        store.discard(&self.id);
        self.image = None;
        self.state = ArtifactState::Discarded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed() -> Fractal {
        let genes = Genes::new()
            .with(Axis::X, Equation::parse("sin(-1.4 * y) + cos(-1.4 * x)").unwrap())
            .with(Axis::Y, Equation::parse("sin(1.6 * x) + 0.7 * cos(1.6 * y)").unwrap());
        Fractal::new(genes, Lineage::random())
    }

    #[test]
    fn test_identity_is_stable_and_distinct() {
        let a = fixed();
        let b = fixed();
        assert_eq!(a.id(), b.id());
        assert!(a.id().starts_with("fractal_"));
        assert_eq!(a.id().len(), "fractal_".len() + 16);

        let params = GeneticsConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        let other = Fractal::random(&params, &mut rng);
        assert_ne!(a.id(), other.id());
    }

    #[test]
    fn test_renderer_arguments_fill_defaults() {
        let args = fixed().renderer_arguments();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "sin(-1.4 * y) + cos(-1.4 * x)");
        assert_eq!(&args[2..], &["0", "1", "1", "1"]);
    }

    #[test]
    fn test_children_record_lineage() {
        let params = GeneticsConfig::default();
        let mut rng = StdRng::seed_from_u64(8);
        let a = Fractal::random(&params, &mut rng);
        let b = Fractal::random(&params, &mut rng);

        let crossed = a.cross(&b, &mut rng);
        assert_eq!(crossed.lineage().operation, Operation::Cross);
        assert_eq!(crossed.lineage().parents.len(), 2);
        assert_eq!(crossed.lineage().parents[0].identity(), a.id());
        assert_eq!(crossed.lineage().parents[1].identity(), b.id());

        let introduced = a.introduce(&params, &mut rng);
        assert_eq!(introduced.lineage().operation, Operation::Introduce);
        assert_eq!(introduced.lineage().parents[0].identity(), a.id());
    }

    #[test]
    fn test_redo_keeps_lineage() {
        let params = GeneticsConfig::default();
        let mut rng = StdRng::seed_from_u64(12);
        let parent = Fractal::random(&params, &mut rng);
        let mut child = parent.introduce(&params, &mut rng);

        child.redo(&params, &mut rng);
        assert_eq!(child.lineage().operation, Operation::Introduce);
        assert_eq!(child.id(), child.genes().identity());
        // Introduction only ever grows the parent's trees
        for (axis, equation) in child.genes().iter() {
            let before = parent.genes().get(*axis).unwrap();
            assert!(equation.node_count() >= before.node_count());
        }
    }

    #[test]
    fn test_random_redo_regenerates() {
        let params = GeneticsConfig::default();
        let mut rng = StdRng::seed_from_u64(13);
        let mut fractal = Fractal::random(&params, &mut rng);
        let before = fractal.id().to_string();
        fractal.redo(&params, &mut rng);
        assert_ne!(fractal.id(), before);
        assert_eq!(fractal.lineage().operation, Operation::Random);
    }
}
