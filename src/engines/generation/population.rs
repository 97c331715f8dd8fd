use crate::config::GeneticsConfig;
use crate::engines::generation::fractal::{lock_fractal, Fractal, Lineage, SharedFractal};
use crate::types::Operation;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Fractals per generation, laid out as a 3x3 grid
pub const POPULATION_SIZE: usize = 9;
/// Width of one breeding row in the grid
pub const ROW_SIZE: usize = 3;

/// The user's picks from the current generation, one bit per slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection(u16);

impl Selection {
    pub fn none() -> Self {
        Self(0)
    }

    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut selection = Self::none();
        for index in indices {
            selection.set(index, true);
        }
        selection
    }

    /// Builds a selection from one flag per slot; extra flags are ignored
    pub fn from_flags(flags: &[bool]) -> Self {
        Self::from_indices(
            flags
                .iter()
                .enumerate()
                .filter(|(_, selected)| **selected)
                .map(|(index, _)| index),
        )
    }

    pub fn set(&mut self, index: usize, selected: bool) {
        if index >= POPULATION_SIZE {
            return;
        }
        if selected {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn toggle(&mut self, index: usize) {
        let current = self.contains(index);
        self.set(index, !current);
    }

    pub fn contains(&self, index: usize) -> bool {
        index < POPULATION_SIZE && self.0 & (1 << index) != 0
    }

    pub fn indices(&self) -> Vec<usize> {
        (0..POPULATION_SIZE).filter(|i| self.contains(*i)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// One full population snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub number: u32,
    pub fractals: Vec<SharedFractal>,
}

/// Current generation plus undo/redo history of earlier ones.
///
/// Render cancellation is the caller's job: the `Generator` facade stops the
/// scheduler before calling any method that replaces `current`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Population {
    generation: u32,
    current: Vec<SharedFractal>,
    selected: Selection,
    past: Vec<Generation>,
    future: Vec<Generation>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Current generation number plus generations reachable by going forward
    pub fn total_generations(&self) -> u32 {
        self.generation + self.future.len() as u32
    }

    pub fn current(&self) -> &[SharedFractal] {
        &self.current
    }

    pub fn fractal(&self, index: usize) -> Option<&SharedFractal> {
        self.current.get(index)
    }

    pub fn selection(&self) -> Selection {
        self.selected
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selected = selection;
    }

    pub fn toggle_selection(&mut self, index: usize) {
        self.selected.toggle(index);
    }

    pub fn can_go_back(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.future.is_empty()
    }

    /// Breeds the next generation from the selected fractals.
    ///
    /// Row 1 crosses two selected parents (possibly the same one twice), row 2
    /// mutates one, row 3 introduces a new subtree into one. With nothing
    /// selected all nine are random.
    pub fn generate_new_generation<R: Rng>(&mut self, params: &GeneticsConfig, rng: &mut R) {
        let parents: Vec<Fractal> = self
            .selected
            .indices()
            .into_iter()
            .filter_map(|i| self.current.get(i))
            .map(|f| lock_fractal(f).clone())
            .collect();

        if !self.current.is_empty() {
            let previous = std::mem::take(&mut self.current);
            self.past.push(Generation {
                number: self.generation,
                fractals: previous,
            });
        }
        self.future.clear();
        self.generation += 1;

        let mut children: Vec<Fractal> = Vec::with_capacity(POPULATION_SIZE);
        for slot in 0..POPULATION_SIZE {
            let child = if parents.is_empty() {
                Fractal::random(params, rng)
            } else {
                let first = &parents[rng.gen_range(0..parents.len())];
                match slot / ROW_SIZE {
                    0 => {
                        let second = &parents[rng.gen_range(0..parents.len())];
                        first.cross(second, rng)
                    }
                    1 => first.mutate(params, rng),
                    _ => first.introduce(params, rng),
                }
            };
            children.push(child);
        }

        ensure_unique_identities(&mut children, params, rng);

        log::info!(
            "Generation {} bred from {} selected parent(s)",
            self.generation,
            parents.len()
        );

        self.current = children.into_iter().map(Fractal::into_shared).collect();
        self.selected.clear();
    }

    /// Steps back one generation; false when already at the first
    pub fn decrement_generation(&mut self) -> bool {
        let Some(previous) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.current, previous.fractals);
        self.future.push(Generation {
            number: self.generation,
            fractals: current,
        });
        self.generation = previous.number;
        self.selected.clear();
        true
    }

    /// Steps forward one generation; false when already at the latest
    pub fn increment_generation(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.current, next.fractals);
        self.past.push(Generation {
            number: self.generation,
            fractals: current,
        });
        self.generation = next.number;
        self.selected.clear();
        true
    }
}

/// Children sharing an identity would share an artifact path. Later
/// duplicates are regenerated from their lineage, then introduced from their
/// first parent so the slot keeps a selected ancestor. Only a child with no
/// parent, or one that still collides after that, becomes a random fractal.
fn ensure_unique_identities<R: Rng>(children: &mut [Fractal], params: &GeneticsConfig, rng: &mut R) {
    let mut seen: HashSet<String> = HashSet::new();
    for child in children.iter_mut() {
        let mut attempts = 0;
        while seen.contains(child.id()) && attempts < params.identity_attempts {
            child.redo(params, rng);
            attempts += 1;
        }

        if let Some(parent) = child.lineage().parents.first().cloned() {
            let mut attempts = 0;
            while seen.contains(child.id()) && attempts < params.identity_attempts {
                log::debug!("Introducing into parent of duplicate {}", child.id());
                *child = Fractal::new(
                    parent.introduce(params, rng),
                    Lineage {
                        operation: Operation::Introduce,
                        parents: vec![Arc::clone(&parent)],
                    },
                );
                attempts += 1;
            }
        }

        while seen.contains(child.id()) {
            log::warn!("Replacing duplicate {} with a random fractal", child.id());
            *child = Fractal::random(params, rng);
        }
        seen.insert(child.id().to_string());
    }
}
