use aesthetic::config::AppConfig;
use aesthetic::engines::generation::{lock_fractal, Population, Selection, POPULATION_SIZE};
use aesthetic::engines::rendering::{CancelToken, RenderEvent, RenderRequest, Renderer, Repaint};
use aesthetic::services::{DrawItem, Generator};
use aesthetic::types::{ArtifactState, Operation};
use aesthetic::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct DenseRenderer;

impl Renderer for DenseRenderer {
    fn render(&self, request: &RenderRequest, _cancel: &CancelToken) -> Result<()> {
        std::fs::write(&request.output, vec![9u8; 64 * 1024])?;
        Ok(())
    }
}

#[derive(Default)]
struct CountingRepaint {
    count: AtomicUsize,
}

impl Repaint for CountingRepaint {
    fn request_repaint(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.seed = Some(2024);
    config.render.image_dir = dir.to_path_buf();
    config
}

fn generator(dir: &Path, repaint: Arc<CountingRepaint>) -> Generator {
    Generator::with_renderer(test_config(dir), Arc::new(DenseRenderer), repaint)
}

fn wait_until_rendered(generator: &Generator) {
    let mut finished = 0;
    while finished < POPULATION_SIZE {
        let event = generator
            .scheduler()
            .events()
            .recv_timeout(Duration::from_secs(10))
            .expect("renders did not finish in time");
        if let RenderEvent::Ready { .. } = event {
            finished += 1;
        }
    }
}

fn identities(generator: &Generator) -> Vec<String> {
    (0..POPULATION_SIZE)
        .map(|i| lock_fractal(generator.fractal(i).unwrap()).id().to_string())
        .collect()
}

#[test]
fn test_breeding_from_selection_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let repaint = Arc::new(CountingRepaint::default());
    let mut generator = generator(dir.path(), repaint.clone());

    generator.generate_new_generation();
    wait_until_rendered(&generator);
    assert_eq!(generator.generation(), 1);
    for slot in 0..POPULATION_SIZE {
        assert!(generator.draw_image(slot).unwrap().is_image());
    }
    let first = identities(&generator);

    generator.set_selection(Selection::from_indices([0, 4]));
    generator.generate_new_generation();
    assert_eq!(generator.generation(), 2);
    assert!(generator.selection().is_empty());

    let allowed: HashSet<&String> = [&first[0], &first[4]].into_iter().collect();
    for slot in 0..POPULATION_SIZE {
        let fractal = lock_fractal(generator.fractal(slot).unwrap());
        let lineage = fractal.lineage();
        let (expected, parent_count) = match slot {
            0..=2 => (Operation::Cross, 2),
            3..=5 => (Operation::Mutate, 1),
            _ => (Operation::Introduce, 1),
        };
        assert_eq!(lineage.operation, expected, "slot {}", slot);
        assert_eq!(lineage.parents.len(), parent_count);
        for parent in &lineage.parents {
            assert!(allowed.contains(&parent.identity()), "slot {} has a foreign parent", slot);
        }
    }
    let second = identities(&generator);
    assert_eq!(second.iter().collect::<HashSet<_>>().len(), POPULATION_SIZE);

    wait_until_rendered(&generator);
    assert!(generator.decrement_generation());
    assert_eq!(generator.generation(), 1);
    assert_eq!(identities(&generator), first);
    // Images of the earlier generation are still in memory
    assert!(generator.draw_image(4).unwrap().is_image());

    assert!(!generator.decrement_generation());
    assert!(generator.increment_generation());
    assert_eq!(identities(&generator), second);
    assert!(!generator.increment_generation());

    assert!(repaint.count.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_draw_before_ready_is_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let mut generator = generator(dir.path(), Arc::new(CountingRepaint::default()));
    assert!(matches!(generator.draw_image(0).unwrap(), DrawItem::Placeholder));
    assert!(matches!(generator.draw_image(42).unwrap(), DrawItem::Placeholder));
}

#[test]
fn test_population_survives_serialization() {
    let params = AppConfig::default().genetics;
    let mut rng = StdRng::seed_from_u64(9);
    let mut population = Population::new();
    population.generate_new_generation(&params, &mut rng);
    population.set_selection(Selection::from_indices([1, 7]));
    population.generate_new_generation(&params, &mut rng);

    let json = serde_json::to_string(&population).unwrap();
    let mut restored: Population = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.generation(), 2);
    for slot in 0..POPULATION_SIZE {
        let original = lock_fractal(population.fractal(slot).unwrap());
        let copy = lock_fractal(restored.fractal(slot).unwrap());
        assert_eq!(copy.id(), original.id());
        assert_eq!(copy.genes(), original.genes());
        assert_eq!(copy.lineage().operation, original.lineage().operation);
        assert_eq!(copy.state(), ArtifactState::Pending);
        assert!(copy.image().is_none());
    }

    assert!(restored.decrement_generation());
    assert_eq!(restored.generation(), 1);
}

#[test]
fn test_unwritable_image_dir_fails_slots_not_session() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let mut config = test_config(dir.path());
    config.render.image_dir = blocker.join("images");
    let mut generator = Generator::with_renderer(
        config,
        Arc::new(DenseRenderer),
        Arc::new(CountingRepaint::default()),
    );

    generator.generate_new_generation();
    let mut failed = 0;
    while failed < POPULATION_SIZE {
        let event = generator
            .scheduler()
            .events()
            .recv_timeout(Duration::from_secs(10))
            .expect("renders did not finish in time");
        assert!(!matches!(event, RenderEvent::Ready { .. }));
        if let RenderEvent::Failed { .. } = event {
            failed += 1;
        }
    }

    for slot in 0..POPULATION_SIZE {
        assert_eq!(lock_fractal(generator.fractal(slot).unwrap()).state(), ArtifactState::Failed);
        assert!(matches!(generator.draw_image(slot).unwrap(), DrawItem::Placeholder));
    }
    generator.set_selection(Selection::from_indices([3]));
    generator.generate_new_generation();
    assert_eq!(generator.generation(), 2);
}
