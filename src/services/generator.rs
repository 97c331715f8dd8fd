use crate::config::AppConfig;
use crate::data::{Artifact, ArtifactStore};
use crate::engines::generation::{lock_fractal, Population, Selection, SharedFractal};
use crate::engines::rendering::{
    NoRepaint, ProcessRenderer, RenderEvent, RenderScheduler, Renderer, Repaint,
};
use crate::error::Result;
use crate::types::ArtifactState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// What the presentation layer should paint in a grid cell
#[derive(Debug, Clone)]
pub enum DrawItem {
    Image(Artifact),
    Placeholder,
}

impl DrawItem {
    pub fn is_image(&self) -> bool {
        matches!(self, DrawItem::Image(_))
    }
}

/// Boundary between the presentation layer and the breeding/rendering core.
///
/// Owns the population and the render scheduler. Every call that replaces
/// the current generation cancels in-flight renders first.
pub struct Generator {
    config: AppConfig,
    population: Population,
    scheduler: RenderScheduler,
    interactive: ProcessRenderer,
    repaint: Arc<dyn Repaint>,
    rng: StdRng,
}

impl Generator {
    /// Renders through the external process configured in `config.render`
    pub fn new(config: AppConfig) -> Self {
        let renderer = Arc::new(ProcessRenderer::from_config(&config.render));
        Self::with_renderer(config, renderer, Arc::new(NoRepaint))
    }

    pub fn with_renderer(
        config: AppConfig,
        renderer: Arc<dyn Renderer>,
        repaint: Arc<dyn Repaint>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let scheduler = RenderScheduler::new(
            renderer,
            ArtifactStore::from_config(&config.render),
            config.render.clone(),
            config.genetics.clone(),
            config.seed.map(|seed| seed.wrapping_add(1)),
        )
        .with_repaint(Arc::clone(&repaint));

        Self {
            interactive: ProcessRenderer::from_config(&config.render),
            population: Population::new(),
            scheduler,
            repaint,
            config,
            rng,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> u32 {
        self.population.generation()
    }

    pub fn total_generations(&self) -> u32 {
        self.population.total_generations()
    }

    pub fn fractal(&self, index: usize) -> Option<&SharedFractal> {
        self.population.fractal(index)
    }

    pub fn selection(&self) -> Selection {
        self.population.selection()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.population.set_selection(selection);
    }

    pub fn toggle_selection(&mut self, index: usize) {
        self.population.toggle_selection(index);
        self.repaint.request_repaint();
    }

    /// Breeds the next generation and starts rendering it. Slots whose
    /// render cannot run end up `Failed` and draw as placeholders.
    pub fn generate_new_generation(&mut self) {
        self.scheduler.cancel_all();
        self.population
            .generate_new_generation(&self.config.genetics, &mut self.rng);
        self.start_renders();
    }

    /// Shows the previous generation; false when there is none
    pub fn decrement_generation(&mut self) -> bool {
        if !self.population.can_go_back() {
            return false;
        }
        self.scheduler.cancel_all();
        self.population.decrement_generation();
        log::info!("Back to generation {}", self.population.generation());
        self.start_renders();
        true
    }

    /// Shows the next generation after going back; false when there is none
    pub fn increment_generation(&mut self) -> bool {
        if !self.population.can_go_forward() {
            return false;
        }
        self.scheduler.cancel_all();
        self.population.increment_generation();
        log::info!("Forward to generation {}", self.population.generation());
        self.start_renders();
        true
    }

    /// The slot's image once loaded. Otherwise a placeholder, and a render
    /// is requested for a slot nobody is working on yet.
    pub fn draw_image(&mut self, index: usize) -> Result<DrawItem> {
        let Some(fractal) = self.population.fractal(index).cloned() else {
            return Ok(DrawItem::Placeholder);
        };

        let state = {
            let guard = lock_fractal(&fractal);
            if let Some(image) = guard.image() {
                if guard.state() == ArtifactState::Ready {
                    return Ok(DrawItem::Image(image.clone()));
                }
            }
            guard.state()
        };

        if matches!(state, ArtifactState::Pending | ArtifactState::Discarded) {
            self.scheduler.render_slot(index, &fractal)?;
        }
        Ok(DrawItem::Placeholder)
    }

    pub fn is_ready(&self, index: usize) -> bool {
        self.scheduler.is_ready(index)
    }

    /// Opens the fractal in the renderer's interactive viewer
    pub fn render_fractal_in_gl(&self, index: usize) -> Result<()> {
        let Some(fractal) = self.population.fractal(index) else {
            return Ok(());
        };
        let arguments = lock_fractal(fractal).renderer_arguments();
        self.interactive.spawn_interactive(&arguments)?;
        Ok(())
    }

    /// Drains every render event received so far
    pub fn poll_events(&self) -> Vec<RenderEvent> {
        std::iter::from_fn(|| self.scheduler.poll_event()).collect()
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    fn start_renders(&mut self) {
        let started = self.scheduler.render_all(self.population.current());
        log::debug!("Started {} render job(s)", started);
        self.repaint.request_repaint();
    }
}
