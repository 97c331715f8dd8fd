use aesthetic::config::ConfigManager;
use aesthetic::engines::generation::{lock_fractal, Selection, POPULATION_SIZE};
use aesthetic::engines::rendering::RenderEvent;
use aesthetic::services::{DrawItem, Generator};
use aesthetic::types::Axis;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

const HELP: &str = "\
commands:
  new              breed the next generation from the selection
  select <i>...    replace the selection (slots 0-8)
  toggle <i>       flip one slot in the selection
  back | forward   move through generation history
  show             list the current generation
  draw <i>         request or report the image for a slot
  gl <i>           open a slot in the interactive renderer
  quit";

fn main() -> Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    if let Some(path) = std::env::args().nth(1) {
        manager
            .load_from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?;
    }
    let mut generator = Generator::new(manager.get());

    println!("{}", HELP);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        report_events(&generator);
        print!("gen {}/{}> ", generator.generation(), generator.total_generations());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let slots: Vec<usize> = words.filter_map(|w| w.parse().ok()).collect();

        match command {
            "new" => generator.generate_new_generation(),
            "select" => generator.set_selection(Selection::from_indices(slots)),
            "toggle" => {
                if let Some(slot) = slots.first() {
                    generator.toggle_selection(*slot);
                }
            }
            "back" => {
                if !generator.decrement_generation() {
                    println!("already at the first generation");
                }
            }
            "forward" => {
                if !generator.increment_generation() {
                    println!("already at the latest generation");
                }
            }
            "show" => show(&generator),
            "draw" => {
                for slot in slots {
                    match generator.draw_image(slot) {
                        Ok(DrawItem::Image(image)) => {
                            println!("{}: {} ({} bytes)", slot, image.identity(), image.len())
                        }
                        Ok(DrawItem::Placeholder) => println!("{}: not ready", slot),
                        Err(e) => log::error!("Slot {}: {}", slot, e),
                    }
                }
            }
            "gl" => {
                if let Some(slot) = slots.first() {
                    if let Err(e) = generator.render_fractal_in_gl(*slot) {
                        log::error!("{}", e);
                    }
                }
            }
            "quit" | "exit" => break,
            _ => println!("{}", HELP),
        }
    }

    Ok(())
}

fn show(generator: &Generator) {
    let selection = generator.selection();
    for slot in 0..POPULATION_SIZE {
        let Some(fractal) = generator.fractal(slot) else {
            continue;
        };
        let fractal = lock_fractal(fractal);
        let marker = if selection.contains(slot) { '*' } else { ' ' };
        println!(
            "{}{} {} {:?} [{}]",
            marker,
            slot,
            fractal.id(),
            fractal.state(),
            fractal.lineage().operation
        );
        for (axis, equation) in fractal.genes().iter() {
            if matches!(axis, Axis::X | Axis::Y | Axis::Z) {
                println!("     {} = {}", axis.label(), equation);
            }
        }
    }
}

fn report_events(generator: &Generator) {
    for event in generator.poll_events() {
        match event {
            RenderEvent::Ready { slot, attempts, .. } => {
                println!("slot {} ready after {} render(s)", slot, attempts)
            }
            RenderEvent::Failed { slot, reason, .. } => println!("slot {} failed: {}", slot, reason),
            _ => {}
        }
    }
}
