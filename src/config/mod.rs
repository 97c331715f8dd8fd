pub mod traits;
pub mod genetics;
pub mod render;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use genetics::GeneticsConfig;
pub use render::RenderConfig;
pub use traits::ConfigSection;
