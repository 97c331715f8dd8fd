pub mod cancel;
pub mod readiness;
pub mod renderer;
pub mod scheduler;

pub use cancel::CancelToken;
pub use readiness::ReadinessTable;
pub use renderer::{ProcessRenderer, RenderRequest, Renderer};
pub use scheduler::{NoRepaint, RenderEvent, RenderScheduler, Repaint};
