pub mod artifacts;

pub use artifacts::{Artifact, ArtifactStore};
