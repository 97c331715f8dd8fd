use thiserror::Error;

#[derive(Error, Debug)]
pub enum AestheticError {
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Renderer error: {0}")]
    RendererIo(String),

    #[error("Renderer timed out after {0}s")]
    RenderTimeout(u64),

    #[error("Render cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl AestheticError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AestheticError>;
