use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read config file: {0}")]
    ConfigRead(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] toml::de::Error),
    #[error("no endpoints configured")]
    NoEndpoints,
    #[error("unknown endpoint id: {0}")]
    UnknownEndpoint(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
