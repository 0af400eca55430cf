use crate::{
    config::ConfigError, pipeline::PipelineError, rest::RestError, storage::StorageError,
    supervisor::SupervisorError, transport::TransportError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("config error")]
    Config(#[from] ConfigError),
    #[error("rest error")]
    Rest(#[from] RestError),
    #[error("transport error")]
    Transport(#[from] TransportError),
    #[error("storage error")]
    Storage(#[from] StorageError),
    #[error("pipeline error")]
    Pipeline(#[from] PipelineError),
    #[error("supervisor error")]
    Supervisor(#[from] SupervisorError),
}
