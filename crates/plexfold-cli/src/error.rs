use plexfold::core::io::chain_list::ChainListError;
use plexfold::core::io::restraint_files::RestraintFileError;
use plexfold::core::io::transform_files::TransformFileError;
use plexfold::engine::error::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to load the chain list: {0}")]
    ChainList(#[from] ChainListError),

    #[error("failed to load transform files: {0}")]
    Transforms(#[from] TransformFileError),

    #[error("failed to load restraints: {0}")]
    Restraints(#[from] RestraintFileError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code: 2 for input parse errors, 3 when no assembly
    /// was found, 4 for unsatisfiable restraints, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ChainList(_)
            | CliError::Transforms(_)
            | CliError::Restraints(_)
            | CliError::Config(_) => 2,
            CliError::Engine(engine) => match engine {
                EngineError::Geometry(_) | EngineError::UnresolvedSite(_) => 2,
                EngineError::NoAssembly => 3,
                EngineError::Unsatisfiable(_) => 4,
                EngineError::Internal(_) => 1,
            },
            CliError::Io(_) | CliError::Other(_) => 1,
        }
    }
}
