use karst_core::{CellId, CoreError, ObjectGuid};

/// Alias for `Result<T, WorldError>`.
pub type WorldResult<T> = Result<T, WorldError>;

/// Errors surfaced by the simulation core.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An entity was staged for addition without a resolvable position.
    #[error("cannot add {0}: no resolvable position")]
    MissingPosition(ObjectGuid),

    /// The referenced cell is not currently loaded.
    #[error("cell {0} is not loaded")]
    CellNotLoaded(CellId),

    /// An error from the core data model.
    #[error(transparent)]
    Core(#[from] CoreError),
}
