use crate::entity::ObjectGuid;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when manipulating entity data.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A container operation was attempted on a non-container entity.
    #[error("entity {0} is not a container")]
    NotAContainer(ObjectGuid),

    /// An item with the same guid is already present in the container.
    #[error("container {container} already holds {item}")]
    DuplicateItem {
        /// The container entity.
        container: ObjectGuid,
        /// The duplicated item guid.
        item: ObjectGuid,
    },
}
