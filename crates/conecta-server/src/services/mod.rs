pub mod channel;
pub mod message;
pub mod reminder;
pub mod seed;
pub mod social;
pub mod task;
pub mod team;
pub mod user;

use crate::error::{AppError, Result};
use crate::store::{DocumentStore, Entity, fetch_one};

/// Load an entity by id or fail with an explicit not-found error.
pub(crate) async fn require<T: Entity>(store: &dyn DocumentStore, id: &str) -> Result<T> {
    fetch_one::<T>(store, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} {} not found", T::COLLECTION, id)))
}
