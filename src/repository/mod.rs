pub mod consent_log;
pub mod subscribers;

#[cfg(test)]
pub mod in_memory;

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("Failed to execute a database query.")]
    Database(#[from] sqlx::Error),
}
