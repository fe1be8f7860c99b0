use thiserror::Error;
use tvfeed_imdb::ImdbError;
use tvfeed_store::StoreError;

#[derive(Debug, Error)]
pub enum FilterError {
    /// Dedup store failure, including failure to open or lock it.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("ratings lookup failed: {0}")]
    Ratings(#[from] ImdbError),

    /// The programme source could not be read.
    #[error("failed to read programme input: {0}")]
    Input(#[from] std::io::Error),
}
