//! IMDb dataset ingestion and the ratings index built from it.
//!
//! The index maps `title|type|year` keys to a rating or a tombstone. It is
//! rebuilt wholesale by [`update_ratings_index`] and read through
//! [`RatingsIndex`].

pub mod builder;
pub mod client;
pub mod dataset;
pub mod error;
pub mod key;
pub mod merge;
pub mod reader;

pub use builder::{build_from_files, build_index, update_ratings_index, BuildSummary};
pub use client::DatasetClient;
pub use dataset::Dataset;
pub use error::ImdbError;
pub use key::IndexKey;
pub use reader::{IndexStats, RatingsIndex};
