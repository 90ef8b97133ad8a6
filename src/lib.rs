//! K-means clustering served over a plain TCP socket.
//!
//! A client ships a dataset to a long-lived server, which runs a parallel
//! k-means and answers with the centroids and the label of every point.

pub mod client;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod kmeans;
pub mod protocol;
pub mod sampling;
pub mod server;
pub mod utils;

pub use error::{Error, Result};
