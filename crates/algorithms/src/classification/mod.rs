//! Unsupervised classification
//!
//! - **K-means**: sampled multi-band clustering used for management zones

mod kmeans;

pub use kmeans::{fit_kmeans, kmeans_bands, KmeansModel, KmeansParams, KmeansResult, UNLABELLED};
