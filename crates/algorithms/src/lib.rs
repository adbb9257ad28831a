//! # Orbita Algorithms
//!
//! In-process analysis algorithms for Orbita.
//!
//! ## Categories
//!
//! - **imagery**: canonical bands, spectral indices, median compositing
//! - **statistics**: region stats, stress area, zonal statistics
//! - **classification**: sampled multi-band k-means
//! - **temporal**: z-scores, phenological curves and status

pub mod classification;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod temporal;
