//! # Orbita Core
//!
//! Core types shared by every Orbita crate.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid used for bands, indices and zones
//! - `GeoTransform`: affine pixel/geographic transform
//! - `CRS`: coordinate reference system identifier
//! - `geometry`: region-of-interest resolution, buffering, area and masks

pub mod crs;
pub mod error;
pub mod geometry;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use geometry::{resolve_roi, AnalysisGrid, Bounds, Roi};
pub use raster::{GeoTransform, Raster, RasterElement};
