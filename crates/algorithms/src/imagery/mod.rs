//! Imagery analysis algorithms
//!
//! - Canonical band schema for harmonized scenes
//! - Spectral indices: NDVI, NDWI, EVI, NDCI, SAVI, OSAVI
//! - Temporal median compositing and ROI clipping

mod bands;
mod composite;
mod indices;

pub use bands::{BandSet, CanonicalBand};
pub use composite::{
    apply_mask, clip_indices, median, median_composite, median_stack, Composite, CompositeParams,
};
pub use indices::{
    compute_indices, evi, evi_value, ndci, ndci_value, ndvi, ndvi_value, ndwi, ndwi_value,
    normalized_difference, normalized_difference_value, osavi, osavi_value, savi, savi_value,
    EviParams, IndexSet, SaviParams, SpectralIndex,
};
