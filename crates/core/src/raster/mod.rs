//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub(crate) use geotransform::EARTH_RADIUS_M;
pub use grid::Raster;
