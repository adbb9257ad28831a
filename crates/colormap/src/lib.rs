//! # Orbita Colormap
//!
//! Colour ramps for the rendered (PNG) exports.
//!
//! Rendering itself happens on the compute platform; this crate only decides
//! the stretch (`min`, `max`) and the palette sent with each image export.
//! [`evaluate`] is the same multi-stop interpolation the platform applies, so
//! a preset can be previewed locally.
//!
//! ## Usage
//!
//! ```
//! use orbita_colormap::Ramp;
//!
//! let ramp = Ramp::for_index("NDVI").unwrap();
//! assert_eq!(ramp.min, 0.0);
//! assert_eq!(ramp.palette_hex()[0], "8B0000");
//! ```

mod preset;
mod scheme;

pub use preset::Ramp;
pub use scheme::{evaluate, ColorScheme, Rgb};
