//! Scene acquisition: catalog search per sensor, QA masking, rescaling to
//! surface reflectance and renaming onto the canonical band schema.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveDate, Utc};
use orbita_algorithms::imagery::{BandSet, CanonicalBand};
use orbita_cloud::{CloudError, ComputePlatform, RawScene, SceneQuery};
use orbita_core::{AnalysisGrid, Raster};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Optical sensors the engine harmonizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Sentinel2,
    Landsat8,
    Landsat9,
}

/// Per-pixel validity rule applied to a sensor's QA band(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaRule {
    /// `QA60` opaque-cloud and cirrus bits clear; `SCL` (when delivered) not
    /// shadow, cloud or thin cirrus
    Sentinel2,
    /// `QA_PIXEL` cloud and cloud-shadow bits clear
    LandsatPixel,
}

const S2_QA60_CLOUD_BITS: u32 = (1 << 10) | (1 << 11);
const S2_SCL_REJECT: [u32; 4] = [3, 8, 9, 10];
const LANDSAT_QA_CLOUD_BITS: u32 = (1 << 3) | (1 << 4);

/// Static description of one sensor's collection.
#[derive(Debug, Clone, Copy)]
pub struct SensorProfile {
    pub sensor: Sensor,
    pub collection: &'static str,
    /// Metadata property with the scene cloud percentage
    pub cloud_property: &'static str,
    pub qa: QaRule,
    /// reflectance = DN * scale + offset
    pub scale: f64,
    pub offset: f64,
    /// Native band name for each canonical band
    pub bands: &'static [(&'static str, CanonicalBand)],
}

const SENTINEL2: SensorProfile = SensorProfile {
    sensor: Sensor::Sentinel2,
    collection: "COPERNICUS/S2_SR_HARMONIZED",
    cloud_property: "CLOUDY_PIXEL_PERCENTAGE",
    qa: QaRule::Sentinel2,
    scale: 1.0 / 10_000.0,
    offset: 0.0,
    bands: &[
        ("B2", CanonicalBand::Blue),
        ("B4", CanonicalBand::Red),
        ("B5", CanonicalBand::RedEdge),
        ("B8", CanonicalBand::Nir),
        ("B11", CanonicalBand::Swir1),
    ],
};

const LANDSAT_BANDS: &[(&str, CanonicalBand)] = &[
    ("SR_B2", CanonicalBand::Blue),
    ("SR_B4", CanonicalBand::Red),
    ("SR_B5", CanonicalBand::Nir),
    ("SR_B6", CanonicalBand::Swir1),
];

const LANDSAT8: SensorProfile = SensorProfile {
    sensor: Sensor::Landsat8,
    collection: "LANDSAT/LC08/C02/T1_L2",
    cloud_property: "CLOUD_COVER",
    qa: QaRule::LandsatPixel,
    scale: 0.0000275,
    offset: -0.2,
    bands: LANDSAT_BANDS,
};

const LANDSAT9: SensorProfile = SensorProfile {
    sensor: Sensor::Landsat9,
    collection: "LANDSAT/LC09/C02/T1_L2",
    ..LANDSAT8
};

impl Sensor {
    pub const ALL: [Sensor; 3] = [Sensor::Sentinel2, Sensor::Landsat8, Sensor::Landsat9];

    pub fn profile(self) -> &'static SensorProfile {
        match self {
            Sensor::Sentinel2 => &SENTINEL2,
            Sensor::Landsat8 => &LANDSAT8,
            Sensor::Landsat9 => &LANDSAT9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sensor::Sentinel2 => "sentinel2",
            Sensor::Landsat8 => "landsat8",
            Sensor::Landsat9 => "landsat9",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "sentinel2" | "s2" => Ok(Sensor::Sentinel2),
            "landsat8" | "l8" => Ok(Sensor::Landsat8),
            "landsat9" | "l9" => Ok(Sensor::Landsat9),
            other => Err(format!("unknown sensor '{other}'")),
        }
    }
}

impl SensorProfile {
    fn qa_bands(&self) -> &'static [&'static str] {
        match self.qa {
            QaRule::Sentinel2 => &["QA60", "SCL"],
            QaRule::LandsatPixel => &["QA_PIXEL"],
        }
    }

    /// Native bands requested from the catalog (reflectance then QA)
    pub fn requested_bands(&self) -> Vec<&'static str> {
        self.bands
            .iter()
            .map(|(name, _)| *name)
            .chain(self.qa_bands().iter().copied())
            .collect()
    }

    pub fn query(&self, grid: AnalysisGrid, start: NaiveDate, end: NaiveDate, max_cloud_pct: f64) -> SceneQuery {
        SceneQuery::new(self.collection, grid, start, end)
            .cloud_filter(self.cloud_property, max_cloud_pct)
            .bands(&self.requested_bands())
    }
}

// ---------------------------------------------------------------------------
// Harmonized scenes
// ---------------------------------------------------------------------------

/// One masked scene in reflectance on the canonical band schema.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub sensor: Sensor,
    pub acquired: DateTime<Utc>,
    pub bands: BandSet,
}

impl Scene {
    pub fn date(&self) -> NaiveDate {
        self.acquired.date_naive()
    }
}

/// Validity mask from the QA band(s): `true` where the pixel is usable.
pub fn qa_mask(raw: &RawScene, rule: QaRule, grid: &AnalysisGrid) -> Result<Raster<u8>> {
    let clear = |v: f64, bits: u32| v.is_finite() && v >= 0.0 && (v as u32) & bits == 0;

    let mask = match rule {
        QaRule::Sentinel2 => {
            let qa60 = band_on_grid(raw, "QA60", grid)?;
            let mut mask = qa60.map(|v| u8::from(clear(v, S2_QA60_CLOUD_BITS)));
            if raw.bands.contains_key("SCL") {
                let scl = band_on_grid(raw, "SCL", grid)?;
                for (m, s) in mask.data_mut().iter_mut().zip(scl.data().iter()) {
                    if !s.is_finite() || S2_SCL_REJECT.contains(&(*s as u32)) {
                        *m = 0;
                    }
                }
            }
            mask
        }
        QaRule::LandsatPixel => {
            band_on_grid(raw, "QA_PIXEL", grid)?.map(|v| u8::from(clear(v, LANDSAT_QA_CLOUD_BITS)))
        }
    };
    Ok(mask)
}

fn band_on_grid(raw: &RawScene, name: &str, grid: &AnalysisGrid) -> Result<Raster<f64>> {
    let raster = raw.band(name)?.to_raster()?;
    if raster.shape() != grid.shape() {
        return Err(CloudError::Protocol(format!(
            "scene {} band {} is {:?}, request grid is {:?}",
            raw.id,
            name,
            raster.shape(),
            grid.shape()
        ))
        .into());
    }
    Ok(raster.with_geo(grid.transform, Some(grid.crs())))
}

/// Mask, rescale and rename one raw scene.
///
/// Missing bands or a mismatched grid are a platform contract violation.
pub fn harmonize(raw: &RawScene, profile: &SensorProfile, grid: &AnalysisGrid) -> Result<Scene> {
    let mask = qa_mask(raw, profile.qa, grid)?;

    let mut blue = None;
    let mut red = None;
    let mut red_edge = None;
    let mut nir = None;
    let mut swir1 = None;

    for (native, canonical) in profile.bands {
        let mut band = band_on_grid(raw, native, grid)?;
        for (v, m) in band.data_mut().iter_mut().zip(mask.data().iter()) {
            *v = if *m == 0 || !v.is_finite() {
                f64::NAN
            } else {
                *v * profile.scale + profile.offset
            };
        }
        let slot = match canonical {
            CanonicalBand::Blue => &mut blue,
            CanonicalBand::Red => &mut red,
            CanonicalBand::RedEdge => &mut red_edge,
            CanonicalBand::Nir => &mut nir,
            CanonicalBand::Swir1 => &mut swir1,
        };
        *slot = Some(band);
    }

    let missing = |band: CanonicalBand| {
        EngineError::RemotePlatform(CloudError::Protocol(format!(
            "sensor {} does not map a {} band",
            profile.sensor,
            band.name()
        )))
    };
    let bands = BandSet {
        blue: blue.ok_or_else(|| missing(CanonicalBand::Blue))?,
        red: red.ok_or_else(|| missing(CanonicalBand::Red))?,
        red_edge,
        nir: nir.ok_or_else(|| missing(CanonicalBand::Nir))?,
        swir1: swir1.ok_or_else(|| missing(CanonicalBand::Swir1))?,
    };
    bands.validate()?;

    Ok(Scene {
        id: raw.id.clone(),
        sensor: profile.sensor,
        acquired: raw.acquired,
        bands,
    })
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Harmonized scenes covering the analysis window and its history.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// All scenes, oldest first
    pub scenes: Vec<Scene>,
    pub history_start: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Acquisition {
    /// Scenes inside `[start, end]`
    pub fn window(&self) -> impl Iterator<Item = &Scene> {
        self.scenes
            .iter()
            .filter(move |s| (self.start..=self.end).contains(&s.date()))
    }

    pub fn window_count(&self) -> usize {
        self.window().count()
    }

    /// Latest scene inside the window
    pub fn latest(&self) -> Option<&Scene> {
        self.window().last()
    }
}

/// Date `years` before `date`; Feb 29 maps to Feb 28.
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(12 * years))
        .unwrap_or(NaiveDate::MIN)
}

/// Fetch every configured sensor over `[start - history_years, end]`.
pub async fn acquire(
    platform: &dyn ComputePlatform,
    sensors: &[Sensor],
    grid: &AnalysisGrid,
    start: NaiveDate,
    end: NaiveDate,
    history_years: u32,
    max_cloud_pct: f64,
) -> Result<Acquisition> {
    let history_start = years_before(start, history_years);
    let mut scenes = Vec::new();

    for sensor in sensors {
        let profile = sensor.profile();
        let query = profile.query(*grid, history_start, end, max_cloud_pct);
        let raw = platform.search_scenes(&query).await?;
        info!(
            sensor = %sensor,
            collection = profile.collection,
            found = raw.len(),
            "catalog search"
        );
        for scene in &raw {
            debug!(scene = %scene.id, acquired = %scene.acquired, "harmonizing scene");
            scenes.push(harmonize(scene, profile, grid)?);
        }
    }

    scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));

    Ok(Acquisition {
        scenes,
        history_start,
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use orbita_cloud::memory::uniform_scene;
    use orbita_cloud::InMemoryPlatform;
    use orbita_core::GeoTransform;

    fn grid() -> AnalysisGrid {
        AnalysisGrid {
            transform: GeoTransform::new(-4.0, 37.01, 0.001, -0.001),
            rows: 3,
            cols: 3,
        }
    }

    fn s2_bands(qa60: f64) -> Vec<(&'static str, f64)> {
        vec![
            ("B2", 500.0),
            ("B4", 1000.0),
            ("B5", 1500.0),
            ("B8", 3000.0),
            ("B11", 2000.0),
            ("QA60", qa60),
            ("SCL", 4.0),
        ]
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sensor_names_parse() {
        assert_eq!("S2".parse::<Sensor>().unwrap(), Sensor::Sentinel2);
        assert_eq!("landsat-9".parse::<Sensor>().unwrap(), Sensor::Landsat9);
        assert!("modis".parse::<Sensor>().is_err());
        assert_eq!(Sensor::Landsat9.profile().scale, Sensor::Landsat8.profile().scale);
    }

    #[test]
    fn sentinel2_rescales_and_keeps_red_edge() {
        let g = grid();
        let raw = uniform_scene(
            "s2a",
            SENTINEL2.collection,
            Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap(),
            Some(3.0),
            &g,
            &s2_bands(0.0),
        );
        let scene = harmonize(&raw, &SENTINEL2, &g).unwrap();
        assert_relative_eq!(scene.bands.nir.get(1, 1).unwrap(), 0.3);
        assert_relative_eq!(scene.bands.red.get(0, 0).unwrap(), 0.1);
        assert!(scene.bands.has_red_edge());
    }

    #[test]
    fn cloudy_qa_masks_every_band() {
        let g = grid();
        let raw = uniform_scene(
            "s2b",
            SENTINEL2.collection,
            Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap(),
            Some(3.0),
            &g,
            &s2_bands(1024.0),
        );
        let scene = harmonize(&raw, &SENTINEL2, &g).unwrap();
        assert!(scene.bands.red.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn landsat_scale_and_shadow_bit() {
        let g = grid();
        let raw = uniform_scene(
            "l8",
            LANDSAT8.collection,
            Utc.with_ymd_and_hms(2024, 6, 2, 11, 0, 0).unwrap(),
            Some(1.0),
            &g,
            &[("SR_B2", 10000.0), ("SR_B4", 12000.0), ("SR_B5", 20000.0), ("SR_B6", 15000.0), ("QA_PIXEL", 21824.0)],
        );
        let scene = harmonize(&raw, &LANDSAT8, &g).unwrap();
        assert_relative_eq!(scene.bands.nir.get(0, 0).unwrap(), 20000.0 * 0.0000275 - 0.2, epsilon = 1e-12);
        assert!(!scene.bands.has_red_edge());

        // bit 4 set: cloud shadow
        let shadow = uniform_scene(
            "l8s",
            LANDSAT8.collection,
            Utc.with_ymd_and_hms(2024, 6, 2, 11, 0, 0).unwrap(),
            Some(1.0),
            &g,
            &[("SR_B2", 10000.0), ("SR_B4", 12000.0), ("SR_B5", 20000.0), ("SR_B6", 15000.0), ("QA_PIXEL", 16.0)],
        );
        let scene = harmonize(&shadow, &LANDSAT8, &g).unwrap();
        assert!(scene.bands.nir.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn missing_band_is_a_platform_error() {
        let g = grid();
        let raw = uniform_scene(
            "bad",
            LANDSAT8.collection,
            Utc.with_ymd_and_hms(2024, 6, 2, 11, 0, 0).unwrap(),
            None,
            &g,
            &[("SR_B2", 1.0), ("QA_PIXEL", 0.0)],
        );
        assert!(matches!(
            harmonize(&raw, &LANDSAT8, &g),
            Err(EngineError::RemotePlatform(_))
        ));
    }

    #[test]
    fn history_start_handles_leap_day() {
        assert_eq!(years_before(date(2024, 2, 29), 1), date(2023, 2, 28));
        assert_eq!(years_before(date(2024, 6, 1), 3), date(2021, 6, 1));
    }

    #[tokio::test]
    async fn merges_sensors_in_time_order() {
        let g = grid();
        let platform = InMemoryPlatform::new();
        platform.add_scenes([
            uniform_scene("late", SENTINEL2.collection, Utc.with_ymd_and_hms(2024, 6, 20, 11, 0, 0).unwrap(), Some(2.0), &g, &s2_bands(0.0)),
            uniform_scene("old", SENTINEL2.collection, Utc.with_ymd_and_hms(2022, 6, 20, 11, 0, 0).unwrap(), Some(2.0), &g, &s2_bands(0.0)),
            uniform_scene(
                "mid",
                LANDSAT9.collection,
                Utc.with_ymd_and_hms(2024, 6, 10, 11, 0, 0).unwrap(),
                Some(2.0),
                &g,
                &[("SR_B2", 10000.0), ("SR_B4", 12000.0), ("SR_B5", 20000.0), ("SR_B6", 15000.0), ("QA_PIXEL", 0.0)],
            ),
        ]);

        let acq = acquire(&platform, &Sensor::ALL, &g, date(2024, 6, 1), date(2024, 6, 30), 3, 20.0)
            .await
            .unwrap();
        let ids: Vec<&str> = acq.scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "mid", "late"]);
        assert_eq!(acq.window_count(), 2);
        assert_eq!(acq.latest().unwrap().id, "late");
        assert_eq!(acq.history_start, date(2021, 6, 1));
    }
}
