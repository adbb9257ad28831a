//! Phenological reference curves, phases and status classification
//!
//! Expected NDVI is a 12-stage step function of day-of-year (1-based) per
//! crop. Stage boundaries are the first day of each month in a non-leap year.

use super::crop::CropType;
use serde::{Deserialize, Serialize};

/// One step of a reference curve, valid for `doy < until_doy`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhenoStage {
    pub until_doy: u32,
    pub name: &'static str,
    pub expected_ndvi: f64,
}

const fn stage(until_doy: u32, name: &'static str, expected_ndvi: f64) -> PhenoStage {
    PhenoStage {
        until_doy,
        name,
        expected_ndvi,
    }
}

const END: u32 = 367;

const OLIVE_CURVE: [PhenoStage; 12] = [
    stage(32, "Deep dormancy", 0.28),
    stage(60, "Early recovery", 0.32),
    stage(91, "Spring flush", 0.42),
    stage(121, "Active growth", 0.52),
    stage(152, "Flowering", 0.58),
    stage(182, "Fruit set", 0.62),
    stage(213, "Summer stress", 0.55),
    stage(244, "Fruit growth", 0.48),
    stage(274, "Oil accumulation", 0.45),
    stage(305, "Veraison", 0.40),
    stage(335, "Harvest", 0.35),
    stage(END, "Post-harvest", 0.28),
];

const VINEYARD_CURVE: [PhenoStage; 12] = [
    stage(32, "Deep dormancy", 0.18),
    stage(60, "Dormancy", 0.18),
    stage(91, "Bud swell", 0.22),
    stage(121, "Budbreak", 0.35),
    stage(152, "Shoot growth", 0.50),
    stage(182, "Flowering", 0.58),
    stage(213, "Berry set", 0.52),
    stage(244, "Veraison", 0.45),
    stage(274, "Ripening", 0.40),
    stage(305, "Harvest", 0.32),
    stage(335, "Leaf fall", 0.22),
    stage(END, "Dormancy", 0.18),
];

const ALMOND_CURVE: [PhenoStage; 12] = [
    stage(32, "Dormancy", 0.25),
    stage(60, "Flowering", 0.22),
    stage(91, "Leaf out", 0.38),
    stage(121, "Active growth", 0.52),
    stage(152, "Kernel fill", 0.62),
    stage(182, "Peak canopy", 0.65),
    stage(213, "Hull split", 0.58),
    stage(244, "Harvest", 0.50),
    stage(274, "Post-harvest", 0.42),
    stage(305, "Early senescence", 0.35),
    stage(335, "Leaf drop", 0.28),
    stage(END, "Dormancy", 0.25),
];

/// Reference curve for a crop; `None` for `Other`
pub fn reference_curve(crop: CropType) -> Option<&'static [PhenoStage; 12]> {
    match crop {
        CropType::Olive => Some(&OLIVE_CURVE),
        CropType::Vineyard => Some(&VINEYARD_CURVE),
        CropType::Almond => Some(&ALMOND_CURVE),
        CropType::Other => None,
    }
}

/// Stage of the curve containing `doy`
pub fn stage_at(crop: CropType, doy: u32) -> Option<&'static PhenoStage> {
    reference_curve(crop)?
        .iter()
        .find(|s| doy < s.until_doy)
}

/// Expected NDVI for a crop at a day of year
pub fn expected_ndvi(crop: CropType, doy: u32) -> Option<f64> {
    stage_at(crop, doy).map(|s| s.expected_ndvi)
}

/// Agronomic phase name (six per crop)
pub fn phase(crop: CropType, doy: u32) -> &'static str {
    let phases: &[(u32, &str)] = match crop {
        CropType::Olive => &[
            (60, "Latencia invernal"),
            (121, "Brotacion primaveral"),
            (182, "Floracion y cuajado"),
            (274, "Desarrollo del fruto"),
            (335, "Maduracion y cosecha"),
            (END, "Post-cosecha"),
        ],
        CropType::Vineyard => &[
            (91, "Dormancia"),
            (152, "Brotacion y crecimiento"),
            (213, "Floracion y envero"),
            (274, "Maduracion"),
            (305, "Vendimia"),
            (END, "Senescencia"),
        ],
        CropType::Almond => &[
            (60, "Dormancia/Floracion"),
            (121, "Desarrollo foliar"),
            (182, "Plena vegetacion"),
            (244, "Llenado de grano"),
            (274, "Cosecha"),
            (END, "Senescencia"),
        ],
        CropType::Other => &[],
    };
    phases
        .iter()
        .find(|(until, _)| doy < *until)
        .map(|(_, name)| *name)
        .unwrap_or("No definida")
}

/// Development relative to expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhenoStatus {
    Adelantado,
    Normal,
    Retrasado,
    Critico,
    SinDatos,
}

impl PhenoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhenoStatus::Adelantado => "adelantado",
            PhenoStatus::Normal => "normal",
            PhenoStatus::Retrasado => "retrasado",
            PhenoStatus::Critico => "critico",
            PhenoStatus::SinDatos => "sin_datos",
        }
    }

    /// From deviation against the reference curve, in percent
    pub fn from_deviation_pct(pct: f64) -> Self {
        if pct > 15.0 {
            PhenoStatus::Adelantado
        } else if pct > -10.0 {
            PhenoStatus::Normal
        } else if pct > -25.0 {
            PhenoStatus::Retrasado
        } else {
            PhenoStatus::Critico
        }
    }

    /// From the seasonal z-score
    pub fn from_zscore(z: f64) -> Self {
        if z > 1.0 {
            PhenoStatus::Adelantado
        } else if z > -1.0 {
            PhenoStatus::Normal
        } else if z > -2.0 {
            PhenoStatus::Retrasado
        } else {
            PhenoStatus::Critico
        }
    }
}

/// Phenological reading of one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenologyAssessment {
    pub doy: u32,
    pub phase: String,
    pub stage: Option<String>,
    pub expected_ndvi: Option<f64>,
    pub deviation: Option<f64>,
    pub deviation_pct: Option<f64>,
    pub status: PhenoStatus,
}

/// Compare `current_ndvi` with the crop curve at `doy`.
///
/// Status comes from the curve deviation when available, otherwise from the
/// seasonal z-score, otherwise it is `SinDatos`.
pub fn assess(
    crop: CropType,
    doy: u32,
    current_ndvi: Option<f64>,
    seasonal_zscore: Option<f64>,
) -> PhenologyAssessment {
    let stage = stage_at(crop, doy);
    let expected = stage.map(|s| s.expected_ndvi);
    let current = current_ndvi.filter(|v| v.is_finite());

    let (deviation, deviation_pct) = match (current, expected) {
        (Some(c), Some(e)) if e > 0.0 => (Some(c - e), Some((c - e) / e * 100.0)),
        _ => (None, None),
    };

    let status = match (deviation_pct, seasonal_zscore) {
        (Some(pct), _) => PhenoStatus::from_deviation_pct(pct),
        (None, Some(z)) if z.is_finite() => PhenoStatus::from_zscore(z),
        _ => PhenoStatus::SinDatos,
    };

    PhenologyAssessment {
        doy,
        phase: phase(crop, doy).to_string(),
        stage: stage.map(|s| s.name.to_string()),
        expected_ndvi: expected,
        deviation,
        deviation_pct,
        status,
    }
}
