//! Crop types with lenient name parsing

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Crops with a phenological reference curve, plus `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CropType {
    Olive,
    Vineyard,
    Almond,
    Other,
}

impl CropType {
    pub fn as_str(self) -> &'static str {
        match self {
            CropType::Olive => "olive",
            CropType::Vineyard => "vineyard",
            CropType::Almond => "almond",
            CropType::Other => "other",
        }
    }
}

impl FromStr for CropType {
    type Err = Infallible;

    /// Spanish and English names and their common variants; unknown names map to `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Ok(match name.as_str() {
            "olivo" | "olivar" | "oliva" | "olive" | "olives" => CropType::Olive,
            "viña" | "viñedo" | "vina" | "vinedo" | "vid" | "vino" | "vineyard" | "vine"
            | "grape" => CropType::Vineyard,
            "almendro" | "almendra" | "almendral" | "almond" => CropType::Almond,
            _ => CropType::Other,
        })
    }
}

impl From<String> for CropType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(crop) => crop,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
