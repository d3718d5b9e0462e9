use crate::CONFY_APP_NAME;
use crate::error::DtsResult;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StripAlgorithm {
    CacheSimulation,
    DegreeGreedy,
}

impl StripAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheSimulation => "cache",
            Self::DegreeGreedy => "greedy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cache" | "nv" => Some(Self::CacheSimulation),
            "greedy" | "qad" => Some(Self::DegreeGreedy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripSettings {
    pub algorithm: StripAlgorithm,
    pub cache_size: usize,
    pub min_strip_length: usize, // in faces; shorter strips become lists
    pub stitch: bool,
    pub max_strip_size: usize, // greedy stripper only, in indices
    pub lists_only: bool,
}

impl Default for StripSettings {
    fn default() -> Self {
        Self {
            algorithm: StripAlgorithm::CacheSimulation,
            cache_size: 16,
            min_strip_length: 0,
            stitch: false,
            max_strip_size: 7,
            lists_only: false,
        }
    }
}

impl StripSettings {
    pub fn load() -> Self {
        confy::load(CONFY_APP_NAME, "strip").unwrap_or_default()
    }

    pub fn save(&self) -> DtsResult<()> {
        confy::store(CONFY_APP_NAME, "strip", self)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSettings {
    pub max_depth: u32,
    pub num_big_faces: usize,
    pub z_layer_up: bool,
    pub z_layer_down: bool,
    pub always_write_depth: bool,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            num_big_faces: 0,
            z_layer_up: true,
            z_layer_down: true,
            always_write_depth: false,
        }
    }
}

impl SortSettings {
    pub fn load() -> Self {
        confy::load(CONFY_APP_NAME, "sort").unwrap_or_default()
    }

    pub fn save(&self) -> DtsResult<()> {
        confy::store(CONFY_APP_NAME, "sort", self)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    pub exporter_version: u32,
    pub case_insensitive_names: bool,
    pub export_sequences: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            exporter_version: 0,
            case_insensitive_names: true,
            export_sequences: true,
        }
    }
}

impl ExportSettings {
    pub fn load() -> Self {
        confy::load(CONFY_APP_NAME, "export").unwrap_or_default()
    }

    pub fn save(&self) -> DtsResult<()> {
        confy::store(CONFY_APP_NAME, "export", self)?;
        Ok(())
    }
}

// Aggregate struct for convenience
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub strip: StripSettings,
    pub sort: SortSettings,
    pub export: ExportSettings,
}

impl Settings {
    pub fn load() -> Self {
        Self {
            strip: StripSettings::load(),
            sort: SortSettings::load(),
            export: ExportSettings::load(),
        }
    }

    pub fn save(&self) -> DtsResult<()> {
        self.strip.save()?;
        self.sort.save()?;
        self.export.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exporter_defaults() {
        let s = Settings::default();
        assert_eq!(s.strip.cache_size, 16);
        assert_eq!(s.strip.max_strip_size, 7);
        assert_eq!(s.sort.max_depth, 2);
        assert!(s.export.export_sequences);
    }

    #[test]
    fn algorithm_names_parse() {
        for a in [StripAlgorithm::CacheSimulation, StripAlgorithm::DegreeGreedy] {
            assert_eq!(StripAlgorithm::from_name(a.name()), Some(a));
        }
        assert_eq!(StripAlgorithm::from_name("vtk"), None);
    }
}
