//! Motion style presets understood by the motion director.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All valid style preset keys.
pub const VALID_STYLE_PRESETS: &[&str] = &[
    "fashion_walk",
    "fashion_show",
    "music_video",
    "cinematic_narrative",
    "product_showcase",
    "dance_performance",
    "editorial",
];

/// Directing style applied to every scene of an auto-motion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylePreset {
    FashionWalk,
    FashionShow,
    MusicVideo,
    #[default]
    CinematicNarrative,
    ProductShowcase,
    DancePerformance,
    Editorial,
}

impl StylePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FashionWalk => "fashion_walk",
            Self::FashionShow => "fashion_show",
            Self::MusicVideo => "music_video",
            Self::CinematicNarrative => "cinematic_narrative",
            Self::ProductShowcase => "product_showcase",
            Self::DancePerformance => "dance_performance",
            Self::Editorial => "editorial",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FashionWalk => "Fashion Walk",
            Self::FashionShow => "Fashion Show",
            Self::MusicVideo => "Music Video",
            Self::CinematicNarrative => "Cinematic Narrative",
            Self::ProductShowcase => "Product Showcase",
            Self::DancePerformance => "Dance Performance",
            Self::Editorial => "Editorial",
        }
    }

    /// Parse a preset key. Unknown keys are rejected rather than defaulted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "fashion_walk" => Ok(Self::FashionWalk),
            "fashion_show" => Ok(Self::FashionShow),
            "music_video" => Ok(Self::MusicVideo),
            "cinematic_narrative" => Ok(Self::CinematicNarrative),
            "product_showcase" => Ok(Self::ProductShowcase),
            "dance_performance" => Ok(Self::DancePerformance),
            "editorial" => Ok(Self::Editorial),
            _ => Err(CoreError::Precondition(format!(
                "Invalid style preset '{s}'. Must be one of: {}",
                VALID_STYLE_PRESETS.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_valid_key_round_trips() {
        for key in VALID_STYLE_PRESETS {
            assert_eq!(StylePreset::parse(key).unwrap().as_str(), *key);
        }
    }

    #[test]
    fn default_is_cinematic_narrative() {
        assert_eq!(StylePreset::default(), StylePreset::CinematicNarrative);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let msg = StylePreset::parse("vaporwave").unwrap_err().to_string();
        assert!(msg.contains("vaporwave"));
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&StylePreset::ProductShowcase).unwrap();
        assert_eq!(json, "\"product_showcase\"");
    }
}
