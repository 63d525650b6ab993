use serde::{Deserialize, Serialize};
use std::fmt;

/// A brain region; each one hosts exactly one mini-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Prefrontal,
    Temporal,
    Occipital,
    Cerebellum,
    Parietal,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Prefrontal,
        Region::Temporal,
        Region::Occipital,
        Region::Cerebellum,
        Region::Parietal,
    ];

    /// Task name used by the streak service.
    pub fn name(self) -> &'static str {
        match self {
            Region::Prefrontal => "prefrontal",
            Region::Temporal => "temporal",
            Region::Occipital => "occipital",
            Region::Cerebellum => "cerebellum",
            Region::Parietal => "parietal",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Region::Prefrontal => "Prefrontal Cortex",
            Region::Temporal => "Temporal Lobe",
            Region::Occipital => "Occipital Lobe",
            Region::Cerebellum => "Cerebellum",
            Region::Parietal => "Parietal Lobe",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_serde_representation() {
        for r in Region::ALL {
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, format!("\"{}\"", r.name()));
            assert_eq!(Region::from_name(r.name()), Some(r));
        }
        assert_eq!(Region::from_name(" Parietal "), Some(Region::Parietal));
        assert_eq!(Region::from_name("frontal"), None);
    }
}
