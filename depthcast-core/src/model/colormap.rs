use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Color palettes the depth renderer can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Colormap {
    Rainbow,
    Jet,
    Turbo,
    Hot,
    Cool,
    Hsv,
    Bone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown colormap: {name}. Available: {available}")]
pub struct UnknownColormap {
    pub name: String,
    pub available: String,
}

impl Colormap {
    pub const ALL: [Colormap; 7] = [
        Colormap::Rainbow,
        Colormap::Jet,
        Colormap::Turbo,
        Colormap::Hot,
        Colormap::Cool,
        Colormap::Hsv,
        Colormap::Bone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Rainbow => "RAINBOW",
            Colormap::Jet => "JET",
            Colormap::Turbo => "TURBO",
            Colormap::Hot => "HOT",
            Colormap::Cool => "COOL",
            Colormap::Hsv => "HSV",
            Colormap::Bone => "BONE",
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl FromStr for Colormap {
    type Err = UnknownColormap;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownColormap {
                name: s.to_owned(),
                available: Self::ALL.map(Colormap::name).join(", "),
            })
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
