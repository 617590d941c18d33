//! Size-chart lookups.
//!
//! Pure functions over fixed tables; nothing here is mutable or global.

use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult};

/// International clothing sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClothingSize {
    Xxs,
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
    Xxxl,
}

impl ClothingSize {
    pub const ALL: [ClothingSize; 8] = [
        ClothingSize::Xxs,
        ClothingSize::Xs,
        ClothingSize::S,
        ClothingSize::M,
        ClothingSize::L,
        ClothingSize::Xl,
        ClothingSize::Xxl,
        ClothingSize::Xxxl,
    ];

    /// Parse a label such as "xl" or " XXL ". Also accepts "2XL"/"3XL".
    pub fn parse(label: &str) -> DomainResult<Self> {
        let size = match label.trim().to_ascii_uppercase().as_str() {
            "XXS" => ClothingSize::Xxs,
            "XS" => ClothingSize::Xs,
            "S" => ClothingSize::S,
            "M" => ClothingSize::M,
            "L" => ClothingSize::L,
            "XL" => ClothingSize::Xl,
            "XXL" | "2XL" => ClothingSize::Xxl,
            "XXXL" | "3XL" => ClothingSize::Xxxl,
            other => {
                return Err(DomainError::validation(format!(
                    "unknown clothing size '{other}'"
                )));
            }
        };
        Ok(size)
    }

    pub fn label(self) -> &'static str {
        match self {
            ClothingSize::Xxs => "XXS",
            ClothingSize::Xs => "XS",
            ClothingSize::S => "S",
            ClothingSize::M => "M",
            ClothingSize::L => "L",
            ClothingSize::Xl => "XL",
            ClothingSize::Xxl => "XXL",
            ClothingSize::Xxxl => "XXXL",
        }
    }

    /// EU (and RU) numeric size.
    pub fn eu(self) -> u8 {
        match self {
            ClothingSize::Xxs => 40,
            ClothingSize::Xs => 42,
            ClothingSize::S => 44,
            ClothingSize::M => 46,
            ClothingSize::L => 48,
            ClothingSize::Xl => 50,
            ClothingSize::Xxl => 52,
            ClothingSize::Xxxl => 54,
        }
    }

    /// US numeric size.
    pub fn us(self) -> u8 {
        match self {
            ClothingSize::Xxs => 0,
            ClothingSize::Xs => 2,
            ClothingSize::S => 4,
            ClothingSize::M => 8,
            ClothingSize::L => 12,
            ClothingSize::Xl => 16,
            ClothingSize::Xxl => 20,
            ClothingSize::Xxxl => 24,
        }
    }

    /// Reverse lookup from an EU size.
    pub fn from_eu(eu: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.eu() == eu)
    }
}

/// Convert an EU shoe size (35-47) to the US men's size.
pub fn shoe_size_eu_to_us(eu: u8) -> Option<f32> {
    let us = match eu {
        35 => 3.5,
        36 => 4.0,
        37 => 5.0,
        38 => 5.5,
        39 => 6.5,
        40 => 7.0,
        41 => 8.0,
        42 => 8.5,
        43 => 9.5,
        44 => 10.0,
        45 => 11.0,
        46 => 12.0,
        47 => 13.0,
        _ => return None,
    };
    Some(us)
}
