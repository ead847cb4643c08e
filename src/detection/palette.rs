//! Deterministic class colors.
//!
//! The palette is generated from `ChaCha12Rng::seed_from_u64(42)`: 100
//! entries, each made of three successive `random::<u8>()` draws in r, g, b
//! order. The colors are identical across `rand` releases and platforms.

use std::sync::LazyLock;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::models::Color;

pub const PALETTE_SEED: u64 = 42;
pub const PALETTE_SIZE: usize = 100;

static PALETTE: LazyLock<ColorPalette> = LazyLock::new(|| ColorPalette::generate(PALETTE_SEED));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPalette {
    colors: Vec<Color>,
}

impl ColorPalette {
    pub fn generate(seed: u64) -> Self {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let colors = (0..PALETTE_SIZE)
            .map(|_| Color {
                r: rng.random(),
                g: rng.random(),
                b: rng.random(),
            })
            .collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color_for(&self, class_id: u32) -> Color {
        self.colors[class_id as usize % self.colors.len()]
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// The process-wide palette, built on first use
pub fn palette() -> &'static ColorPalette {
    &PALETTE
}

pub fn color_for(class_id: u32) -> Color {
    PALETTE.color_for(class_id)
}
