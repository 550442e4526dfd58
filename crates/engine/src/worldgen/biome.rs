use crate::world::block::BlockType;

/// Terrain classes, ordered by the biome noise value that selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Biome {
    Desert,
    Plains,
    Forest,
    Mountains,
    Snow,
}

/// Upper bounds (inclusive) of each band; anything above the last is Snow.
const BANDS: [(f64, Biome); 4] = [
    (-0.6, Biome::Desert),
    (-0.2, Biome::Plains),
    (0.2, Biome::Forest),
    (0.6, Biome::Mountains),
];

impl Biome {
    /// A value exactly on a threshold belongs to the lower band.
    pub fn classify(noise: f64) -> Biome {
        BANDS
            .iter()
            .find(|(upper, _)| noise <= *upper)
            .map_or(Biome::Snow, |(_, biome)| *biome)
    }

    /// `(base height, scale)` applied to the normalised height noise.
    pub const fn height_params(self) -> (f64, f64) {
        match self {
            Biome::Desert => (42.0, 4.0),
            Biome::Plains => (45.0, 6.0),
            Biome::Forest => (47.0, 10.0),
            Biome::Mountains => (56.0, 22.0),
            Biome::Snow => (60.0, 14.0),
        }
    }

    pub const fn surface(self) -> BlockType {
        match self {
            Biome::Desert => BlockType::Sand,
            Biome::Plains | Biome::Forest | Biome::Mountains => BlockType::Grass,
            Biome::Snow => BlockType::Snow,
        }
    }

    pub const fn subsurface(self) -> BlockType {
        match self {
            Biome::Desert => BlockType::Sandstone,
            Biome::Mountains => BlockType::Stone,
            Biome::Plains | Biome::Forest | Biome::Snow => BlockType::Dirt,
        }
    }

    /// Chance per surface column of planting a tree.
    pub const fn tree_density(self) -> f64 {
        match self {
            Biome::Desert => 0.0,
            Biome::Plains => 0.008,
            Biome::Forest => 0.05,
            Biome::Mountains => 0.004,
            Biome::Snow => 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_in_order() {
        assert_eq!(Biome::classify(-0.9), Biome::Desert);
        assert_eq!(Biome::classify(-0.4), Biome::Plains);
        assert_eq!(Biome::classify(0.0), Biome::Forest);
        assert_eq!(Biome::classify(0.5), Biome::Mountains);
        assert_eq!(Biome::classify(0.9), Biome::Snow);
    }

    #[test]
    fn ties_resolve_to_lower_band() {
        assert_eq!(Biome::classify(-0.6), Biome::Desert);
        assert_eq!(Biome::classify(-0.2), Biome::Plains);
        assert_eq!(Biome::classify(0.2), Biome::Forest);
        assert_eq!(Biome::classify(0.6), Biome::Mountains);
    }
}
