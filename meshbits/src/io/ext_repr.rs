use serde::{Deserialize, Serialize};

use crate::geometry::Winding;

/// Version of the persisted format, stored in every [`ExtLayer`] and [`ExtMesh`]
pub const FORMAT_VERSION: u32 = 1;

/// A closed ring as an ordered list of points, without repeated closing point.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtRing(pub Vec<(f64, f64)>);

/// External representation of a [`Region`](crate::geometry::Region).
/// Exteriors are exported counterclockwise and holes clockwise.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtRegion {
    /// Rule combining the rings into an area
    pub winding: Winding,
    pub rings: Vec<ExtRing>,
}

/// External representation of a [`SubBit`](crate::entities::SubBit).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtSubBit {
    /// The piece, in the local frame of its bit
    pub region: ExtRegion,
    #[serde(default)]
    pub removed: bool,
}

/// External representation of a [`Bit`](crate::entities::Bit).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtBit {
    pub origin: (f64, f64),
    /// Unit vector of the bit's length axis
    pub orientation: (f64, f64),
    pub length: f64,
    pub width: f64,
    pub sub_bits: Vec<ExtSubBit>,
}

/// External representation of a [`Pavement`](crate::entities::Pavement).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ExtPavement {
    pub bits: Vec<ExtBit>,
}

/// External representation of a [`Slice`](crate::entities::Slice).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtSlice {
    pub altitude: f64,
    /// Rings combined by the even-odd rule
    pub polygons: Vec<ExtRing>,
}

/// External representation of a [`Layer`](crate::entities::Layer).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtLayer {
    pub version: u32,
    pub index: usize,
    pub slice: ExtSlice,
    pub paved: bool,
    #[serde(default)]
    pub pavement: ExtPavement,
    /// Keys of the irregular bits, as stored. Recomputed on import.
    #[serde(default)]
    pub irregular_keys: Vec<(f64, f64)>,
}

/// External representation of a [`Mesh`](crate::pipeline::Mesh).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExtMesh {
    pub version: u32,
    pub skirt_radius: f64,
    pub layers: Vec<ExtLayer>,
}
