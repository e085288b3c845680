/// Cut paths of trimmed bits
pub mod cut_path;
/// Boundary points used to orient a piece during handling
pub mod distant_points;
pub mod geo_traits;
/// Grip point computation based on the pole of inaccessibility
pub mod grip;
pub mod primitives;
pub mod region;
mod transformation;

#[doc(inline)]
pub use region::Region;
#[doc(inline)]
pub use region::Winding;
#[doc(inline)]
pub use transformation::Transformation;
