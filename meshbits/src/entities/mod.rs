mod bit;
mod bit3d;
mod layer;
mod pavement;
mod slice;
mod sub_bit;

#[doc(inline)]
pub use bit::Bit;

#[doc(inline)]
pub use sub_bit::SubBit;

#[doc(inline)]
pub use bit3d::Bit3D;

#[doc(inline)]
pub use bit3d::BitAssignment;

#[doc(inline)]
pub use pavement::BitKey;

#[doc(inline)]
pub use pavement::Pavement;

#[doc(inline)]
pub use layer::Layer;

#[doc(inline)]
pub use layer::LayerSnapshot;

#[doc(inline)]
pub use slice::Model;

#[doc(inline)]
pub use slice::Slice;

#[doc(inline)]
pub use slice::Triangle;

#[doc(inline)]
pub use slice::skirt_radius;
