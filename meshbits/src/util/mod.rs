/// Set of functions used throughout to assure the correctness of the library.
pub mod assertions;

mod config;
mod fpa;
mod sync;

#[doc(inline)]
pub use config::CraftConfig;
#[doc(inline)]
pub use config::ExecutorConfig;
#[doc(inline)]
pub use fpa::EPSILON;
#[doc(inline)]
pub use fpa::FPA;
#[doc(inline)]
pub use sync::lock;
