use std::sync::LazyLock;
use std::time::Instant;

pub mod classic_brick;
pub mod config;
pub mod driver;
pub mod io;
pub mod scheduler;

pub static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);
