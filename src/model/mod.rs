pub mod board;
pub mod config;
pub mod container;
pub mod event;
pub mod item;
pub mod snapshot;

pub use board::*;
pub use config::*;
pub use container::*;
pub use event::*;
pub use item::*;
pub use snapshot::*;
