pub mod keyboard;
pub mod pointer;

pub use keyboard::{Direction, KeyboardCommand, KeyboardSensor};
pub use pointer::PointerSensor;
