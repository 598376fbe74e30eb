//! Interactive reordering engine for shared kanban boards.
//!
//! [`ops::session::BoardSession`] owns one board's [`model::OrderModel`]
//! and drives drag gestures, optimistic moves and remote change events
//! against it. Network calls are returned as effects and performed by the
//! adapters in [`io`].

pub mod cli;
pub mod input;
pub mod io;
pub mod model;
pub mod ops;
