pub mod collision;
pub mod drag;
pub mod optimistic;
pub mod order_ops;
pub mod remote;
pub mod session;
