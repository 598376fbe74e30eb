pub mod config_io;
pub mod dispatch;
pub mod http;
pub mod logging;
pub mod push;
pub mod ws;
