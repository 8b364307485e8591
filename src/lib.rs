pub mod codec;
pub mod config;
pub mod connection;
pub mod encode;
pub mod error;
pub mod frame;

pub use config::Config;
pub use connection::Connection;
pub use encode::{ToArg, ToRedis};
pub use error::Error;
pub use frame::Frame;

pub type Result<T> = std::result::Result<T, Error>;
