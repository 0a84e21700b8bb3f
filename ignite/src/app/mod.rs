mod engine;
mod router;

pub mod testing;

pub use self::engine::{Engine, RouterGroup};
pub use self::router::Router;
