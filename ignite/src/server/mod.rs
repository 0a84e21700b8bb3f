mod ignite_server;

#[cfg(feature = "hyper_server")]
pub mod hyper_server;

pub use self::ignite_server::IgniteServer;

#[cfg(feature = "hyper_server")]
pub use self::hyper_server::HyperServer;
