mod logger;
mod recovery;

pub use self::logger::logger;
pub use self::recovery::recovery;
