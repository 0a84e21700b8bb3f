use std::io;

use async_trait::async_trait;

use crate::app::Engine;

#[async_trait]
pub trait IgniteServer {
    fn new(engine: Engine) -> Self;

    /// Serves until ctrl-c, then waits for in-flight requests before returning.
    async fn build(self, host: &str, port: u16) -> io::Result<()>;

    fn start(self, host: &str, port: u16) -> io::Result<()>
    where
        Self: Sized,
    {
        tokio::runtime::Runtime::new()?.block_on(self.build(host, port))
    }
}
