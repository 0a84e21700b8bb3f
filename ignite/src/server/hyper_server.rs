use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::server::accept;
use hyper::service::{make_service_fn, service_fn};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use serde_json::json;
use socket2::{Domain, Socket, Type};
use tokio_stream::wrappers::TcpListenerStream;

use crate::app::Engine;
use crate::render;
use crate::server::IgniteServer;

pub struct HyperServer {
    engine: Arc<Engine>,
}

fn bind(addr: &SocketAddr) -> io::Result<TcpListenerStream> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, None)?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let _ = socket.set_nodelay(true);

    let listener: std::net::TcpListener = socket.into();

    Ok(TcpListenerStream::new(tokio::net::TcpListener::from_std(
        listener,
    )?))
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let envelope = json!({ "message": message, "code": status.as_u16() });

    let mut response = Response::new(Body::from(envelope.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(render::MIME_JSON));

    response
}

async fn serve(engine: Arc<Engine>, request: Request<Body>) -> Result<Response<Body>, Infallible> {
    let (parts, body) = request.into_parts();
    let read_timeout = engine.config().read_timeout();

    let body = match tokio::time::timeout(read_timeout, hyper::body::to_bytes(body)).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            warn!("Could not read the body of {}: {}", parts.uri, e);
            return Ok(error_response(StatusCode::BAD_REQUEST, "Bad Request"));
        }
        Err(_) => {
            warn!("Timed out reading the body of {}", parts.uri);
            return Ok(error_response(
                StatusCode::REQUEST_TIMEOUT,
                "Request Timeout",
            ));
        }
    };

    let response = engine.handle(Request::from_parts(parts, body)).await;

    Ok(response.map(Body::from))
}

impl HyperServer {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    ///
    /// Serves until `signal` resolves. Connections already accepted are allowed to
    /// finish their requests before this returns.
    ///
    pub async fn build_with_shutdown<F>(self, host: &str, port: u16, signal: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Could not resolve {}:{}", host, port),
            )
        })?;
        let listener = bind(&addr)?;
        let engine = self.engine;

        let service = make_service_fn(move |_stream: &tokio::net::TcpStream| {
            let engine = engine.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |request| serve(engine.clone(), request)))
            }
        });

        info!("Listening on http://{}", addr);

        hyper::Server::builder(accept::from_stream(listener))
            .serve(service)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        info!("Server on {} shut down", addr);

        Ok(())
    }
}

#[async_trait]
impl IgniteServer for HyperServer {
    fn new(engine: Engine) -> Self {
        HyperServer {
            engine: Arc::new(engine),
        }
    }

    async fn build(self, host: &str, port: u16) -> io::Result<()> {
        self.build_with_shutdown(host, port, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for ctrl-c: {}", e);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Runtime;

    #[test]
    fn it_should_write_an_escaped_json_envelope() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad \"body\"");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            render::MIME_JSON
        );

        let body = Runtime::new()
            .unwrap()
            .block_on(hyper::body::to_bytes(response.into_body()))
            .unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(envelope, json!({ "message": "bad \"body\"", "code": 400 }));
    }
}
