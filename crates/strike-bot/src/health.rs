//! Liveness endpoint

use std::net::SocketAddr;
use tokio::task::JoinHandle;
use warp::Filter;

/// Body returned by `GET /`
pub(crate) const ALIVE: &str = "Strike staff bot is running!";

pub(crate) fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::get().and(warp::path::end()).map(|| ALIVE)
}

/// Bind the liveness endpoint and serve it on its own task
pub(crate) fn spawn(port: u16) -> Result<(SocketAddr, JoinHandle<()>), warp::Error> {
    let (addr, server) = warp::serve(routes()).try_bind_ephemeral(([0, 0, 0, 0], port))?;
    tracing::info!(%addr, "liveness endpoint listening");
    Ok((addr, tokio::spawn(server)))
}
