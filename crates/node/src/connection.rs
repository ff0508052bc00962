//! Per-connection request loop.

use crate::error::Result;
use crate::state::NodeState;
use std::sync::Arc;
use streaming::{read_frame, write_frame, Request};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Serves requests from one peer until it disconnects.
///
/// Each request is answered before the next one is read, so responses come
/// back in request order.
pub async fn serve_connection(state: Arc<NodeState>, stream: TcpStream) -> Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    let mut stream = BufWriter::new(stream);
    debug!(%peer, "connection opened");

    while let Some(request) = read_frame::<_, Request>(&mut stream).await? {
        trace!(%peer, key = request.key(), "request");
        let response = state.handle(request).await;
        write_frame(&mut stream, &response).await?;
        stream.flush().await?;
    }

    debug!(%peer, "connection closed");
    Ok(())
}
