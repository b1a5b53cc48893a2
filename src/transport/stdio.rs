//! Line-delimited JSON-RPC over a byte stream.
//!
//! One request is read, dispatched and answered before the next line is
//! read, so responses come out in request order. Each response is written
//! as one complete line and flushed.

use crate::dispatcher::Dispatcher;
use crate::shutdown::ShutdownSignal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Serve requests from `reader` until EOF or shutdown.
pub async fn serve<R, W>(
    dispatcher: &Dispatcher,
    mut reader: R,
    mut writer: W,
    mut shutdown: Option<ShutdownSignal>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();

        let read = match shutdown.as_mut() {
            Some(signal) => tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read?,
                _ = signal.recv() => {
                    info!("Shutdown requested; no longer reading requests");
                    break;
                }
            },
            None => reader.read_until(b'\n', &mut buf).await?,
        };

        if read == 0 {
            debug!("Input closed");
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("Discarding line that is not UTF-8: {}", e);
                continue;
            }
        };

        let Some(response) = dispatcher.handle_line(line).await else {
            continue;
        };

        let mut encoded = match serde_json::to_vec(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode response: {}", e);
                continue;
            }
        };
        encoded.push(b'\n');

        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(
    dispatcher: &Dispatcher,
    shutdown: Option<ShutdownSignal>,
) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(dispatcher, stdin, stdout, shutdown).await
}
