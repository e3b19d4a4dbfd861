use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::server::{Dispatch, Server};
use crate::types::McpError;

/// Serve newline-delimited JSON-RPC on the process's stdin/stdout until EOF
/// or Ctrl-C.
///
/// Anything else written to stdout corrupts the stream, so logging must be
/// configured to write to stderr.
pub async fn serve_stdio(server: &Server) -> Result<(), McpError> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        res = serve_io(server, reader, writer) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            Ok(())
        }
    }
}

/// Serve newline-delimited JSON-RPC over any reader/writer pair.
///
/// Blank lines are skipped. A broken pipe on the writer ends the loop
/// cleanly, as the client has gone away.
pub async fn serve_io<R, W>(server: &Server, reader: R, mut writer: W) -> Result<(), McpError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match server.dispatch(line.as_bytes()).await {
            Dispatch::Accepted => continue,
            Dispatch::Reply(json) | Dispatch::Rejected(json) => json,
        };

        match write_line(&mut writer, &reply).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::info!("client disconnected (broken pipe)");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("client disconnected (eof)");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
