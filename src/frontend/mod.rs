//! Line-oriented TCP front end.
//!
//! Each connection picks a name, is attached to that player's actor through a
//! [`ChannelSink`], and from then on every line it sends is player input.
//! Output is ANSI-colored text or one JSON-encoded [`Message`] per line,
//! depending on [`Protocol`].

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;

use crate::config::Protocol;
use crate::engine::{ChannelSink, Engine};
use crate::logutil::escape_log;
use crate::markup;
use crate::messaging::Message;
use crate::validation::{sanitize_input, validate_player_name, PlayerName};

const NAME_PROMPT: &str = "By what name are you known? ";
const MAX_NAME_ATTEMPTS: usize = 3;

/// Render one message as a single output line for `protocol`.
pub fn render(message: &Message, protocol: Protocol) -> Result<String> {
    let mut line = match protocol {
        Protocol::Text => markup::to_ansi(&message.segments),
        Protocol::Json => serde_json::to_string(message)?,
    };
    line.push_str("\r\n");
    Ok(line)
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, engine: Engine, protocol: Protocol) -> Result<()> {
    info!("front end listening on {}", listener.local_addr()?);
    loop {
        let (stream, peer) = listener.accept().await?;
        let engine = engine.clone();
        tokio::spawn(async move {
            debug!("connection from {}", peer);
            let (rd, wr) = stream.into_split();
            if let Err(e) = handle_connection(rd, wr, engine, protocol).await {
                warn!("connection {} ended with error: {}", peer, e);
            }
        });
    }
}

async fn read_name<R, W>(
    lines: &mut Lines<BufReader<R>>,
    wr: &mut W,
) -> Result<Option<PlayerName>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    for _ in 0..MAX_NAME_ATTEMPTS {
        wr.write_all(NAME_PROMPT.as_bytes()).await?;
        wr.flush().await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match validate_player_name(&sanitize_input(&line)) {
            Ok(name) => return Ok(Some(name)),
            Err(e) => {
                wr.write_all(format!("{}\r\n", e).as_bytes()).await?;
            }
        }
    }
    wr.write_all(b"Too many attempts.\r\n").await?;
    Ok(None)
}

/// Drive one client: name prompt, attach, then input until EOF or `quit`.
pub async fn handle_connection<R, W>(
    rd: R,
    mut wr: W,
    engine: Engine,
    protocol: Protocol,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(rd).lines();
    let Some(name) = read_name(&mut lines, &mut wr).await? else {
        return Ok(());
    };

    engine.create_player(&name).await?;
    let (sink, mut outbox) = ChannelSink::new();
    let sink_id = engine.register_sink(&name.id, Arc::new(sink))?;
    info!("{} connected (sink {})", escape_log(&name.id), sink_id.as_u64());

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let line = render(&message, protocol)?;
            wr.write_all(line.as_bytes()).await?;
            wr.flush().await?;
        }
        Ok::<_, anyhow::Error>(())
    });

    let result = async {
        while let Some(line) = lines.next_line().await? {
            let text = sanitize_input(&line);
            if text.eq_ignore_ascii_case("quit") {
                break;
            }
            if text.is_empty() {
                continue;
            }
            engine
                .handle_input(&name.id, &text)
                .map_err(|e| anyhow!("input for {} rejected: {}", name.id, e))?;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    engine.unregister_sink(&name.id, sink_id);
    writer.abort();
    info!("{} disconnected", escape_log(&name.id));
    result
}
