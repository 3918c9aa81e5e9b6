//! JSON-lines transport between a host editor and a session.
//!
//! Each stdin line is one [`PanelIntent`]; each stdout line is one
//! [`PanelMessage`]. Nothing else may be written to stdout. End of stdin
//! disposes the panel.

use anyhow::{Context, Result};
use refactor_studio::contexts::SessionHandle;
use refactor_studio::data::{NoticeLevel, PanelIntent, PanelMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub async fn serve(handle: SessionHandle) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    bridge(handle, stdin, &mut stdout).await
}

/// Relays intents read from `input` and messages written to `output` until
/// `input` ends, then drains whatever the session still has to say.
async fn bridge<R, W>(mut handle: SessionHandle, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    info!("panel bridge ready");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_intent(&line) {
                    Ok(intent) => {
                        if handle.intents.send(intent).await.is_err() {
                            warn!("session stopped; closing bridge");
                            break;
                        }
                    }
                    Err(notice) => write_message(output, &notice).await?,
                }
            }
            Some(message) = handle.messages.recv() => {
                write_message(output, &message).await?;
            }
        }
    }

    debug!("stdin closed; disposing session");
    let mut rest = handle.close().await;
    while let Some(message) = rest.recv().await {
        write_message(output, &message).await?;
    }
    Ok(())
}

/// Parses one inbound line, or explains to the panel why it could not.
fn parse_intent(line: &str) -> Result<PanelIntent, PanelMessage> {
    serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "unreadable panel intent");
        PanelMessage::notice(NoticeLevel::Error, format!("Unrecognized message: {}", e))
    })
}

async fn write_message<W>(output: &mut W, message: &PanelMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(message).context("Failed to encode panel message")?;
    line.push('\n');
    output
        .write_all(line.as_bytes())
        .await
        .context("Failed to write to stdout")?;
    output.flush().await.context("Failed to flush stdout")?;
    Ok(())
}
