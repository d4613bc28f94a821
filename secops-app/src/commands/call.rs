//! Line-delimited JSON call loop: one request per input line, one result per
//! output line, in input order.

use anyhow::Result;
use secops_tools::{ErrorClassifier, InvocationRequest, ResultMetadata, ToolDispatcher, ToolError, ToolResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub async fn run(dispatcher: &ToolDispatcher) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let served = serve(dispatcher, stdin, tokio::io::stdout()).await?;
    debug!("Served {} call(s)", served);
    Ok(())
}

/// Returns the number of results written.
pub async fn serve<R, W>(dispatcher: &ToolDispatcher, reader: R, mut writer: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<InvocationRequest>(&line) {
            Ok(request) => dispatcher.invoke(request).await,
            Err(e) => {
                warn!("Rejected malformed request line: {}", e);
                rejected(e)
            }
        };

        let mut encoded = serde_json::to_vec(&result)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        served += 1;
    }
    Ok(served)
}

fn rejected(error: serde_json::Error) -> ToolResult {
    let error = ToolError::invalid("request", format!("not a valid invocation request: {}", error));
    ToolResult::error(
        ErrorClassifier::classify(&error, None),
        None,
        ResultMetadata::default(),
    )
}
