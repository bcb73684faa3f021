use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout carries the reply; logs must stay on stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncfetch_worker=warn".parse()?),
        )
        .init();

    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;
    let input = String::from_utf8_lossy(&input);

    let reply = syncfetch_worker::handle(&input).await;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(reply.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
