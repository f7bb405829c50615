//! HTTP server for the municipal budget web API
//! Simple HTTP server using tokio and basic HTTP handling

use muni_budget::config::AppConfig;
use muni_budget::server::{handle_request, request_complete, HttpResponse};
use muni_budget::ServiceContext;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

const MAX_REQUEST_BYTES: usize = 1_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    muni_budget::init_tracing();

    let config = AppConfig::from_env()?;
    if config.llm.api_key.is_some() {
        info!("OpenAI API key found, using model {}", config.llm.model);
    } else {
        warn!("OPENAI_API_KEY not set - query and forecast endpoints will fail");
    }
    info!("Treasury API: {}", config.treasury_base_url);

    let bind_addr = config.bind_addr.clone();
    let ctx = Arc::new(ServiceContext::from_config(config));

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &ctx).await {
                error!("Error handling connection from {}: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: &ServiceContext) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    // Read request with timeout to prevent hanging
    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&temp_buf[..n]);

            if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    })
    .await;

    let response = match read_result {
        Err(_) => {
            warn!("Request read timeout");
            HttpResponse::error(408, "Request timeout")
        }
        Ok(Err(e)) => return Err(e),
        Ok(Ok(())) if buffer.is_empty() => return Ok(()),
        Ok(Ok(())) => match String::from_utf8(buffer) {
            Ok(request) => handle_request(ctx, &request).await,
            Err(_) => HttpResponse::error(400, "Request is not valid UTF-8"),
        },
    };

    stream.write_all(response.to_http_string().as_bytes()).await?;
    stream.flush().await
}
