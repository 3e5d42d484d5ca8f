//! Interactive terminal client for the Lounge chat server.
//!
//! Usage: `lounge-client [addr]` (default `127.0.0.1:8080`).

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error connecting to server {addr}: {e}");
            std::process::exit(1);
        }
    };
    println!("Connected to chat server!");

    let (mut reader, mut writer) = stream.into_split();

    let server_to_stdout = tokio::spawn(async move {
        let mut stdout = io::stdout();
        if let Err(e) = io::copy(&mut reader, &mut stdout).await {
            eprintln!("Read error: {e}");
        }
        println!("\nServer disconnected");
    });

    let stdin_to_server = async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if writer.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    };

    // Whichever side finishes first ends the session.
    tokio::select! {
        _ = server_to_stdout => {}
        _ = stdin_to_server => {}
    }
}
