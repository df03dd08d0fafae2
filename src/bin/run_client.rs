use clap::Parser;

use issue_tracker::client::Client;
use issue_tracker::frame::Frame;
use issue_tracker::{Error, DEFAULT_PORT};

/// Sends one command and prints the server's reply.
///
/// Each invocation is its own connection, so commands that need a logged-in
/// session only succeed when sent by a longer-lived client.
#[derive(Debug, Parser)]
#[command(name = "run_client", version)]
struct Cli {
    /// Server address
    #[arg(long, env = "TRACKER_ADDR", default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    addr: String,

    /// Command name, e.g. `register`
    command: String,

    /// Command arguments in wire order
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut frame = Frame::new(cli.command);
    for arg in cli.args {
        frame.push_string(arg);
    }

    let mut client = Client::connect(&cli.addr).await?;

    let response = client.send(frame).await?;
    println!("{response}");

    client.disconnect().await
}
