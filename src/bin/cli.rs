use clap::Parser;
use respwire::{Config, Connection, Error, Frame};
use tokio::net::TcpStream;
use tracing::{debug, info};

const HOST: &str = "127.0.0.1";
const PORT: u16 = 6379;

/// Sends one command to a Redis-compatible server and prints the reply.
#[derive(Parser, Debug)]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, env = "REDIS_HOST", default_value = HOST)]
    host: String,

    /// Server port
    #[arg(short, long, env = "REDIS_PORT", default_value_t = PORT)]
    port: u16,

    /// Command name followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let args = Args::parse();
    let config = Config::from_env()?;

    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    let mut conn = Connection::with_config(stream, config);
    info!(connection_id = %conn.id(), "connected to {}:{}", args.host, args.port);

    let reply = conn.call(&args.command).await;
    conn.close().await?;

    match reply {
        Ok(frame) => println!("{}", frame),
        Err(Error::Server(message)) => println!("{}", Frame::Error(message)),
        Err(err) => return Err(err),
    }

    Ok(())
}
