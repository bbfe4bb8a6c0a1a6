//! AtlasRESP CLI Client
//!
//! Sends one command to a RESP server and prints the reply.

use std::process::ExitCode;

use atlasresp::{Command, Config, Connection, ConnectionMode, Reply};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasRESP CLI
#[derive(Parser, Debug)]
#[command(name = "atlasresp-cli")]
#[command(about = "Send a command to a RESP server")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = atlasresp::config::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = atlasresp::config::DEFAULT_PORT)]
    port: u16,

    /// Connect and read/write timeout in seconds
    #[arg(short, long, default_value_t = 1.0)]
    timeout: f64,

    /// Go through the keep-alive channel instead of a fresh socket
    #[arg(long)]
    persistent: bool,

    /// Command name
    command: String,

    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,atlasresp=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mode = if args.persistent {
        ConnectionMode::Persistent
    } else {
        ConnectionMode::Transient
    };
    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .timeout_secs(args.timeout)
        .mode(mode)
        .build();

    let mut conn = match Connection::open(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = Command::new(&args.command).args(&args.args);
    match conn.call(&command) {
        Ok(reply) => {
            print!("{}", render(&reply, 0));
            ExitCode::SUCCESS
        }
        Err(e) if e.is_server_error() => {
            println!("(error) {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// redis-cli style rendering, one element per line
fn render(reply: &Reply, indent: usize) -> String {
    match reply {
        Reply::Status(s) => format!("{}\n", s),
        Reply::Integer(i) => format!("(integer) {}\n", i),
        Reply::Numeric(s) => format!("(integer) {}\n", s),
        Reply::Bulk(b) => format!("\"{}\"\n", String::from_utf8_lossy(b).escape_debug()),
        Reply::Nil => "(nil)\n".to_string(),
        Reply::Array(items) if items.is_empty() => "(empty array)\n".to_string(),
        Reply::Array(items) => {
            let width = items.len().to_string().len();
            let mut out = String::new();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(indent));
                }
                let prefix = format!("{:>width$}) ", i + 1, width = width);
                out.push_str(&prefix);
                out.push_str(&render(item, indent + prefix.len()));
            }
            out
        }
    }
}
