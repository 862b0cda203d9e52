// main.rs -- screen-worms-client entry point

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use worms_client::cl_main::cl_run;
use worms_client::client::ClientConfig;
use worms_common::protocol::{is_valid_name, DEFAULT_GUI_PORT, DEFAULT_SERVER_PORT};

#[derive(Parser, Debug)]
#[command(name = "screen-worms-client", disable_help_flag = true, disable_version_flag = true)]
struct Args {
    /// Game server host name or address.
    game_server: String,

    #[arg(short = 'n', value_name = "player_name", value_parser = parse_player_name)]
    player_name: Option<String>,

    #[arg(short = 'p', value_name = "server_port")]
    server_port: Option<u16>,

    #[arg(short = 'i', value_name = "gui_server")]
    gui_server: Option<String>,

    #[arg(short = 'r', value_name = "gui_port")]
    gui_port: Option<u16>,
}

fn parse_player_name(s: &str) -> Result<String, String> {
    if is_valid_name(s.as_bytes()) {
        Ok(s.to_string())
    } else {
        Err("player name must be at most 20 printable ASCII characters".into())
    }
}

/// Microseconds since the epoch; unique enough to outrank any session this
/// endpoint used before.
fn session_id() -> u64 {
    chrono::Utc::now().timestamp_micros() as u64
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::try_parse().unwrap_or_else(|err| {
        eprintln!("{err}");
        process::exit(1);
    });

    let config = ClientConfig {
        server_host: args.game_server,
        server_port: args.server_port.unwrap_or(DEFAULT_SERVER_PORT),
        gui_host: args.gui_server.unwrap_or_else(|| "localhost".into()),
        gui_port: args.gui_port.unwrap_or(DEFAULT_GUI_PORT),
        player_name: args.player_name.unwrap_or_default(),
        session_id: session_id(),
    };

    if let Err(err) = cl_run(config) {
        tracing::error!("{err:#}");
        process::exit(1);
    }
}
