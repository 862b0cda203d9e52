// main.rs -- screen-worms-server entry point

use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use worms_common::protocol::{
    DEFAULT_HEIGHT, DEFAULT_SERVER_PORT, DEFAULT_WIDTH, MAX_HEIGHT, MAX_WIDTH, MIN_HEIGHT,
    MIN_WIDTH,
};
use worms_server::server::{
    ServerConfig, DEFAULT_RPS, DEFAULT_TURNING_SPEED, MAX_RPS, MAX_TURNING_SPEED, MIN_RPS,
    MIN_TURNING_SPEED,
};
use worms_server::sv_main::sv_run;

/// `-h` is the board height here, so clap's automatic help must stay off.
#[derive(Parser, Debug)]
#[command(name = "screen-worms-server", disable_help_flag = true, disable_version_flag = true)]
struct Args {
    #[arg(short = 'p', value_name = "port")]
    port: Option<u16>,

    #[arg(short = 's', value_name = "seed")]
    seed: Option<u32>,

    #[arg(
        short = 't',
        value_name = "turning_speed",
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_TURNING_SPEED)..=i64::from(MAX_TURNING_SPEED))
    )]
    turning_speed: Option<u32>,

    #[arg(
        short = 'v',
        value_name = "rounds_per_sec",
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_RPS)..=i64::from(MAX_RPS))
    )]
    rounds_per_sec: Option<u32>,

    #[arg(
        short = 'w',
        value_name = "width",
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_WIDTH)..=i64::from(MAX_WIDTH))
    )]
    width: Option<u32>,

    #[arg(
        short = 'h',
        value_name = "height",
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_HEIGHT)..=i64::from(MAX_HEIGHT))
    )]
    height: Option<u32>,
}

fn default_seed() -> u32 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs() & 0xFFFF_FFFF) as u32
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::try_parse().unwrap_or_else(|err| {
        eprintln!("{err}");
        process::exit(1);
    });

    let config = ServerConfig {
        seed: args.seed.unwrap_or_else(default_seed),
        turning_speed: args.turning_speed.unwrap_or(DEFAULT_TURNING_SPEED),
        rps: args.rounds_per_sec.unwrap_or(DEFAULT_RPS),
        port: args.port.unwrap_or(DEFAULT_SERVER_PORT),
        width: args.width.unwrap_or(DEFAULT_WIDTH),
        height: args.height.unwrap_or(DEFAULT_HEIGHT),
    };

    if let Err(err) = sv_run(config) {
        tracing::error!("{err:#}");
        process::exit(1);
    }
}
