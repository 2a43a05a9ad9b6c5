use clap::{Args, Subcommand};
use std::path::PathBuf;

use rpccomm_communicator::{CommunicatorConfig, Endpoint};

use crate::exit::{transport_error, CliResult};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one peer and echo its messages back.
    Serve(ServeArgs),
    /// Connect, send a single message and optionally print the reply.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to listen on (`host:port`, `tcp://host:port`, `unix:///path`).
    pub endpoint: String,
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Opcode for echoed replies. Default: the received opcode.
    #[arg(long, value_name = "OPCODE")]
    pub reply_opcode: Option<u32>,
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES", env = "RPCCOMM_MAX_PAYLOAD")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to (`host:port`, `tcp://host:port`, `unix:///path`).
    pub endpoint: String,
    /// Opcode carried in the message header.
    #[arg(long, short = 'o')]
    pub opcode: u32,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES", env = "RPCCOMM_MAX_PAYLOAD")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", &err))
}

fn communicator_config(max_payload: Option<usize>) -> CommunicatorConfig {
    match max_payload {
        Some(max) => CommunicatorConfig::default().with_max_payload_size(max),
        None => CommunicatorConfig::default(),
    }
}

fn peer_label(peer: Option<&Endpoint>) -> String {
    peer.map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn bad_endpoint_is_usage_error() {
        let err = parse_endpoint("definitely not an endpoint").unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn max_payload_overrides_default() {
        assert_eq!(communicator_config(Some(64)).max_payload_size, 64);
        assert_eq!(
            communicator_config(None),
            CommunicatorConfig::default()
        );
    }
}
