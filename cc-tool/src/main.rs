//! cclink - drive a CC1101 serial bridge from the command line
//!
//! ```text
//! cclink [--settings PATH] [--simulate] <COMMAND>
//!
//! Commands:
//!   show            print the register words for the configured link
//!   init            send INIT to the bridge
//!   status          send INIT, then query and print the radio status
//!   send <TEXT>     send INIT, then transmit TEXT as a packet of blocks
//!   save-settings   write the current settings to the settings path
//! ```
//!
//! Log verbosity follows `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use cc_link::{ByteStream, LinkError, LinkSettings, Sleeper, Transport};
use cc_protocol::command::MAX_BLOCK_DATA;
use cc_protocol::{ParmsReport, ProtocolError, TxBlock};
use cc_sim::VirtualBridge;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "usage: cclink [--settings PATH] [--simulate] <show|init|status|send TEXT|save-settings>";

/// Wait allowed past the time on air of a block
const BLOCK_SLACK: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
enum ToolError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show,
    Init,
    Status,
    Send(String),
    SaveSettings,
}

#[derive(Debug)]
struct Args {
    settings_path: Option<PathBuf>,
    simulate: bool,
    command: Command,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ToolError> {
        let mut settings_path = None;
        let mut simulate = false;
        let mut command = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--settings" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ToolError::Usage("--settings needs a path".into()))?;
                    settings_path = Some(PathBuf::from(path));
                }
                "--simulate" => simulate = true,
                "show" => command = Some(Command::Show),
                "init" => command = Some(Command::Init),
                "status" => command = Some(Command::Status),
                "save-settings" => command = Some(Command::SaveSettings),
                "send" => {
                    let text = args
                        .next()
                        .ok_or_else(|| ToolError::Usage("send needs the text to transmit".into()))?;
                    command = Some(Command::Send(text));
                }
                other => return Err(ToolError::Usage(format!("unknown argument '{}'", other))),
            }
        }

        let command = command.ok_or_else(|| ToolError::Usage(USAGE.into()))?;

        Ok(Self {
            settings_path,
            simulate,
            command,
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cclink=info,cc_protocol=info,cc_link=info,cc_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ToolError> {
    let args = Args::parse(std::env::args().skip(1))?;

    let path = args
        .settings_path
        .clone()
        .or_else(LinkSettings::default_path)
        .ok_or_else(|| ToolError::Usage("could not determine settings path".into()))?;
    let settings = LinkSettings::load(&path)?;

    match args.command {
        Command::Show => {
            let encoder = settings.encoder()?;
            let parms = encoder.encode(&settings.radio);
            println!("{}", ParmsReport::new(&parms, &encoder));
            Ok(())
        }
        Command::SaveSettings => {
            settings.save(&path)?;
            Ok(())
        }
        _ if args.simulate => {
            info!("Using simulated bridge");
            let mut link = Transport::with_config(
                VirtualBridge::new(),
                settings.encoder()?,
                settings.transport_config()?,
            );
            session(&mut link, &settings, &args.command)
        }
        _ => {
            info!("Using bridge on {}", settings.device);
            let mut link = Transport::with_config(
                settings.open_port()?,
                settings.encoder()?,
                settings.transport_config()?,
            );
            session(&mut link, &settings, &args.command)
        }
    }
}

/// INIT the radio, then run the requested command
fn session<S: ByteStream, Z: Sleeper>(
    link: &mut Transport<S, Z>,
    settings: &LinkSettings,
    command: &Command,
) -> Result<(), ToolError> {
    link.send_init(&settings.radio)?;
    if let Some(parms) = link.parms() {
        println!("{}", ParmsReport::new(parms, link.encoder()));
    }

    match command {
        Command::Status => {
            let status = link.query_status()?;
            println!("{}", status);
        }
        Command::Send(text) => send_packet(link, text.as_bytes())?,
        _ => {}
    }

    let stats = link.stats();
    info!(
        "{} init, {} status, {} blocks, {} failed",
        stats.inits, stats.status_queries, stats.blocks_sent, stats.failures
    );

    Ok(())
}

/// Split `packet` into blocks and send them with a countdown
fn send_packet<S: ByteStream, Z: Sleeper>(
    link: &mut Transport<S, Z>,
    packet: &[u8],
) -> Result<(), ToolError> {
    let chunks: Vec<&[u8]> = packet.chunks(MAX_BLOCK_DATA).collect();
    let byte_time_us = link
        .parms()
        .map(|parms| link.encoder().byte_time_us(parms))
        .unwrap_or(0.0);

    for (i, chunk) in chunks.iter().enumerate() {
        let countdown = u8::try_from(chunks.len() - 1 - i).unwrap_or(u8::MAX);
        let block = TxBlock::new(countdown, chunk.to_vec())?;

        let air_time = Duration::from_micros((byte_time_us * (chunk.len() + 2) as f64) as u64);
        link.send_block(&block, air_time + BLOCK_SLACK)?;
    }

    info!("Sent {} bytes in {} blocks", packet.len(), chunks.len());
    Ok(())
}
