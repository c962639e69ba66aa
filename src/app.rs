//! Command-line front end: joins a call through the relay and drives it
//! from stdin.

use crate::client::{CallHandle, Client};
use crate::config::CallConfig;
use crate::error::ConfigError;
use crate::event::CallEvent;
use crate::peer::media::{MediaConstraints, SyntheticSource};
use crate::peer::types::MediaSlot;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const USAGE: &str =
    "Usage: callsig [--config FILE] [--relay URL] [--username NAME] [--audio DEVICE] [--video DEVICE]";

/// Builds the effective configuration: file first, then flags on top.
pub fn parse_args(args: &[String]) -> Result<CallConfig, ConfigError> {
    let mut config = CallConfig::default();
    let mut overrides = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args
            .get(i + 1)
            .cloned()
            .ok_or_else(|| ConfigError::Argument(format!("{flag} needs a value")))?;
        match flag {
            "--config" => config = CallConfig::load(&value)?,
            "--relay" | "--username" | "--audio" | "--video" => overrides.push((flag, value)),
            other => return Err(ConfigError::Argument(format!("unknown flag {other}"))),
        }
        i += 2;
    }

    for (flag, value) in overrides {
        match flag {
            "--relay" => config.relay_url = value,
            "--username" => config.username = Some(value),
            "--audio" => config.audio_device = Some(value),
            _ => config.video_device = Some(value),
        }
    }
    Ok(config)
}

/// A line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Mute(MediaSlot),
    Source(MediaSlot, Option<String>),
    HangUp,
    Quit,
}

pub fn parse_command(line: &str) -> Option<UserCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next(), words.next()) {
        ("mute", Some(slot), None) => UserCommand::Mute(MediaSlot::parse(slot)?),
        ("source", Some(slot), device) => {
            UserCommand::Source(MediaSlot::parse(slot)?, device.map(str::to_owned))
        }
        ("hangup", None, None) => UserCommand::HangUp,
        ("quit", None, None) | ("exit", None, None) => UserCommand::Quit,
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(command)
}

fn print_event(event: &CallEvent) {
    match event {
        CallEvent::State(state) => println!("state: {state}"),
        CallEvent::RemoteTrack(track) => {
            println!("remote {} track {} (stream {})", track.kind, track.track_id, track.stream_id)
        }
        CallEvent::Muted { slot, muted } => {
            println!("{slot} {}", if *muted { "muted" } else { "unmuted" })
        }
        CallEvent::Negotiated { fingerprint } => match fingerprint {
            Some(fp) => println!("negotiated, verify fingerprint {fp}"),
            None => println!("negotiated"),
        },
        CallEvent::Connection(state) => println!("connection: {state:?}"),
        CallEvent::Error(err) => println!("error ({}): {err}", err.kind()),
        CallEvent::Ended { reason } => println!("call ended: {reason}"),
    }
}

fn apply(call: &CallHandle, command: UserCommand) -> bool {
    let sent = match command {
        UserCommand::Mute(slot) => call.toggle_mute(slot),
        UserCommand::Source(slot, device) => call.change_source(slot, device),
        UserCommand::HangUp => call.hang_up(),
        UserCommand::Quit => return false,
    };
    if let Err(e) = sent {
        println!("{e}");
    }
    true
}

async fn session(config: CallConfig) -> Result<(), Box<dyn std::error::Error>> {
    let username = config
        .username
        .clone()
        .ok_or_else(|| ConfigError::Argument("--username is required".into()))?;
    let constraints = MediaConstraints {
        audio_device: config.audio_device.clone(),
        video_device: config.video_device.clone(),
    };

    let (client, mut events) = Client::connect(config, Arc::new(SyntheticSource::default())).await?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    client.bind_username(&username).await;
    let call = client.start_call(constraints).await?;
    info!("Call {} started as {}", call.session_id(), username);

    let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(command) => {
                if !apply(&call, command) {
                    break;
                }
            }
            None => println!("commands: mute audio|video, source audio|video DEVICE, hangup, quit"),
        }
    }

    client.shutdown().await;
    drop(client);
    let _ = tokio::time::timeout(Duration::from_secs(2), printer).await;
    Ok(())
}

/// Process entry point for the `callsig` binary
pub fn main_with_args(args: Vec<String>) -> i32 {
    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return 2;
        }
    };
    crate::logger::init(&config.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("cannot start runtime: {e}");
            return 1;
        }
    };
    match runtime.block_on(session(config)) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            1
        }
    }
}
