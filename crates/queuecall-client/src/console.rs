//! Line-oriented operator console on stdin.
//!
//! Counter and broadcast commands go through the [`ControlPanel`]; local
//! commands (emergency toggle, ticket tracking) go straight into the
//! session's event queue.

use std::str::FromStr;

use queuecall_bus::BroadcastTransport;
use queuecall_core::{ClientEvent, ControlPanel, OperatorAction};
use queuecall_store::ClinicStore;
use queuecall_types::{ClinicId, ClinicTransfer, NameAlert, VideoCommand};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ClientError;

/// Help text printed for `help` and unknown commands.
pub const USAGE: &str = "\
commands:
  next <clinic>               call the next ticket
  prev <clinic>               step back one ticket
  repeat <clinic>             call the current ticket again
  call <clinic> <n>           call ticket n
  reset <clinic>              set the counter to zero
  toggle <clinic>             open or close the clinic
  message <clinic> <text>     show text on that clinic's displays
  name <name> [clinic]        call a patient by name
  transfer <n> <from> <to>    move ticket n to another clinic
  instant <n>                 play instant clip n everywhere
  voice <clip> [label]        play a recorded clip everywhere
  video <play|pause|next|prev|volume <0..1>>
  alarm [note]                raise an emergency on every display
  emergency [confirm]         toggle emergency mode on this client
  track <clinic> <ticket>     track a ticket on this client
  untrack                     stop tracking
  help";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `next <clinic>`
    Next(ClinicId),
    /// `prev <clinic>`
    Previous(ClinicId),
    /// `repeat <clinic>`
    Repeat(ClinicId),
    /// `call <clinic> <n>`
    Call(ClinicId, u32),
    /// `reset <clinic>`
    Reset(ClinicId),
    /// `toggle <clinic>`
    Toggle(ClinicId),
    /// `message <clinic> <text>`
    Message(ClinicId, String),
    /// `name <name> [clinic]`
    Name(String, Option<ClinicId>),
    /// `transfer <n> <from> <to>`
    Transfer(u32, ClinicId, ClinicId),
    /// `instant <n>`
    Instant(u32),
    /// `voice <clip> [label]`
    Voice(String, Option<String>),
    /// `video ...`
    Video(VideoCommand),
    /// `alarm [note]`
    Alarm(Option<String>),
    /// `emergency [confirm]`
    Emergency {
        /// Whether `confirm` was given.
        confirmed: bool,
    },
    /// `track <clinic> <ticket>`
    Track(ClinicId, u32),
    /// `untrack`
    Untrack,
    /// `help`
    Help,
}

/// Why a console line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line was blank.
    #[error("empty command")]
    Empty,
    /// The first word is not a command.
    #[error("unknown command `{0}`")]
    Unknown(String),
    /// A required argument is absent.
    #[error("missing argument: {0}")]
    Missing(&'static str),
    /// An argument did not parse.
    #[error("invalid {what}: `{value}`")]
    Invalid {
        /// Which argument.
        what: &'static str,
        /// What was given.
        value: String,
    },
}

fn arg<T: FromStr>(value: Option<&str>, what: &'static str) -> Result<T, ParseError> {
    let value = value.ok_or(ParseError::Missing(what))?;
    value.parse().ok().ok_or_else(|| ParseError::Invalid {
        what,
        value: value.to_owned(),
    })
}

fn rest(words: std::str::SplitWhitespace<'_>) -> Option<String> {
    let text = words.collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Empty);
        };
        let command = match verb {
            "next" => Self::Next(arg(words.next(), "clinic")?),
            "prev" | "previous" => Self::Previous(arg(words.next(), "clinic")?),
            "repeat" => Self::Repeat(arg(words.next(), "clinic")?),
            "call" => Self::Call(arg(words.next(), "clinic")?, arg(words.next(), "number")?),
            "reset" => Self::Reset(arg(words.next(), "clinic")?),
            "toggle" => Self::Toggle(arg(words.next(), "clinic")?),
            "message" => {
                let clinic = arg(words.next(), "clinic")?;
                Self::Message(clinic, rest(words).ok_or(ParseError::Missing("text"))?)
            }
            "name" => {
                let name: String = arg(words.next(), "name")?;
                let clinic = words.next().map(|w| arg(Some(w), "clinic")).transpose()?;
                Self::Name(name.replace('_', " "), clinic)
            }
            "transfer" => Self::Transfer(
                arg(words.next(), "ticket")?,
                arg(words.next(), "from clinic")?,
                arg(words.next(), "to clinic")?,
            ),
            "instant" => Self::Instant(arg(words.next(), "clip")?),
            "voice" => {
                let clip = arg(words.next(), "clip")?;
                Self::Voice(clip, rest(words))
            }
            "video" => Self::Video(parse_video(&mut words)?),
            "alarm" => Self::Alarm(rest(words)),
            "emergency" => Self::Emergency {
                confirmed: words.next() == Some("confirm"),
            },
            "track" => Self::Track(arg(words.next(), "clinic")?, arg(words.next(), "ticket")?),
            "untrack" => Self::Untrack,
            "help" => Self::Help,
            other => return Err(ParseError::Unknown(other.to_owned())),
        };
        Ok(command)
    }
}

fn parse_video(words: &mut std::str::SplitWhitespace<'_>) -> Result<VideoCommand, ParseError> {
    match words.next() {
        Some("play") => Ok(VideoCommand::Play),
        Some("pause") => Ok(VideoCommand::Pause),
        Some("next") => Ok(VideoCommand::Next),
        Some("prev") => Ok(VideoCommand::Prev),
        Some("volume") => Ok(VideoCommand::Volume(arg(words.next(), "volume")?)),
        Some(other) => Err(ParseError::Invalid {
            what: "video command",
            value: other.to_owned(),
        }),
        None => Err(ParseError::Missing("video command")),
    }
}

/// Carry out one command.
pub async fn execute<S: ClinicStore, T: BroadcastTransport>(
    command: ConsoleCommand,
    panel: &ControlPanel<S, T>,
    store: &S,
    events: &mpsc::Sender<ClientEvent>,
) -> Result<(), ClientError> {
    match command {
        ConsoleCommand::Next(id) => report(&panel.next(id).await?),
        ConsoleCommand::Previous(id) => report(&panel.previous(id).await?),
        ConsoleCommand::Repeat(id) => report(&panel.repeat(id).await?),
        ConsoleCommand::Call(id, n) => report(&panel.call_number(id, n).await?),
        ConsoleCommand::Reset(id) => report(&panel.reset(id).await?),
        ConsoleCommand::Toggle(id) => report(&panel.toggle_active(id).await?),
        ConsoleCommand::Message(id, text) => panel.send_message(id, text).await?,
        ConsoleCommand::Name(name, clinic) => {
            let target = match clinic {
                Some(id) => Some(store.fetch(id).await?),
                None => None,
            };
            panel
                .announce_name(NameAlert {
                    name,
                    clinic_label: target
                        .as_ref()
                        .map_or_else(String::new, |c| c.display_name.clone()),
                    clinic_id: target.as_ref().map(|c| c.clinic_id),
                    clinic_number: target.as_ref().map(|c| c.clinic_number),
                })
                .await?;
        }
        ConsoleCommand::Transfer(ticket_number, from_clinic, to_clinic) => {
            let destination = store.fetch(to_clinic).await?;
            panel
                .transfer(ClinicTransfer {
                    ticket_number,
                    from_clinic,
                    to_clinic,
                    to_clinic_number: destination.clinic_number,
                })
                .await?;
        }
        ConsoleCommand::Instant(n) => panel.play_instant(n).await?,
        ConsoleCommand::Voice(clip, label) => panel.voice_broadcast(clip, label).await?,
        ConsoleCommand::Video(command) => panel.video_control(command).await?,
        ConsoleCommand::Alarm(note) => panel.raise_emergency(None, note).await?,
        ConsoleCommand::Emergency { confirmed } => {
            local(events, OperatorAction::ToggleEmergency { confirmed }).await;
        }
        ConsoleCommand::Track(clinic_id, ticket_number) => {
            local(
                events,
                OperatorAction::StartTracking {
                    clinic_id,
                    ticket_number,
                },
            )
            .await;
        }
        ConsoleCommand::Untrack => local(events, OperatorAction::StopTracking).await,
        ConsoleCommand::Help => println!("{USAGE}"),
    }
    Ok(())
}

fn report(state: &queuecall_types::ClinicState) {
    info!(
        clinic = %state.display_name,
        number = state.current_number,
        active = state.is_active,
        "clinic updated"
    );
}

async fn local(events: &mpsc::Sender<ClientEvent>, action: OperatorAction) {
    if events.send(ClientEvent::Operator(action)).await.is_err() {
        warn!("session stopped, action dropped");
    }
}

/// Read commands from stdin until EOF. Failures are logged and the loop
/// continues.
pub async fn run<S: ClinicStore, T: BroadcastTransport>(
    panel: &ControlPanel<S, T>,
    store: &S,
    events: &mpsc::Sender<ClientEvent>,
) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.parse::<ConsoleCommand>() {
            Ok(command) => {
                if let Err(e) = execute(command, panel, store, events).await {
                    warn!(error = %e, "command failed");
                }
            }
            Err(ParseError::Empty) => {}
            Err(e) => {
                warn!(error = %e, "rejected command");
                println!("{USAGE}");
            }
        }
    }
    info!("console input closed");
    Ok(())
}
