//! Interactive shell
//!
//! Line-oriented front end over a [`PlayerHandle`]. Each input line is parsed
//! into a [`ShellCommand`] and executed against the player, the catalog and
//! the system signal bus.

use crate::error::{CliError, Result};
use lyre_core::{CatalogSource, Track};
use lyre_playback::{PlaybackSnapshot, PlayerHandle, RepeatMode, SignalBus, SystemSignal};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

/// Longest wait for the coordinator to apply a published signal
const SIGNAL_ACK_TIMEOUT: Duration = Duration::from_secs(2);

pub const HELP: &str = "\
Commands:
  load                 queue the whole catalog
  add <id>...          append catalog tracks to the queue
  play [index]         play the current or given queue entry
  pause | resume | toggle | stop
  next | prev
  seek <seconds>
  shuffle
  repeat [off|all|one] cycle or set the repeat mode
  remove <index>
  move <from> <to>
  clear                empty the queue
  queue                show the queue
  status               show the playback state
  search <query>
  focus-lost | focus-regained [resume]
  background | foreground
  clear-error
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Load,
    Add(Vec<String>),
    Play(Option<usize>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Next,
    Previous,
    Seek(f64),
    Shuffle,
    Repeat(Option<RepeatMode>),
    Remove(usize),
    Move(usize, usize),
    Clear,
    Queue,
    Status,
    Search(String),
    Signal(SystemSignal),
    ClearError,
    Help,
    Quit,
}

/// Whether the shell keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ShellCommand>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("load", []) => ShellCommand::Load,
        ("add", ids) if !ids.is_empty() => {
            ShellCommand::Add(ids.iter().map(|id| (*id).to_string()).collect())
        }
        ("play", []) => ShellCommand::Play(None),
        ("play", [index]) => ShellCommand::Play(Some(number(index)?)),
        ("pause", []) => ShellCommand::Pause,
        ("resume", []) => ShellCommand::Resume,
        ("toggle", []) => ShellCommand::Toggle,
        ("stop", []) => ShellCommand::Stop,
        ("next", []) => ShellCommand::Next,
        ("prev" | "previous", []) => ShellCommand::Previous,
        ("seek", [seconds]) => ShellCommand::Seek(
            seconds
                .parse()
                .map_err(|_| CliError::Command(format!("'{seconds}' is not a number of seconds")))?,
        ),
        ("shuffle", []) => ShellCommand::Shuffle,
        ("repeat", []) => ShellCommand::Repeat(None),
        ("repeat", [mode]) => ShellCommand::Repeat(Some(repeat_mode(mode)?)),
        ("remove", [index]) => ShellCommand::Remove(number(index)?),
        ("move", [from, to]) => ShellCommand::Move(number(from)?, number(to)?),
        ("clear", []) => ShellCommand::Clear,
        ("queue", []) => ShellCommand::Queue,
        ("status", []) => ShellCommand::Status,
        ("search", query) if !query.is_empty() => ShellCommand::Search(query.join(" ")),
        ("focus-lost", []) => ShellCommand::Signal(SystemSignal::AudioFocusLost),
        ("focus-regained", []) => ShellCommand::Signal(SystemSignal::AudioFocusRegained {
            should_resume: false,
        }),
        ("focus-regained", ["resume"]) => {
            ShellCommand::Signal(SystemSignal::AudioFocusRegained {
                should_resume: true,
            })
        }
        ("background", []) => ShellCommand::Signal(SystemSignal::DidEnterBackground),
        ("foreground", []) => ShellCommand::Signal(SystemSignal::WillEnterForeground),
        ("clear-error", []) => ShellCommand::ClearError,
        ("help" | "?", []) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        _ => {
            return Err(CliError::Command(format!(
                "unrecognised '{}' (type 'help')",
                line.trim()
            )))
        }
    };

    Ok(Some(command))
}

fn number(word: &str) -> Result<usize> {
    word.parse()
        .map_err(|_| CliError::Command(format!("'{word}' is not an index")))
}

fn repeat_mode(word: &str) -> Result<RepeatMode> {
    match word {
        "off" => Ok(RepeatMode::Off),
        "all" => Ok(RepeatMode::All),
        "one" => Ok(RepeatMode::One),
        other => Err(CliError::Command(format!("unknown repeat mode '{other}'"))),
    }
}

/// Shell state: the player plus the services commands reach into
pub struct Shell<C> {
    player: PlayerHandle,
    catalog: C,
    bus: SignalBus,
    signal_acks: Option<watch::Receiver<u64>>,
}

impl<C: CatalogSource> Shell<C> {
    pub fn new(player: PlayerHandle, catalog: C, bus: SignalBus) -> Self {
        Self {
            player,
            catalog,
            bus,
            signal_acks: None,
        }
    }

    /// Wait on this handled-signal counter after publishing a signal
    ///
    /// Without it the next command may run before the signal reaches the
    /// player.
    #[must_use]
    pub fn with_signal_acks(mut self, acks: watch::Receiver<u64>) -> Self {
        self.signal_acks = Some(acks);
        self
    }

    /// Read commands from `input` until it ends or `quit`
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        write!(out, "> ")?;
        out.flush()?;

        while let Some(line) = lines.next_line().await? {
            let flow = match parse(&line) {
                Ok(Some(command)) => match self.execute(command, out).await {
                    Ok(flow) => flow,
                    Err(err) => {
                        writeln!(out, "error: {err}")?;
                        Flow::Continue
                    }
                },
                Ok(None) => Flow::Continue,
                Err(err) => {
                    writeln!(out, "{err}")?;
                    Flow::Continue
                }
            };

            if flow == Flow::Quit {
                break;
            }
            write!(out, "> ")?;
            out.flush()?;
        }

        Ok(())
    }

    /// Execute a single command, writing its output to `out`
    pub async fn execute<W: Write>(&self, command: ShellCommand, out: &mut W) -> Result<Flow> {
        tracing::debug!(?command, "Executing shell command");

        match command {
            ShellCommand::Load => {
                let tracks = self.catalog.fetch().await?;
                let count = tracks.len();
                self.player.set_queue(tracks, 0).await?;
                writeln!(out, "queued {count} tracks")?;
            }
            ShellCommand::Add(ids) => {
                for id in ids {
                    let track = self.catalog.details(&id).await?;
                    writeln!(out, "added {}", describe(&track))?;
                    self.player.add_track(track).await?;
                }
            }
            ShellCommand::Play(index) => {
                match index {
                    Some(index) => {
                        self.player.play_at(index).await?;
                    }
                    None => self.player.play().await?,
                }
                self.write_status(out)?;
            }
            ShellCommand::Pause => {
                self.player.pause().await?;
                self.write_status(out)?;
            }
            ShellCommand::Resume => {
                self.player.resume().await?;
                self.write_status(out)?;
            }
            ShellCommand::Toggle => {
                self.player.toggle_play_pause().await?;
                self.write_status(out)?;
            }
            ShellCommand::Stop => {
                self.player.stop().await?;
                self.write_status(out)?;
            }
            ShellCommand::Next => {
                if self.player.next().await?.is_none() {
                    writeln!(out, "end of queue")?;
                }
                self.write_status(out)?;
            }
            ShellCommand::Previous => {
                if self.player.previous().await?.is_none() {
                    writeln!(out, "start of queue")?;
                }
                self.write_status(out)?;
            }
            ShellCommand::Seek(seconds) => {
                let position = self.player.seek(seconds).await?;
                writeln!(out, "at {}", clock(position))?;
            }
            ShellCommand::Shuffle => {
                let enabled = self.player.toggle_shuffle().await?;
                writeln!(out, "shuffle {}", if enabled { "on" } else { "off" })?;
            }
            ShellCommand::Repeat(mode) => {
                let mode = match mode {
                    Some(mode) => {
                        self.player.set_repeat_mode(mode).await?;
                        mode
                    }
                    None => self.player.toggle_repeat_mode().await?,
                };
                writeln!(out, "repeat {mode:?}")?;
            }
            ShellCommand::Remove(index) => match self.player.remove_at(index).await? {
                Some(track) => writeln!(out, "removed {}", describe(&track))?,
                None => writeln!(out, "no track at {index}")?,
            },
            ShellCommand::Move(from, to) => {
                if !self.player.move_track(from, to).await? {
                    writeln!(out, "cannot move {from} to {to}")?;
                }
            }
            ShellCommand::Clear => {
                self.player.clear_queue().await?;
                writeln!(out, "queue cleared")?;
            }
            ShellCommand::Queue => self.write_queue(out).await?,
            ShellCommand::Status => self.write_status(out)?,
            ShellCommand::Search(query) => {
                let found = self.catalog.search(&query).await?;
                if found.is_empty() {
                    writeln!(out, "no matches")?;
                }
                for track in found {
                    writeln!(out, "{:<12} {}", track.id(), describe(&track))?;
                }
            }
            ShellCommand::Signal(signal) => {
                self.signal(signal).await;
                writeln!(out, "signalled {signal:?}")?;
            }
            ShellCommand::ClearError => {
                self.player.clear_error().await?;
                self.write_status(out)?;
            }
            ShellCommand::Help => writeln!(out, "{HELP}")?,
            ShellCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    async fn signal(&self, signal: SystemSignal) {
        let Some(acks) = &self.signal_acks else {
            self.bus.publish(signal);
            return;
        };

        let mut acks = acks.clone();
        let target = *acks.borrow_and_update() + 1;
        if self.bus.publish(signal) == 0 {
            return;
        }

        match tokio::time::timeout(SIGNAL_ACK_TIMEOUT, acks.wait_for(|count| *count >= target))
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => tracing::debug!(?signal, "Coordinator stopped before handling signal"),
            Err(_) => tracing::warn!(?signal, "Timed out waiting for signal to be handled"),
        };
    }

    async fn write_queue<W: Write>(&self, out: &mut W) -> Result<()> {
        let view = self.player.queue_view().await?;
        if view.tracks.is_empty() {
            writeln!(out, "queue is empty")?;
            return Ok(());
        }

        for (index, track) in view.tracks.iter().enumerate() {
            let marker = if view.current_index == Some(index) { '>' } else { ' ' };
            writeln!(out, "{marker} {index:>3}  {}", describe(track))?;
        }
        writeln!(
            out,
            "shuffle {}, repeat {:?}",
            if view.shuffle_enabled { "on" } else { "off" },
            view.repeat_mode
        )?;
        Ok(())
    }

    fn write_status<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", status_line(&self.player.snapshot()))?;
        Ok(())
    }
}

/// One-line rendering of a snapshot
pub fn status_line(snapshot: &PlaybackSnapshot) -> String {
    let mut line = format!("[{:?}]", snapshot.state);
    if let Some(track) = &snapshot.current_track {
        line.push(' ');
        line.push_str(&describe(track));
        line.push_str(&format!(
            " {}/{}",
            clock(snapshot.progress.current_time),
            clock(snapshot.progress.duration)
        ));
    }
    if let Some(message) = &snapshot.error_message {
        line.push_str(&format!(" ({message})"));
    }
    line
}

fn describe(track: &Track) -> String {
    if track.artist().is_empty() {
        track.title().to_string()
    } else {
        format!("{} - {}", track.artist(), track.title())
    }
}

fn clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
