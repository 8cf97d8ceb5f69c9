use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::{
    config::Config,
    library,
    playback::{
        history::PlayLog,
        media::{ConsoleMedia, MediaElement},
        metadata::{MetadataFetcher, MetadataResolver, TagResolver},
        player::Player,
        queue::Queue,
    },
    storage::{self, SharedStore, db::i64_millis_to_local_time},
};

#[derive(Parser)]
#[command(name = "debris")]
#[command(version = "0.1")]
#[command(about = "Queue-driven music player with a persistent play log")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "debris.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add tracks (URLs, files or whole directories) to the queue
    Enqueue {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// List queued tracks, oldest first
    Queue,
    /// Show what was played and when
    Log {
        /// Only show the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Drop every queued track
    ClearQueue,
    /// Forget the play history
    ClearLog,
    /// Interactive playback session reading commands from stdin
    Session,
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    let store = storage::open(&cfg.storage)?;

    match cli.command {
        Commands::Enqueue { targets } => {
            let mut queue = open_queue(&cfg, &store)?;
            let resolver = TagResolver;
            let mut added = 0;

            for target in &targets {
                for mut track in library::resolve_target(target, cfg.library.follow_symlinks)? {
                    match resolver.resolve(track.url()) {
                        Ok(metadata) => track.resolve(metadata),
                        Err(e) => log::debug!("{e}"),
                    }
                    println!("    + {track}");
                    queue.enqueue(track)?;
                    added += 1;
                }
            }
            queue.flush()?;
            println!("Queued {added} tracks, {} pending", queue.len());
        }

        Commands::Queue => {
            let queue = open_queue(&cfg, &store)?;
            if queue.is_empty() {
                println!("The queue is empty");
            }
            for (i, (_, track)) in queue.iter().enumerate() {
                println!("{:>4}. {track}", i + 1);
            }
        }

        Commands::Log { limit } => {
            let log = open_log(&cfg, &store)?;
            let skip = limit.map_or(0, |limit| log.len().saturating_sub(limit));
            for (key, track) in log.entries().skip(skip) {
                let played_at = i64_millis_to_local_time(key.at_ms)?;
                println!("{}  {track}", played_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        Commands::ClearQueue => {
            let mut queue = open_queue(&cfg, &store)?;
            let dropped = queue.len();
            queue.clear()?;
            queue.flush()?;
            println!("Dropped {dropped} queued tracks");
        }

        Commands::ClearLog => {
            let mut log = open_log(&cfg, &store)?;
            log.clear()?;
            log.flush()?;
            println!("Play log cleared");
        }

        Commands::Session => {
            let player = Player::new(
                ConsoleMedia::default(),
                open_queue(&cfg, &store)?,
                open_log(&cfg, &store)?,
            )
            .with_metadata(MetadataFetcher::new(Arc::new(TagResolver)));

            let stdin = io::stdin();
            session(player, stdin.lock(), &cfg)?;
        }
    }

    Ok(())
}

fn open_queue(cfg: &Config, store: &SharedStore) -> anyhow::Result<Queue> {
    Queue::open(&cfg.keys.queue, store.clone(), cfg.storage.write_mode)
        .with_context(|| "Failed to open the queue")
}

fn open_log(cfg: &Config, store: &SharedStore) -> anyhow::Result<PlayLog> {
    PlayLog::open(
        &cfg.keys.log,
        store.clone(),
        cfg.storage.write_mode,
        cfg.history.max_entries,
    )
    .with_context(|| "Failed to open the play log")
}

const SESSION_HELP: &str = "commands: next, prev, skip N, back N, finished, stop, pause, resume, \
add TARGET, status, queue, help, quit";

/// Runs commands from `input` until it ends or `quit` is read.
///
/// The session owns the player, and shuts it down on the way out.
pub fn session<M: MediaElement>(
    mut player: Player<M>,
    input: impl BufRead,
    cfg: &Config,
) -> anyhow::Result<()> {
    println!("{SESSION_HELP}");
    prompt();

    for line in input.lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let arg = words.collect::<Vec<_>>().join(" ");

        let outcome = match command {
            "" => Ok(()),
            "next" | "n" => player.next().map(|_| ()),
            "prev" | "p" => player.previous().map(|_| ()),
            "skip" | "back" => match step_delta(command, &arg) {
                Some(delta) => player.advance(delta).map(|_| ()),
                None => {
                    println!("{command} needs a number");
                    Ok(())
                }
            },
            "finished" | "f" => player.on_finished().map(|_| ()),
            "stop" => {
                player.stop();
                println!("Will stop after this track");
                Ok(())
            }
            "pause" => {
                player.pause();
                Ok(())
            }
            "resume" => {
                player.resume();
                Ok(())
            }
            "add" => match library::resolve_target(&arg, cfg.library.follow_symlinks) {
                Ok(tracks) => tracks.into_iter().try_for_each(|track| {
                    println!("    + {track}");
                    player.enqueue(track).map(|_| ())
                }),
                Err(e) => {
                    println!("cannot add '{arg}': {e:#}");
                    Ok(())
                }
            },
            "status" => {
                print_status(&player);
                Ok(())
            }
            "queue" => {
                for (i, (_, track)) in player.queue().iter().enumerate() {
                    println!("{:>4}. {track}", i + 1);
                }
                Ok(())
            }
            "help" | "?" => {
                println!("{SESSION_HELP}");
                Ok(())
            }
            "quit" | "q" => break,
            other => {
                println!("unknown command '{other}', try 'help'");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => println!("{e}"),
            Err(e) => return Err(e.into()),
        }

        player.apply_resolved_metadata()?;
        prompt();
    }

    player.shutdown()?;
    Ok(())
}

/// `skip N` moves forward, `back N` moves backward. `None` when `N` is not
/// a number or its negation does not fit.
fn step_delta(command: &str, arg: &str) -> Option<isize> {
    let n = arg.parse::<isize>().ok()?;
    if command == "back" { n.checked_neg() } else { Some(n) }
}

fn print_status<M: MediaElement>(player: &Player<M>) {
    match (player.position(), player.current()) {
        (Some(position), Some(track)) => println!(
            "{:?}: {track} ({} of {})",
            player.state(),
            position + 1,
            player.playlist().len()
        ),
        _ => println!("{:?}: nothing played yet", player.state()),
    }
    println!("{} queued, {} in the play log", player.queue().len(), player.log().len());
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
