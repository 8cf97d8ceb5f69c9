//! Play list navigation on top of the queue and the play log
//!
//! The play list is the in-memory history of this session. It only grows:
//! moving past its end pulls the oldest track from the [`Queue`], moving
//! back replays what is already there. Every track that starts playing is
//! recorded in the [`PlayLog`].

use log::{info, warn};

use crate::{
    domain::track::Track,
    playback::{
        error::PlaybackError,
        history::PlayLog,
        key::EntryKey,
        media::MediaElement,
        metadata::MetadataFetcher,
        queue::Queue,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// nothing played yet
    Idle,
    Playing,
    Paused,
    /// the last track ended and nothing followed it
    Stopped,
}

pub struct Player<M: MediaElement> {
    media: M,
    playlist: Vec<Track>,
    position: Option<usize>,
    state: PlayerState,
    queue: Queue,
    log: PlayLog,
    stop_after_current: bool,
    fetcher: Option<MetadataFetcher>,
}

impl<M: MediaElement> Player<M> {
    pub fn new(media: M, queue: Queue, log: PlayLog) -> Self {
        Self {
            media,
            playlist: Vec::new(),
            position: None,
            state: PlayerState::Idle,
            queue,
            log,
            stop_after_current: false,
            fetcher: None,
        }
    }

    /// Resolves tags for queued tracks in the background, including those
    /// left unresolved by an earlier session.
    pub fn with_metadata(mut self, fetcher: MetadataFetcher) -> Self {
        for (_, track) in self.queue.iter().filter(|(_, t)| !t.is_resolved()) {
            fetcher.request(track.url());
        }
        self.fetcher = Some(fetcher);
        self
    }

    /// `None` until the first track starts
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn current(&self) -> Option<&Track> {
        self.position.map(|i| &self.playlist[i])
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn log(&self) -> &PlayLog {
        &self.log
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn enqueue(&mut self, track: Track) -> Result<EntryKey, PlaybackError> {
        let url = (!track.is_resolved()).then(|| track.url().to_string());
        let key = self.queue.enqueue(track)?;
        if let (Some(url), Some(fetcher)) = (url, &self.fetcher) {
            fetcher.request(&url);
        }
        Ok(key)
    }

    pub fn next(&mut self) -> Result<&Track, PlaybackError> {
        self.advance(1)
    }

    pub fn previous(&mut self) -> Result<&Track, PlaybackError> {
        self.advance(-1)
    }

    /// Moves `delta` tracks through the play list and starts that track.
    ///
    /// Moving past the end takes tracks from the queue. A forward jump that
    /// needs more tracks than are queued fails as a whole; tracks jumped over
    /// join the play list without being played or logged. On `EmptyQueue` or
    /// `BoundaryReached` nothing changes. If the play log cannot be written
    /// the move still happened and the storage error is returned.
    pub fn advance(&mut self, delta: isize) -> Result<&Track, PlaybackError> {
        let index = self.step(delta)?;
        Ok(&self.playlist[index])
    }

    /// Asks for playback to stop once the current track finishes.
    pub fn stop(&mut self) {
        info!("will stop after the current track");
        self.stop_after_current = true;
    }

    /// Called by the host when the media element finished a track.
    ///
    /// Plays the next track unless [`Player::stop`] was called since the last
    /// finished track; that request is used up here.
    pub fn on_finished(&mut self) -> Result<Option<&Track>, PlaybackError> {
        if std::mem::take(&mut self.stop_after_current) {
            info!("stopped as requested");
            self.finish();
            return Ok(None);
        }

        match self.step(1) {
            Ok(index) => Ok(Some(&self.playlist[index])),
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlayerState::Playing {
            return false;
        }
        self.media.pause();
        self.state = PlayerState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlayerState::Paused {
            return false;
        }
        self.media.play();
        self.state = PlayerState::Playing;
        true
    }

    /// Applies tags resolved in the background to the play list and the
    /// queue. Returns the number of tracks that got metadata.
    pub fn apply_resolved_metadata(&mut self) -> Result<usize, PlaybackError> {
        let Some(fetcher) = &self.fetcher else {
            return Ok(0);
        };

        let mut patched = 0;
        for resolved in fetcher.drain() {
            match resolved.result {
                Ok(metadata) => {
                    for track in self.playlist.iter_mut().filter(|t| t.url() == resolved.url) {
                        track.resolve(metadata.clone());
                        patched += 1;
                    }
                    patched += self.queue.update_metadata(&resolved.url, &metadata)?;
                }
                Err(e) => warn!("no metadata for {}: {e}", resolved.url),
            }
        }
        Ok(patched)
    }

    /// Pauses playback and writes out anything not yet persisted.
    pub fn shutdown(mut self) -> Result<(), PlaybackError> {
        self.media.pause();
        self.queue.flush()?;
        self.log.flush()?;
        info!(
            "session ended, {} tracks played, {} still queued",
            self.playlist.len(),
            self.queue.len()
        );
        Ok(())
    }

    /// `advance` returning the new position, with non-fatal outcomes reported.
    fn step(&mut self, delta: isize) -> Result<usize, PlaybackError> {
        let result = self.try_step(delta);
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!("failed to move by {delta}: {e}");
            } else {
                info!("{e}");
            }
        }
        result
    }

    fn try_step(&mut self, delta: isize) -> Result<usize, PlaybackError> {
        let current = self.position.map_or(-1, |p| p as isize);
        if delta == 0 && self.position.is_none() {
            return Err(PlaybackError::BoundaryReached);
        }

        let target = match current.checked_add(delta) {
            Some(target) if target >= 0 => target as usize,
            Some(_) => return Err(PlaybackError::BoundaryReached),
            None if delta < 0 => return Err(PlaybackError::BoundaryReached),
            None => return Err(PlaybackError::EmptyQueue),
        };

        let missing = (target + 1).saturating_sub(self.playlist.len());
        if missing > self.queue.len() {
            return Err(PlaybackError::EmptyQueue);
        }

        let taken = self.queue.dequeue_many(missing)?;
        self.playlist.extend(taken);

        self.play_index(target)?;
        Ok(target)
    }

    fn play_index(&mut self, index: usize) -> Result<(), PlaybackError> {
        let track = &self.playlist[index];
        self.position = Some(index);
        self.state = PlayerState::Playing;
        self.media.load(track);
        info!("now playing {track}");
        self.log.add(track.clone())?;
        Ok(())
    }

    fn finish(&mut self) {
        if self.position.is_some() {
            self.state = PlayerState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{
        domain::track::TrackMetadata,
        playback::{
            media::RecordingMedia,
            metadata::{MetadataError, MetadataResolver},
        },
        storage::{
            SharedStore,
            container::WriteMode,
            memory::{FailingStore, MemoryStore},
            shared,
        },
    };

    fn track(url: &str) -> Track {
        Track::from_url(url).unwrap()
    }

    fn player_on(store: SharedStore, mode: WriteMode) -> Player<RecordingMedia> {
        let queue = Queue::open("queue", store.clone(), mode).unwrap();
        let log = PlayLog::open("log", store, mode, 0).unwrap();
        Player::new(RecordingMedia::default(), queue, log)
    }

    fn player_with(urls: &[&str]) -> Player<RecordingMedia> {
        let mut player = player_on(shared(MemoryStore::default()), WriteMode::Through);
        for url in urls {
            player.enqueue(track(url)).unwrap();
        }
        player
    }

    fn logged(player: &Player<RecordingMedia>) -> Vec<String> {
        player
            .log()
            .entries()
            .map(|(_, t)| t.url().to_string())
            .collect()
    }

    fn playlist(player: &Player<RecordingMedia>) -> Vec<&str> {
        player.playlist().iter().map(Track::url).collect()
    }

    #[test]
    fn test_first_advance_pulls_from_queue() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3"]);
        assert_eq!(player.state(), PlayerState::Idle);

        let current = player.advance(1)?;
        assert_eq!(current.url(), "a.mp3");

        assert_eq!(playlist(&player), vec!["a.mp3"]);
        assert_eq!(player.position(), Some(0));
        assert!(player.queue().is_empty());
        assert_eq!(logged(&player), vec!["a.mp3"]);
        assert_eq!(player.media().loaded, vec!["a.mp3"]);
        assert_eq!(player.state(), PlayerState::Playing);
        Ok(())
    }

    #[test]
    fn test_advance_at_end_with_empty_queue_changes_nothing() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3"]);
        player.next()?;

        let err = player.next().unwrap_err();
        assert!(matches!(err, PlaybackError::EmptyQueue));
        assert!(!err.is_fatal());

        assert_eq!(player.position(), Some(0));
        assert_eq!(playlist(&player), vec!["a.mp3"]);
        assert_eq!(logged(&player), vec!["a.mp3"]);
        assert_eq!(player.media().loaded, vec!["a.mp3"]);
        Ok(())
    }

    #[test]
    fn test_advance_from_idle_with_empty_queue() {
        let mut player = player_with(&[]);
        assert!(matches!(player.next(), Err(PlaybackError::EmptyQueue)));
        assert_eq!(player.position(), None);
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn test_previous_at_start_is_boundary() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3"]);
        player.next()?;

        assert!(matches!(
            player.previous(),
            Err(PlaybackError::BoundaryReached)
        ));
        assert_eq!(player.position(), Some(0));
        assert_eq!(logged(&player), vec!["a.mp3"]);
        assert_eq!(player.queue().len(), 1);
        Ok(())
    }

    #[test]
    fn test_back_and_forth_replays_history() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3", "c.mp3"]);
        player.next()?;
        player.next()?;
        assert_eq!(player.previous()?.url(), "a.mp3");

        // moving forward again stays inside the play list
        assert_eq!(player.next()?.url(), "b.mp3");
        assert_eq!(player.queue().len(), 1);

        assert_eq!(player.next()?.url(), "c.mp3");
        assert_eq!(playlist(&player), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(
            logged(&player),
            vec!["a.mp3", "b.mp3", "a.mp3", "b.mp3", "c.mp3"]
        );
        Ok(())
    }

    #[test]
    fn test_multi_step_forward_needs_enough_queued() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3"]);

        assert!(matches!(player.advance(3), Err(PlaybackError::EmptyQueue)));
        assert_eq!(player.position(), None);
        assert_eq!(player.queue().len(), 2);
        assert!(player.playlist().is_empty());
        Ok(())
    }

    #[test]
    fn test_multi_step_forward_skips_without_logging() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
        player.next()?;

        assert_eq!(player.advance(2)?.url(), "c.mp3");

        assert_eq!(player.position(), Some(2));
        assert_eq!(playlist(&player), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(logged(&player), vec!["a.mp3", "c.mp3"]);
        assert_eq!(player.media().loaded, vec!["a.mp3", "c.mp3"]);
        assert_eq!(player.queue().peek().map(Track::url), Some("d.mp3"));
        Ok(())
    }

    #[test]
    fn test_multi_step_backward() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3", "c.mp3"]);
        player.advance(3)?;

        assert!(matches!(
            player.advance(-3),
            Err(PlaybackError::BoundaryReached)
        ));
        assert_eq!(player.position(), Some(2));

        assert_eq!(player.advance(-2)?.url(), "a.mp3");
        Ok(())
    }

    #[test]
    fn test_zero_step_restarts_current() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3"]);
        assert!(matches!(
            player.advance(0),
            Err(PlaybackError::BoundaryReached)
        ));

        player.next()?;
        assert_eq!(player.advance(0)?.url(), "a.mp3");
        assert_eq!(logged(&player), vec!["a.mp3", "a.mp3"]);
        Ok(())
    }

    #[test]
    fn test_stop_skips_one_auto_advance() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3"]);
        player.next()?;

        player.stop();
        assert_eq!(player.on_finished()?, None);
        assert_eq!(player.position(), Some(0));
        assert_eq!(player.state(), PlayerState::Stopped);

        let next = player.on_finished()?.map(|t| t.url().to_string());
        assert_eq!(next.as_deref(), Some("b.mp3"));
        assert_eq!(player.position(), Some(1));
        assert_eq!(player.state(), PlayerState::Playing);
        Ok(())
    }

    #[test]
    fn test_finished_with_empty_queue_stops() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3"]);
        player.next()?;

        assert!(matches!(
            player.on_finished(),
            Err(PlaybackError::EmptyQueue)
        ));
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.position(), Some(0));
        Ok(())
    }

    #[test]
    fn test_pause_and_resume() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3"]);
        assert!(!player.pause());

        player.next()?;
        assert!(player.pause());
        assert!(!player.media().playing);
        assert_eq!(player.state(), PlayerState::Paused);

        assert!(player.resume());
        assert!(player.media().playing);
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(!player.resume());
        Ok(())
    }

    #[test]
    fn test_log_write_failure_is_reported() -> anyhow::Result<()> {
        let failing = FailingStore::default();
        let switch = failing.switch();
        let mut player = player_on(shared(failing), WriteMode::Through);
        player.enqueue(track("a.mp3"))?;
        player.enqueue(track("b.mp3"))?;
        player.next()?;

        switch.fail_writes(true);
        let err = player.next().unwrap_err();
        assert!(err.is_fatal());

        // the dequeue was rolled back, nothing was lost
        assert_eq!(player.queue().len(), 1);
        assert_eq!(player.position(), Some(0));
        Ok(())
    }

    #[test]
    fn test_failed_multi_step_loses_no_queued_track() -> anyhow::Result<()> {
        let failing = FailingStore::default();
        let switch = failing.switch();
        let store = shared(failing);
        let mut player = player_on(store.clone(), WriteMode::Through);
        for url in ["a.mp3", "b.mp3", "c.mp3"] {
            player.enqueue(track(url))?;
        }

        switch.fail_key("queue");
        let err = player.advance(3).unwrap_err();
        assert!(err.is_fatal());

        assert_eq!(player.position(), None);
        assert!(player.playlist().is_empty());
        assert_eq!(player.queue().len(), 3);
        assert!(player.log().is_empty());
        assert!(player.media().loaded.is_empty());

        let reopened = Queue::open("queue", store, WriteMode::Through)?;
        assert_eq!(reopened.len(), 3);
        Ok(())
    }

    #[test]
    fn test_log_failure_after_multi_step_keeps_the_move() -> anyhow::Result<()> {
        let failing = FailingStore::default();
        let switch = failing.switch();
        let store = shared(failing);
        let mut player = player_on(store.clone(), WriteMode::Through);
        for url in ["a.mp3", "b.mp3", "c.mp3"] {
            player.enqueue(track(url))?;
        }

        // the queue write goes through, the play log write after it fails
        switch.fail_after(1);
        let err = player.advance(3).unwrap_err();
        assert!(err.is_fatal());

        assert_eq!(player.position(), Some(2));
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(playlist(&player), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(player.media().loaded, vec!["c.mp3"]);
        assert!(player.log().is_empty());

        let reopened = Queue::open("queue", store, WriteMode::Through)?;
        assert!(reopened.is_empty());
        Ok(())
    }

    #[test]
    fn test_log_key_failure_is_reported_after_move() -> anyhow::Result<()> {
        let failing = FailingStore::default();
        let switch = failing.switch();
        let mut player = player_on(shared(failing), WriteMode::Through);
        player.enqueue(track("a.mp3"))?;

        switch.fail_key("log");
        assert!(player.next().unwrap_err().is_fatal());

        assert_eq!(player.position(), Some(0));
        assert!(player.queue().is_empty());
        assert!(player.log().is_empty());
        assert_eq!(player.media().loaded, vec!["a.mp3"]);
        Ok(())
    }

    #[test]
    fn test_extreme_deltas_do_not_overflow() -> anyhow::Result<()> {
        let mut player = player_with(&["a.mp3", "b.mp3"]);
        assert!(matches!(
            player.advance(isize::MIN),
            Err(PlaybackError::BoundaryReached)
        ));
        assert!(matches!(
            player.advance(isize::MAX),
            Err(PlaybackError::EmptyQueue)
        ));

        player.advance(2)?;
        assert_eq!(player.position(), Some(1));
        assert!(matches!(
            player.advance(isize::MAX),
            Err(PlaybackError::EmptyQueue)
        ));
        assert!(matches!(
            player.advance(isize::MIN),
            Err(PlaybackError::BoundaryReached)
        ));
        assert_eq!(player.position(), Some(1));
        assert_eq!(logged(&player), vec!["b.mp3"]);
        Ok(())
    }

    #[test]
    fn test_shutdown_flushes_deferred_writes() -> anyhow::Result<()> {
        let store = shared(MemoryStore::default());
        let mut player = player_on(store.clone(), WriteMode::Deferred);
        player.enqueue(track("a.mp3"))?;
        player.enqueue(track("b.mp3"))?;
        player.next()?;
        player.shutdown()?;

        let reopened = player_on(store, WriteMode::Through);
        assert_eq!(reopened.queue().len(), 1);
        assert_eq!(reopened.log().len(), 1);
        Ok(())
    }

    struct TitleFromUrl;

    impl MetadataResolver for TitleFromUrl {
        fn resolve(&self, url: &str) -> Result<TrackMetadata, MetadataError> {
            if url.starts_with("http") {
                return Err(MetadataError::Unsupported(url.to_string()));
            }
            Ok(TrackMetadata {
                title: Some(format!("title of {url}")),
                ..Default::default()
            })
        }
    }

    fn apply_until(player: &mut Player<RecordingMedia>, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut patched = 0;
        while patched < expected && Instant::now() < deadline {
            patched += player.apply_resolved_metadata().unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        patched
    }

    #[test]
    fn test_resolved_metadata_reaches_playlist_and_queue() -> anyhow::Result<()> {
        let mut player = player_with(&[])
            .with_metadata(MetadataFetcher::new(Arc::new(TitleFromUrl)));

        player.enqueue(track("a.mp3"))?;
        player.enqueue(track("b.mp3"))?;
        player.enqueue(track("http://example.com/c.mp3"))?;
        player.next()?;

        assert_eq!(apply_until(&mut player, 2), 2);

        assert_eq!(
            player.current().and_then(|t| t.metadata().title.clone()),
            Some("title of a.mp3".to_string())
        );
        assert!(player.queue().peek().is_some_and(Track::is_resolved));

        // the failed remote lookup leaves the track untouched
        let remote = player.queue().iter().last().map(|(_, t)| t.clone());
        assert!(remote.is_some_and(|t| !t.is_resolved()));
        Ok(())
    }

    #[test]
    fn test_unresolved_queue_from_earlier_session_is_resolved() -> anyhow::Result<()> {
        let store = shared(MemoryStore::default());
        {
            let mut queue = Queue::open("queue", store.clone(), WriteMode::Through)?;
            queue.enqueue(track("old.mp3"))?;
        }

        let mut player = player_on(store, WriteMode::Through)
            .with_metadata(MetadataFetcher::new(Arc::new(TitleFromUrl)));

        assert_eq!(apply_until(&mut player, 1), 1);
        assert!(player.queue().peek().is_some_and(Track::is_resolved));
        Ok(())
    }
}
