use crate::domain::track::Track;

/// The thing that actually decodes and plays audio.
///
/// The player only tells it what to play; the host reports back through
/// [`crate::playback::player::Player::on_finished`] when a track ends.
pub trait MediaElement {
    /// Loads a new source and starts playing it.
    fn load(&mut self, track: &Track);

    fn play(&mut self);

    fn pause(&mut self);
}

/// Media element for a terminal session: announces what would be playing.
#[derive(Debug, Default)]
pub struct ConsoleMedia {
    current: Option<String>,
}

impl MediaElement for ConsoleMedia {
    fn load(&mut self, track: &Track) {
        println!("Now playing {track}");
        self.current = Some(track.url().to_string());
    }

    fn play(&mut self) {
        if let Some(url) = &self.current {
            println!("Resumed {url}");
        }
    }

    fn pause(&mut self) {
        if let Some(url) = &self.current {
            println!("Paused {url}");
        }
    }
}

/// Remembers every call, for asserting on what the player asked for.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMedia {
    pub loaded: Vec<String>,
    pub playing: bool,
}

#[cfg(test)]
impl MediaElement for RecordingMedia {
    fn load(&mut self, track: &Track) {
        self.loaded.push(track.url().to_string());
        self.playing = true;
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }
}
