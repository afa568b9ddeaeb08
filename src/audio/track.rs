use std::{fmt, str::FromStr, time::Duration};

/// Elemento reproducible tal como se entrega al backend.
///
/// Lo produce el resolver y no se modifica después; las sesiones lo clonan
/// entre `queue` y `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    encoded: String,
    title: String,
    author: Option<String>,
    uri: Option<String>,
    duration_ms: Option<u64>,
}

impl Track {
    pub fn new(encoded: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
            title: title.into(),
            author: None,
            uri: None,
            duration_ms: None,
        }
    }

    // Getters
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    // Constructores
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Los elementos de duración cero (directos) no guardan duración.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = (duration_ms > 0).then_some(duration_ms);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Song,
    Queue,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Song => "song",
            LoopMode::Queue => "queue",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown loop mode `{0}`")]
pub struct ParseLoopModeError(pub String);

impl FromStr for LoopMode {
    type Err = ParseLoopModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "off" | "0" | "false" | "none" => Ok(LoopMode::Off),
            "song" | "track" => Ok(LoopMode::Song),
            "queue" => Ok(LoopMode::Queue),
            other => Err(ParseLoopModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_mode_aliases() {
        assert_eq!("OFF".parse::<LoopMode>(), Ok(LoopMode::Off));
        assert_eq!("none".parse::<LoopMode>(), Ok(LoopMode::Off));
        assert_eq!("0".parse::<LoopMode>(), Ok(LoopMode::Off));
        assert_eq!(" song ".parse::<LoopMode>(), Ok(LoopMode::Song));
        assert_eq!("queue".parse::<LoopMode>(), Ok(LoopMode::Queue));
        assert!("shuffle".parse::<LoopMode>().is_err());
    }

    #[test]
    fn live_streams_have_no_duration() {
        let track = Track::new("enc", "Radio").with_duration_ms(0);
        assert_eq!(track.duration_ms(), None);

        let track = Track::new("enc", "Song").with_duration_ms(61_000);
        assert_eq!(track.duration(), Some(Duration::from_secs(61)));
    }
}
