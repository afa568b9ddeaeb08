//! Backend de audio en memoria para los tests de sesión.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};

use crate::audio::backend::{AudioBackend, ConnectionHandle, PlayerStatus};
use crate::audio::track::Track;
use crate::error::BackendError;

pub fn track(name: &str) -> Track {
    Track::new(name, name).with_uri(format!("https://example.com/{name}"))
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub connects: usize,
    pub disconnects: usize,
    pub stops: usize,
    pub submitted: Vec<String>,
    pub pause_calls: Vec<bool>,
    pub status: PlayerStatus,
    pub failing_submits: usize,
    pub refuse_connect: bool,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn submitted(&self) -> Vec<String> {
        self.with(|s| s.submitted.clone())
    }

    pub fn disconnects(&self) -> usize {
        self.with(|s| s.disconnects)
    }

    pub fn fail_next_submits(&self, count: usize) {
        self.with(|s| s.failing_submits = count);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, BackendError> {
        self.with(|s| {
            if s.refuse_connect {
                return Err(BackendError::Connection("missing permissions".into()));
            }
            s.connects += 1;
            Ok(ConnectionHandle { guild_id, channel_id })
        })
    }

    async fn submit(&self, _handle: &ConnectionHandle, track: &Track) -> Result<(), BackendError> {
        self.with(|s| {
            if s.failing_submits > 0 {
                s.failing_submits -= 1;
                return Err(BackendError::Submit(format!("cannot play {}", track.title())));
            }
            s.submitted.push(track.title().to_string());
            s.status = PlayerStatus { playing: true, paused: false };
            Ok(())
        })
    }

    async fn stop(&self, _handle: &ConnectionHandle) -> Result<(), BackendError> {
        self.with(|s| {
            s.stops += 1;
            s.status = PlayerStatus::default();
        });
        Ok(())
    }

    async fn set_paused(&self, _handle: &ConnectionHandle, paused: bool) -> Result<(), BackendError> {
        self.with(|s| {
            s.pause_calls.push(paused);
            s.status = PlayerStatus { playing: !paused, paused };
        });
        Ok(())
    }

    async fn disconnect(&self, _handle: &ConnectionHandle) -> Result<(), BackendError> {
        self.with(|s| {
            s.disconnects += 1;
            s.status = PlayerStatus::default();
        });
        Ok(())
    }

    async fn status(&self, _guild_id: GuildId) -> Result<PlayerStatus, BackendError> {
        Ok(self.with(|s| s.status))
    }
}
