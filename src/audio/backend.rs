//! Interfaces entre el núcleo de reproducción y el backend de audio externo.
//!
//! La máquina de estados de la sesión solo habla con estos traits, así el
//! nodo Lavalink se puede cambiar por un fake en memoria en los tests.

use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::{ChannelId, GuildId};

use super::track::Track;
use crate::error::BackendError;

/// Token de la conexión de voz de un guild en el backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Lo que el backend informa del reproductor de un guild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub playing: bool,
    pub paused: bool,
}

impl PlayerStatus {
    pub fn is_idle(&self) -> bool {
        !self.playing && !self.paused
    }
}

/// Resultado de búsqueda normalizado. El resolver lo reduce a una pista.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Tracks(Vec<Track>),
    Playlist { name: String, tracks: Vec<Track> },
    Empty,
}

impl SearchResult {
    pub fn into_first(self) -> Option<Track> {
        match self {
            SearchResult::Tracks(tracks) | SearchResult::Playlist { tracks, .. } => {
                tracks.into_iter().next()
            }
            SearchResult::Empty => None,
        }
    }
}

/// Por qué el backend detuvo una pista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl EndReason {
    /// `replaced` llega para la pista vieja cuando se envía otra encima; el
    /// envío ya avanzó la cola.
    pub fn advances_queue(&self) -> bool {
        !matches!(self, EndReason::Replaced)
    }
}

/// Señales de ciclo de vida emitidas por el backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    TrackEnded {
        guild_id: GuildId,
        encoded: String,
        reason: EndReason,
    },
    TrackErrored {
        guild_id: GuildId,
        encoded: String,
        reason: String,
    },
    TrackStuck {
        guild_id: GuildId,
        encoded: String,
        threshold_ms: u64,
    },
    NodeDisconnected,
}

impl BackendEvent {
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            BackendEvent::TrackEnded { guild_id, .. }
            | BackendEvent::TrackErrored { guild_id, .. }
            | BackendEvent::TrackStuck { guild_id, .. } => Some(*guild_id),
            BackendEvent::NodeDisconnected => None,
        }
    }
}

/// Protocolo de control del backend de audio.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Entra en `channel_id` y pasa las credenciales de voz al backend.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, BackendError>;

    /// Arranca `track`, reemplazando lo que sonaba.
    async fn submit(&self, handle: &ConnectionHandle, track: &Track) -> Result<(), BackendError>;

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), BackendError>;

    async fn set_paused(&self, handle: &ConnectionHandle, paused: bool) -> Result<(), BackendError>;

    async fn disconnect(&self, handle: &ConnectionHandle) -> Result<(), BackendError>;

    async fn status(&self, guild_id: GuildId) -> Result<PlayerStatus, BackendError>;
}

/// Capacidad de búsqueda externa.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search(&self, identifier: &str) -> Result<SearchResult, BackendError>;
}
