use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    resolver::TrackResolver,
    track::{LoopMode, Track},
};
use crate::{
    error::SessionError,
    session::{FirstArrivalTrigger, SessionManager, SessionSnapshot},
    storage::PlaylistStore,
};

/// Resultado de un `play`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    NotFound,
    Queued { track: Track, position: usize },
}

/// Resultado de encolar una playlist guardada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistOutcome {
    pub succeeded: usize,
    pub total: usize,
    pub queue_len: usize,
}

/// Punto de entrada de los comandos a las sesiones de reproducción.
///
/// Las búsquedas se hacen antes de tomar el lock del guild; toda mutación de
/// la sesión se hace con él tomado.
pub struct MusicPlayer {
    sessions: Arc<SessionManager>,
    resolver: TrackResolver,
    playlists: Arc<PlaylistStore>,
    autoplay_playlist: Option<String>,
}

impl MusicPlayer {
    pub fn new(
        sessions: Arc<SessionManager>,
        resolver: TrackResolver,
        playlists: Arc<PlaylistStore>,
        autoplay_playlist: Option<String>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            playlists,
            autoplay_playlist,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn playlists(&self) -> &Arc<PlaylistStore> {
        &self.playlists
    }

    /// Entra en `channel_id` si hace falta, resuelve `query` y encola el resultado.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        query: &str,
    ) -> Result<PlayOutcome, SessionError> {
        let session = self.sessions.session(guild_id);
        session.lock().await.connect(channel_id).await?;

        let Some(track) = self.resolver.resolve(query).await else {
            return Ok(PlayOutcome::NotFound);
        };

        let position = session.lock().await.enqueue(track.clone()).await?;
        Ok(PlayOutcome::Queued { track, position })
    }

    /// Resuelve cada entrada de la playlist `name` y encola los aciertos en orden.
    ///
    /// Devuelve `None` si la playlist no existe.
    pub async fn play_playlist(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        name: &str,
    ) -> Result<Option<PlaylistOutcome>, SessionError> {
        let Some(queries) = self.playlists.get(name).await else {
            return Ok(None);
        };

        let session = self.sessions.session(guild_id);
        session.lock().await.connect(channel_id).await?;

        let mut tracks = Vec::with_capacity(queries.len());
        for query in &queries {
            match self.resolver.resolve(query).await {
                Some(track) => tracks.push(track),
                None => warn!("Playlist '{}': sin resultados para '{}'", name, query),
            }
        }

        let succeeded = tracks.len();
        let queue_len = session.lock().await.enqueue_many(tracks).await?;
        info!(
            "📜 Guild {}: playlist '{}' encolada {}/{}",
            guild_id,
            name,
            succeeded,
            queries.len()
        );

        Ok(Some(PlaylistOutcome {
            succeeded,
            total: queries.len(),
            queue_len,
        }))
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<bool, SessionError> {
        let Some(session) = self.sessions.get(guild_id) else {
            return Ok(false);
        };
        let mut session = session.lock().await;
        session.skip().await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<bool, SessionError> {
        let Some(session) = self.sessions.get(guild_id) else {
            return Ok(false);
        };
        let mut session = session.lock().await;
        session.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<bool, SessionError> {
        let Some(session) = self.sessions.get(guild_id) else {
            return Ok(false);
        };
        let mut session = session.lock().await;
        session.resume().await
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<(), SessionError> {
        let Some(session) = self.sessions.get(guild_id) else {
            return Ok(());
        };
        let mut session = session.lock().await;
        session.stop().await
    }

    /// Devuelve `false` si el bot no estaba conectado.
    pub async fn leave(&self, guild_id: GuildId) -> Result<bool, SessionError> {
        let Some(session) = self.sessions.get(guild_id) else {
            return Ok(false);
        };
        let mut session = session.lock().await;
        session.disconnect().await
    }

    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) {
        let session = self.sessions.session(guild_id);
        session.lock().await.set_loop_mode(mode);
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> SessionSnapshot {
        match self.sessions.get(guild_id) {
            Some(session) => session.lock().await.snapshot(),
            None => SessionSnapshot::default(),
        }
    }
}

#[async_trait]
impl FirstArrivalTrigger for MusicPlayer {
    async fn on_first_arrival(&self, guild_id: GuildId, channel_id: ChannelId) {
        let Some(name) = &self.autoplay_playlist else {
            return;
        };

        match self.play_playlist(guild_id, channel_id, name).await {
            Ok(Some(outcome)) => info!(
                "▶️ Guild {}: autoplay '{}' encoló {}/{}",
                guild_id, name, outcome.succeeded, outcome.total
            ),
            Ok(None) => warn!("La playlist de autoplay '{}' no existe", name),
            Err(e) => warn!("Guild {}: falló el autoplay '{}': {}", guild_id, name, e),
        }
    }
}
