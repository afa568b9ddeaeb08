use std::{collections::VecDeque, sync::Arc, time::Duration};

use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{idle::IdleTimer, SessionEvent};
use crate::audio::backend::{AudioBackend, BackendEvent, ConnectionHandle};
use crate::audio::track::{LoopMode, Track};
use crate::error::SessionError;

/// Copia de solo lectura de una sesión, para mostrarla.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub loop_mode: LoopMode,
    pub paused: bool,
    pub connected: bool,
}

/// Estado de reproducción de un guild.
///
/// Quien llama mantiene el mutex del guild durante toda la operación, así
/// que los pops de la cola y los cambios de `current` nunca se intercalan.
pub struct Session {
    guild_id: GuildId,
    backend: Arc<dyn AudioBackend>,
    queue: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    paused: bool,
    connection: Option<ConnectionHandle>,
    idle: IdleTimer,
    /// Se activa con el primer humano y se limpia cuando el canal se vacía.
    occupied: bool,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        backend: Arc<dyn AudioBackend>,
        idle_delay: Option<Duration>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            guild_id,
            backend,
            queue: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Off,
            paused: false,
            connection: None,
            idle: IdleTimer::new(idle_delay, events),
            occupied: false,
        }
    }

    // Getters
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }
    pub fn is_paused(&self) -> bool {
        self.paused
    }
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }
    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle
    }

    pub(crate) fn set_occupied(&mut self, occupied: bool) {
        self.occupied = occupied;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            loop_mode: self.loop_mode,
            paused: self.paused,
            connected: self.is_connected(),
        }
    }

    /// Devuelve la conexión existente o entra en `channel_id`.
    pub async fn connect(&mut self, channel_id: ChannelId) -> Result<ConnectionHandle, SessionError> {
        if let Some(handle) = self.connection {
            return Ok(handle);
        }

        let handle = self.backend.connect(self.guild_id, channel_id).await?;
        info!("🔊 Guild {} conectado al canal de voz {}", self.guild_id, channel_id);
        self.connection = Some(handle);

        // Conexión nueva sin nada que reproducir: ya está inactiva.
        if self.current.is_none() && self.queue.is_empty() {
            self.idle.arm();
        }
        Ok(handle)
    }

    /// Añade `track` y arranca la reproducción si no suena nada.
    ///
    /// Devuelve la posición en la cola (desde 1).
    pub async fn enqueue(&mut self, track: Track) -> Result<usize, SessionError> {
        if self.connection.is_none() {
            return Err(SessionError::NotConnected);
        }

        debug!("➕ Guild {}: en cola '{}'", self.guild_id, track.title());
        self.idle.disarm();
        self.queue.push_back(track);
        let position = self.queue.len();

        if self.current.is_none() {
            self.advance().await?;
        }
        Ok(position)
    }

    /// Añade todas las pistas en orden. Devuelve el largo de la cola.
    pub async fn enqueue_many(&mut self, tracks: Vec<Track>) -> Result<usize, SessionError> {
        if self.connection.is_none() {
            return Err(SessionError::NotConnected);
        }
        if tracks.is_empty() {
            return Ok(self.queue.len());
        }

        self.idle.disarm();
        self.queue.extend(tracks);
        let len = self.queue.len();

        if self.current.is_none() {
            self.advance().await?;
        }
        Ok(len)
    }

    /// Pasa a la siguiente pista según el modo de bucle.
    ///
    /// Un envío fallido cuenta como fin de esa pista y se reintenta una vez.
    /// Si el reintento también falla la sesión queda inactiva y se devuelve el
    /// error.
    pub async fn advance(&mut self) -> Result<(), SessionError> {
        let first = match self.advance_once().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("⚠️ Guild {}: falló el envío ({}), reintentando una vez", self.guild_id, first);

        match self.advance_once().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("❌ Guild {}: reproducción detenida: {}", self.guild_id, e);
                self.current = None;
                self.paused = false;
                if self.is_connected() {
                    self.idle.arm();
                }
                Err(e)
            }
        }
    }

    async fn advance_once(&mut self) -> Result<(), SessionError> {
        if self.loop_mode == LoopMode::Song {
            if let Some(track) = self.current.clone() {
                self.idle.disarm();
                self.paused = false;
                return self.submit(&track).await;
            }
        }

        if self.loop_mode == LoopMode::Queue {
            if let Some(track) = self.current.take() {
                self.queue.push_back(track);
            }
        }

        let Some(next) = self.queue.pop_front() else {
            self.current = None;
            self.paused = false;
            if !self.idle.is_armed() {
                self.idle.arm();
            }
            debug!("🔇 Guild {}: cola agotada", self.guild_id);
            return Ok(());
        };

        self.idle.disarm();
        self.paused = false;
        self.current = Some(next.clone());
        self.submit(&next).await
    }

    async fn submit(&self, track: &Track) -> Result<(), SessionError> {
        let handle = self.connection.ok_or(SessionError::NotConnected)?;
        self.backend.submit(&handle, track).await?;
        info!("🎵 Guild {}: reproduciendo '{}'", self.guild_id, track.title());
        Ok(())
    }

    /// Pide al backend que pare la pista actual. La cola avanza con la señal
    /// de fin del backend.
    pub async fn skip(&mut self) -> Result<bool, SessionError> {
        if self.current.is_none() {
            return Ok(false);
        }
        let handle = self.connection.ok_or(SessionError::NotConnected)?;
        self.backend.stop(&handle).await?;
        Ok(true)
    }

    /// Devuelve `false` si no hay nada sonando.
    pub async fn pause(&mut self) -> Result<bool, SessionError> {
        if self.current.is_none() || self.paused {
            return Ok(false);
        }
        let handle = self.connection.ok_or(SessionError::NotConnected)?;
        self.backend.set_paused(&handle, true).await?;
        self.paused = true;
        Ok(true)
    }

    /// Devuelve `false` si no hay nada en pausa.
    pub async fn resume(&mut self) -> Result<bool, SessionError> {
        if self.current.is_none() || !self.paused {
            return Ok(false);
        }
        let handle = self.connection.ok_or(SessionError::NotConnected)?;
        self.backend.set_paused(&handle, false).await?;
        self.paused = false;
        Ok(true)
    }

    /// Vacía la cola y la pista actual y queda inactiva.
    ///
    /// El estado se limpia aunque falle la llamada al backend.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.queue.clear();
        self.current = None;
        self.paused = false;

        let Some(handle) = self.connection else {
            return Ok(());
        };
        self.idle.arm();
        self.backend.stop(&handle).await?;
        info!("⏹️ Guild {}: detenido", self.guild_id);
        Ok(())
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        debug!("🔁 Guild {}: modo de bucle {}", self.guild_id, mode);
        self.loop_mode = mode;
    }

    /// Sale del canal de voz. Devuelve `false` si ya estaba desconectado.
    pub async fn disconnect(&mut self) -> Result<bool, SessionError> {
        self.idle.disarm();
        self.queue.clear();
        self.current = None;
        self.paused = false;

        let Some(handle) = self.connection.take() else {
            return Ok(false);
        };
        self.backend.disconnect(&handle).await?;
        info!("👋 Guild {}: salió del canal de voz {}", self.guild_id, handle.channel_id);
        Ok(true)
    }

    /// Aplica una señal encolada. Los fallos se registran, no se devuelven.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Backend(BackendEvent::TrackEnded { encoded, reason, .. }) => {
                if !reason.advances_queue() {
                    debug!("Guild {}: ignorando fin {:?}", self.guild_id, reason);
                    return;
                }
                self.on_track_finished(&encoded).await;
            }
            SessionEvent::Backend(BackendEvent::TrackErrored { encoded, reason, .. }) => {
                warn!("⚠️ Guild {}: error en la pista: {}", self.guild_id, reason);
                self.on_track_finished(&encoded).await;
            }
            SessionEvent::Backend(BackendEvent::TrackStuck { encoded, threshold_ms, .. }) => {
                warn!("⚠️ Guild {}: pista atascada {}ms", self.guild_id, threshold_ms);
                self.on_track_finished(&encoded).await;
            }
            SessionEvent::Backend(BackendEvent::NodeDisconnected) => {
                if self.current.take().is_some() {
                    warn!("⚠️ Guild {}: nodo de audio perdido, se descarta la pista actual", self.guild_id);
                }
                self.paused = false;
                if self.is_connected() && !self.idle.is_armed() {
                    self.idle.arm();
                }
            }
            SessionEvent::IdleTimeout { generation } => self.on_idle_timeout(generation).await,
        }
    }

    /// Las señales de cualquier pista que no sea la actual están obsoletas.
    async fn on_track_finished(&mut self, encoded: &str) {
        match &self.current {
            Some(current) if current.encoded() == encoded => {}
            _ => {
                debug!("Guild {}: descartando señal obsoleta", self.guild_id);
                return;
            }
        }

        self.paused = false;
        if let Err(e) = self.advance().await {
            error!("❌ Guild {}: no se pudo avanzar la cola: {}", self.guild_id, e);
        }
    }

    async fn on_idle_timeout(&mut self, generation: u64) {
        if !self.idle.take_fired(generation) {
            debug!("Guild {}: generación {} del temporizador reemplazada", self.guild_id, generation);
            return;
        }
        if !self.queue.is_empty() {
            if self.current.is_some() {
                return;
            }
            // Pistas en cola sin nada sonando: quedaron varadas por un nodo perdido.
            match self.advance().await {
                Ok(()) => {
                    info!("▶️ Guild {}: cola varada reanudada", self.guild_id);
                    return;
                }
                Err(e) => {
                    warn!("Guild {}: la cola varada no se puede reproducir ({}), saliendo", self.guild_id, e);
                    if let Err(e) = self.disconnect().await {
                        warn!("Guild {}: falló la desconexión por inactividad: {}", self.guild_id, e);
                    }
                    return;
                }
            }
        }

        let idle = match self.backend.status(self.guild_id).await {
            Ok(status) => status.is_idle(),
            Err(e) => {
                warn!("Guild {}: falló la consulta de estado ({}), usando el estado local", self.guild_id, e);
                self.current.is_none()
            }
        };
        if !idle {
            debug!("Guild {}: el backend sigue ocupado, se mantiene conectado", self.guild_id);
            return;
        }

        info!("💤 Guild {}: tiempo de inactividad alcanzado", self.guild_id);
        if let Err(e) = self.disconnect().await {
            warn!("Guild {}: falló la desconexión por inactividad: {}", self.guild_id, e);
        }
    }
}
