use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{state::Session, SessionEvent};
use crate::audio::backend::{AudioBackend, BackendEvent};

struct GuildSlot {
    session: Arc<Mutex<Session>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    worker: JoinHandle<()>,
}

impl Drop for GuildSlot {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Registro de sesiones por guild.
///
/// Cada guild tiene una tarea que vacía su cola de eventos, así que las
/// señales del backend y los disparos de inactividad se aplican de uno en uno
/// y en orden.
pub struct SessionManager {
    backend: Arc<dyn AudioBackend>,
    idle_delay: Option<Duration>,
    sessions: DashMap<GuildId, GuildSlot>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AudioBackend>, idle_delay: Option<Duration>) -> Self {
        Self {
            backend,
            idle_delay,
            sessions: DashMap::new(),
        }
    }

    /// Devuelve la sesión del guild, creándola en el primer uso.
    pub fn session(&self, guild_id: GuildId) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| self.spawn_slot(guild_id))
            .session
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(&guild_id).map(|slot| slot.session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn spawn_slot(&self, guild_id: GuildId) -> GuildSlot {
        let (events, mut rx) = mpsc::unbounded_channel();
        let session = Arc::new(Mutex::new(Session::new(
            guild_id,
            self.backend.clone(),
            self.idle_delay,
            events.clone(),
        )));

        let worker_session = session.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                worker_session.lock().await.handle_event(event).await;
            }
        });

        debug!("📦 Sesión creada para guild {}", guild_id);
        GuildSlot {
            session,
            events,
            worker,
        }
    }

    /// Encamina una señal del backend a la cola de su guild.
    ///
    /// Las señales de guilds sin sesión se descartan; la caída del nodo llega
    /// a todos.
    pub fn dispatch(&self, event: BackendEvent) {
        match event.guild_id() {
            Some(guild_id) => match self.sessions.get(&guild_id) {
                Some(slot) => {
                    let _ = slot.events.send(SessionEvent::Backend(event));
                }
                None => debug!("Descartando evento del backend para guild desconocido {}", guild_id),
            },
            None => {
                for slot in self.sessions.iter() {
                    let _ = slot.events.send(SessionEvent::Backend(event.clone()));
                }
            }
        }
    }

    /// Sale de todos los canales de voz. Se usa al apagar.
    pub async fn disconnect_all(&self) {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|slot| slot.session.clone())
            .collect();

        for session in sessions {
            let mut session = session.lock().await;
            let guild_id = session.guild_id();
            match session.disconnect().await {
                Ok(true) => info!("👋 Guild {} desconectado al apagar", guild_id),
                Ok(false) => {}
                Err(e) => warn!("Error al desconectar guild {}: {}", guild_id, e),
            }
        }
    }
}
