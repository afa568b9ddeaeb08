use std::time::Duration;
use tokio::{sync::mpsc, task::AbortHandle};
use tracing::debug;

use super::SessionEvent;

/// Única acción diferida de auto-desconexión de una sesión.
///
/// Al dispararse no toca la sesión: la tarea publica
/// `SessionEvent::IdleTimeout` en la cola serializada del guild, y la sesión
/// solo la acepta si esa generación sigue siendo la armada. Un disarm que
/// compite con el disparo nunca desconecta.
#[derive(Debug)]
pub struct IdleTimer {
    delay: Option<Duration>,
    generation: u64,
    armed: Option<AbortHandle>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl IdleTimer {
    /// `delay = None` desactiva la auto-desconexión; `arm` no hace nada.
    pub fn new(delay: Option<Duration>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            delay,
            generation: 0,
            armed: None,
            events,
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Veces que se ha armado el temporizador.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancela la acción pendiente y programa una nueva.
    pub fn arm(&mut self) {
        let Some(delay) = self.delay else {
            return;
        };

        self.disarm();
        self.generation += 1;

        let generation = self.generation;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::IdleTimeout { generation });
        });

        debug!("⏲️ Temporizador de inactividad armado (generación {}, {:?})", generation, delay);
        self.armed = Some(task.abort_handle());
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.armed.take() {
            handle.abort();
            debug!("⏲️ Temporizador de inactividad desarmado (generación {})", self.generation);
        }
    }

    /// Acepta el disparo si pertenece a la generación armada y lo consume.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        if self.armed.is_some() && generation == self.generation {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
