//! # Session Module
//!
//! Máquina de estados de reproducción por guild.
//!
//! - [`state`]: la [`Session`] (cola, pista actual, modo de bucle,
//!   conexión) y sus operaciones
//! - [`idle`]: el temporizador de auto-desconexión de cada sesión
//! - [`manager`]: registro de sesiones y la tarea por guild que serializa
//!   callbacks del backend y disparos del temporizador
//! - [`presence`]: reacciones a entradas y salidas del canal de voz
//!
//! Toda mutación de una sesión ocurre con el mutex async de su guild tomado.
//! Las señales entrantes se encolan por guild y las consume una sola tarea,
//! en el orden en que se emitieron.

use crate::audio::backend::BackendEvent;

pub mod idle;
pub mod manager;
pub mod presence;
pub mod state;

pub use idle::IdleTimer;
pub use manager::SessionManager;
pub use presence::{FirstArrivalTrigger, PresenceOutcome, PresenceReactor, VoiceTransition};
pub use state::{Session, SessionSnapshot};

/// Señal asíncrona entregada a la sesión de un guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Backend(BackendEvent),
    IdleTimeout { generation: u64 },
}

#[cfg(test)]
pub(crate) mod testing;
