use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{info, warn};

use super::manager::SessionManager;

/// Movimiento de un miembro entre canales de voz, con el número de humanos
/// en el canal configurado tras el movimiento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTransition {
    pub guild_id: GuildId,
    pub member: UserId,
    pub is_bot: bool,
    /// El miembro es el propio bot.
    pub is_self: bool,
    pub before: Option<ChannelId>,
    pub after: Option<ChannelId>,
    pub humans_in_channel: usize,
}

/// Acción que se ejecuta cuando el primer humano entra en un canal vacío.
#[async_trait]
pub trait FirstArrivalTrigger: Send + Sync {
    async fn on_first_arrival(&self, guild_id: GuildId, channel_id: ChannelId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    Ignored,
    Arrival { first: bool },
    ConnectFailed,
    Emptied,
    SelfDisconnected,
}

pub struct PresenceReactor {
    sessions: Arc<SessionManager>,
    trigger: Option<Arc<dyn FirstArrivalTrigger>>,
}

impl PresenceReactor {
    pub fn new(sessions: Arc<SessionManager>, trigger: Option<Arc<dyn FirstArrivalTrigger>>) -> Self {
        Self { sessions, trigger }
    }

    /// Reacciona a un movimiento respecto a `configured`. Sin canal
    /// configurado se ignora todo.
    pub async fn react(
        &self,
        configured: Option<ChannelId>,
        transition: &VoiceTransition,
    ) -> PresenceOutcome {
        if transition.is_self {
            return self.on_self_moved(transition).await;
        }

        let Some(channel) = configured else {
            return PresenceOutcome::Ignored;
        };

        let joined = transition.after == Some(channel) && transition.before != Some(channel);
        let left = transition.before == Some(channel) && transition.after != Some(channel);

        if joined && !transition.is_bot {
            self.on_arrival(transition, channel).await
        } else if left && transition.humans_in_channel == 0 {
            self.on_emptied(transition.guild_id).await
        } else {
            PresenceOutcome::Ignored
        }
    }

    async fn on_arrival(&self, transition: &VoiceTransition, channel: ChannelId) -> PresenceOutcome {
        let guild_id = transition.guild_id;
        let session = self.sessions.session(guild_id);

        let first = {
            let mut session = session.lock().await;
            if let Err(e) = session.connect(channel).await {
                warn!("❌ Guild {}: no se pudo entrar en {}: {}", guild_id, channel, e);
                return PresenceOutcome::ConnectFailed;
            }

            if transition.humans_in_channel >= 1 && !session.is_occupied() {
                session.set_occupied(true);
                transition.humans_in_channel == 1
            } else {
                false
            }
        };

        // Fuera del lock: el trigger encola a través de la sesión.
        if first {
            info!("👋 Guild {}: primer oyente en {}", guild_id, channel);
            if let Some(trigger) = &self.trigger {
                trigger.on_first_arrival(guild_id, channel).await;
            }
        }
        PresenceOutcome::Arrival { first }
    }

    async fn on_emptied(&self, guild_id: GuildId) -> PresenceOutcome {
        let Some(session) = self.sessions.get(guild_id) else {
            return PresenceOutcome::Emptied;
        };

        let mut session = session.lock().await;
        session.set_occupied(false);
        match session.disconnect().await {
            Ok(true) => info!("🚪 Guild {}: canal vacío, saliendo", guild_id),
            Ok(false) => {}
            Err(e) => warn!("Guild {}: error al desconectar con el canal vacío: {}", guild_id, e),
        }
        PresenceOutcome::Emptied
    }

    /// Sacaron al bot del canal de voz (expulsado o desconectado).
    async fn on_self_moved(&self, transition: &VoiceTransition) -> PresenceOutcome {
        if transition.after.is_some() {
            return PresenceOutcome::Ignored;
        }
        let Some(session) = self.sessions.get(transition.guild_id) else {
            return PresenceOutcome::Ignored;
        };

        let mut session = session.lock().await;
        session.set_occupied(false);
        if let Err(e) = session.disconnect().await {
            warn!("Guild {}: error limpiando tras la salida forzada: {}", transition.guild_id, e);
        }
        PresenceOutcome::SelfDisconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{track, FakeBackend};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    const GUILD: GuildId = GuildId::new(1);
    const VC: ChannelId = ChannelId::new(100);
    const OTHER: ChannelId = ChannelId::new(200);

    #[derive(Default)]
    struct CountingTrigger(AtomicUsize);

    #[async_trait]
    impl FirstArrivalTrigger for CountingTrigger {
        async fn on_first_arrival(&self, _guild_id: GuildId, _channel_id: ChannelId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        reactor: PresenceReactor,
        sessions: Arc<SessionManager>,
        backend: Arc<FakeBackend>,
        trigger: Arc<CountingTrigger>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(FakeBackend::default());
        let sessions = Arc::new(SessionManager::new(backend.clone(), Some(Duration::from_secs(300))));
        let trigger = Arc::new(CountingTrigger::default());
        let dyn_trigger: Arc<dyn FirstArrivalTrigger> = trigger.clone();
        let reactor = PresenceReactor::new(sessions.clone(), Some(dyn_trigger));
        Fixture {
            reactor,
            sessions,
            backend,
            trigger,
        }
    }

    fn transition(
        member: u64,
        before: Option<ChannelId>,
        after: Option<ChannelId>,
        humans: usize,
    ) -> VoiceTransition {
        VoiceTransition {
            guild_id: GUILD,
            member: UserId::new(member),
            is_bot: false,
            is_self: false,
            before,
            after,
            humans_in_channel: humans,
        }
    }

    impl Fixture {
        async fn react(&self, t: VoiceTransition) -> PresenceOutcome {
            self.reactor.react(Some(VC), &t).await
        }

        fn fired(&self) -> usize {
            self.trigger.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_first_arrival_fires_once() {
        let f = fixture();
        let outcome = f.react(transition(1, None, Some(VC), 1)).await;

        assert_eq!(outcome, PresenceOutcome::Arrival { first: true });
        assert_eq!(f.fired(), 1);
        assert_eq!(f.backend.with(|s| s.connects), 1);
    }

    #[tokio::test]
    async fn test_trigger_fires_per_occupied_period() {
        let f = fixture();

        // 0 -> 1 -> 2 -> 1 -> 0 -> 1
        f.react(transition(1, None, Some(VC), 1)).await;
        let second = f.react(transition(2, Some(OTHER), Some(VC), 2)).await;
        f.react(transition(2, Some(VC), None, 1)).await;
        assert_eq!(second, PresenceOutcome::Arrival { first: false });
        assert_eq!(f.fired(), 1);

        let emptied = f.react(transition(1, Some(VC), None, 0)).await;
        assert_eq!(emptied, PresenceOutcome::Emptied);
        assert_eq!(f.backend.disconnects(), 1);

        f.react(transition(1, None, Some(VC), 1)).await;
        assert_eq!(f.fired(), 2);
    }

    #[tokio::test]
    async fn test_emptied_channel_clears_session() {
        let f = fixture();
        f.react(transition(1, None, Some(VC), 1)).await;
        {
            let session = f.sessions.get(GUILD).unwrap();
            let mut session = session.lock().await;
            session.enqueue_many(vec![track("a"), track("b")]).await.unwrap();
        }

        f.react(transition(1, Some(VC), Some(OTHER), 0)).await;

        let session = f.sessions.get(GUILD).unwrap();
        let session = session.lock().await;
        assert!(!session.is_connected());
        assert!(!session.is_occupied());
        assert_eq!(session.current(), None);
        assert_eq!(session.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_bots_and_other_channels_ignored() {
        let f = fixture();

        let mut bot = transition(5, None, Some(VC), 0);
        bot.is_bot = true;
        assert_eq!(f.react(bot).await, PresenceOutcome::Ignored);
        assert_eq!(f.react(transition(1, None, Some(OTHER), 0)).await, PresenceOutcome::Ignored);
        assert_eq!(
            f.reactor.react(None, &transition(1, None, Some(VC), 1)).await,
            PresenceOutcome::Ignored
        );

        assert_eq!(f.fired(), 0);
        assert!(f.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_refused_connection_does_not_mark_occupied() {
        let f = fixture();
        f.backend.with(|s| s.refuse_connect = true);

        let outcome = f.react(transition(1, None, Some(VC), 1)).await;
        assert_eq!(outcome, PresenceOutcome::ConnectFailed);
        assert_eq!(f.fired(), 0);

        f.backend.with(|s| s.refuse_connect = false);
        f.react(transition(1, Some(VC), None, 0)).await;
        f.react(transition(1, None, Some(VC), 1)).await;
        assert_eq!(f.fired(), 1);
    }

    #[tokio::test]
    async fn test_forced_leave_resets_session() {
        let f = fixture();
        f.react(transition(1, None, Some(VC), 1)).await;

        let mut kicked = transition(99, Some(VC), None, 1);
        kicked.is_self = true;
        kicked.is_bot = true;
        assert_eq!(f.react(kicked).await, PresenceOutcome::SelfDisconnected);

        let session = f.sessions.get(GUILD).unwrap();
        assert!(!session.lock().await.is_connected());
    }
}
