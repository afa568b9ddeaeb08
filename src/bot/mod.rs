//! # Bot Module
//!
//! Gateway-facing half of the bot: prefix commands from text messages and
//! voice-state updates, both routed into the per-guild sessions.
//!
//! [`TriggerBot`] implements Serenity's [`EventHandler`]. Commands go through
//! [`commands::parse_command`], a permission check against [`BotSettings`],
//! then [`handlers::handle_command`]. Voice-state updates become
//! [`VoiceTransition`]s for the [`PresenceReactor`].

use serenity::{
    all::{ChannelId, Colour, Context, EventHandler, GuildId, Message, Ready, UserId, VoiceState},
    async_trait,
    builder::CreateMessage,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod handlers;
pub mod settings;

use self::{
    commands::{parse_command, ParseError},
    settings::BotSettings,
};
use crate::{
    audio::player::MusicPlayer,
    config::Config,
    session::{PresenceOutcome, PresenceReactor, VoiceTransition},
    ui::embeds,
};

pub struct TriggerBot {
    config: Arc<Config>,
    settings: Arc<BotSettings>,
    player: Arc<MusicPlayer>,
    presence: PresenceReactor,
    color: Colour,
}

impl TriggerBot {
    pub fn new(
        config: Arc<Config>,
        settings: Arc<BotSettings>,
        player: Arc<MusicPlayer>,
        presence: PresenceReactor,
    ) -> Self {
        let color = Colour::new(config.embed_color);
        Self {
            config,
            settings,
            player,
            presence,
            color,
        }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub fn player(&self) -> &MusicPlayer {
        &self.player
    }

    pub fn color(&self) -> Colour {
        self.color
    }

    /// Role names of the message author, read from the cache.
    fn author_role_names(&self, ctx: &Context, guild_id: GuildId, msg: &Message) -> Vec<String> {
        let Some(guild) = ctx.cache.guild(guild_id) else {
            return Vec::new();
        };
        let role_ids = match &msg.member {
            Some(member) => member.roles.clone(),
            None => guild
                .members
                .get(&msg.author.id)
                .map(|member| member.roles.clone())
                .unwrap_or_default(),
        };
        role_ids
            .iter()
            .filter_map(|id| guild.roles.get(id))
            .map(|role| role.name.clone())
            .collect()
    }

    /// Humans currently in `channel` according to the cache.
    fn humans_in(&self, ctx: &Context, guild_id: GuildId, channel: Option<ChannelId>) -> usize {
        let Some(channel) = channel else {
            return 0;
        };
        let Some(guild) = ctx.cache.guild(guild_id) else {
            return 0;
        };
        count_humans(
            channel,
            guild.voice_states.values().map(|state| {
                let is_bot = state
                    .member
                    .as_ref()
                    .map(|member| member.user.bot)
                    .or_else(|| guild.members.get(&state.user_id).map(|member| member.user.bot))
                    .unwrap_or(false);
                (state.channel_id, is_bot)
            }),
        )
    }
}

/// Counts non-bot occupants of `channel` from `(channel, is_bot)` pairs.
pub fn count_humans(
    channel: ChannelId,
    occupants: impl Iterator<Item = (Option<ChannelId>, bool)>,
) -> usize {
    occupants
        .filter(|(current, is_bot)| *current == Some(channel) && !is_bot)
        .count()
}

fn is_bot_member(ctx: &Context, state: &VoiceState, guild_id: GuildId) -> bool {
    if let Some(member) = &state.member {
        return member.user.bot;
    }
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.members.get(&state.user_id).map(|member| member.user.bot))
        .unwrap_or(false)
}

#[async_trait]
impl EventHandler for TriggerBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        match self.settings.vc_channel() {
            Some(channel) => info!("🔊 Vigilando el canal de voz {}", channel),
            None => info!("🔇 Sin canal de voz configurado, usa set_vc"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(parsed) = parse_command(&self.config.command_prefix, &msg.content) else {
            return;
        };

        if let Err(ParseError::Unknown(verb)) = &parsed {
            debug!("Ignorando comando desconocido '{}' en guild {}", verb, guild_id);
            return;
        }

        let role_names = self.author_role_names(&ctx, guild_id, &msg);
        if !self
            .settings
            .permits(msg.channel_id, role_names.iter().map(String::as_str))
        {
            debug!(
                "🔒 Comando de {} en {} rechazado por canal o rol",
                msg.author.name, msg.channel_id
            );
            return;
        }

        let result = match parsed {
            Ok(command) => handlers::handle_command(&ctx, &msg, guild_id, command, self).await,
            Err(ParseError::Usage(usage)) => {
                let embed = embeds::warning_embed(
                    "Usage",
                    &format!("`{}{}`", self.config.command_prefix, usage),
                );
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await
                    .map(|_| ())
                    .map_err(Into::into)
            }
            Err(ParseError::Unknown(_)) => Ok(()),
        };

        if let Err(e) = result {
            error!("Error manejando comando en guild {}: {:?}", guild_id, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let current_user: UserId = ctx.cache.current_user().id;
        let configured = self.settings.vc_channel();
        let transition = VoiceTransition {
            guild_id,
            member: new.user_id,
            is_bot: is_bot_member(&ctx, &new, guild_id),
            is_self: new.user_id == current_user,
            before: old.as_ref().and_then(|state| state.channel_id),
            after: new.channel_id,
            humans_in_channel: self.humans_in(&ctx, guild_id, configured),
        };

        match self.presence.react(configured, &transition).await {
            PresenceOutcome::Ignored => {}
            outcome => debug!("Guild {}: cambio de voz de {} -> {:?}", guild_id, new.user_id, outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_humans_skips_bots_and_other_channels() {
        let watched = ChannelId::new(1);
        let other = ChannelId::new(2);
        let occupants = vec![
            (Some(watched), false),
            (Some(watched), true),
            (Some(other), false),
            (None, false),
            (Some(watched), false),
        ];

        assert_eq!(count_humans(watched, occupants.into_iter()), 2);
        assert_eq!(count_humans(other, std::iter::once((Some(other), true))), 0);
    }
}
