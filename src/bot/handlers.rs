use anyhow::Result;
use serenity::{
    all::{ChannelType, Colour},
    builder::{CreateEmbed, CreateMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, RoleId},
    },
    prelude::Context,
    utils::{parse_channel_mention, parse_role_mention},
};
use tracing::info;

use super::{commands::Command, TriggerBot};
use crate::{
    audio::{player::PlayOutcome, track::LoopMode},
    error::SessionError,
    storage::RemoveOutcome,
    ui::embeds,
};

/// Runs a parsed command and posts the resulting embed in the same channel.
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: Command,
    bot: &TriggerBot,
) -> Result<()> {
    info!(
        "📝 Comando !{} usado por {} en guild {}",
        command.name(),
        msg.author.name,
        guild_id
    );

    let color = bot.color();
    let embed = match command {
        Command::Play(query) => handle_play(guild_id, &query, bot).await,
        Command::Now => {
            let snapshot = bot.player().snapshot(guild_id).await;
            embeds::now_playing_embed(color, snapshot.current.as_ref())
        }
        Command::Queue => embeds::queue_embed(color, &bot.player().snapshot(guild_id).await),
        Command::Pause => toggle_result(
            color,
            bot.player().pause(guild_id).await,
            ("⏸️ Paused", "Playback paused."),
            "Nothing is playing.",
        ),
        Command::Resume => toggle_result(
            color,
            bot.player().resume(guild_id).await,
            ("▶️ Resumed", "Playback resumed."),
            "Nothing is paused.",
        ),
        Command::Skip => toggle_result(
            color,
            bot.player().skip(guild_id).await,
            ("⏭️ Skipped", "The track was skipped."),
            "Nothing to skip.",
        ),
        Command::Stop => match bot.player().stop(guild_id).await {
            Ok(()) => embeds::music_embed(color, "⏹️ Stopped", Some("Playback stopped, queue cleared.")),
            Err(e) => session_error_embed(&e),
        },
        Command::Leave => toggle_result(
            color,
            bot.player().leave(guild_id).await,
            ("👋 Left", "Disconnected from the voice channel."),
            "Not connected to a voice channel.",
        ),
        Command::Loop(mode) => {
            bot.player().set_loop_mode(guild_id, mode).await;
            embeds::loop_embed(color, mode)
        }
        Command::LoopStatus => {
            let mode: LoopMode = bot.player().snapshot(guild_id).await.loop_mode;
            embeds::loop_status_embed(color, mode)
        }
        Command::PlaylistCreate(name) => {
            if bot.player().playlists().create(&name).await {
                embeds::music_embed(color, "📜 Playlist created", Some(name.as_str()))
            } else {
                embeds::warning_embed("Playlist", "A playlist with that name already exists.")
            }
        }
        Command::PlaylistList => embeds::playlist_list_embed(color, &bot.player().playlists().list().await),
        Command::PlaylistAdd { name, query } => {
            if bot.player().playlists().add(&name, &query).await {
                embeds::music_embed(
                    color,
                    &format!("📜 Added to {}", name),
                    Some(query.as_str()),
                )
            } else {
                no_such_playlist()
            }
        }
        Command::PlaylistRemove { name, query } => {
            match bot.player().playlists().remove(&name, &query).await {
                RemoveOutcome::Removed => embeds::music_embed(
                    color,
                    &format!("📜 Removed from {}", name),
                    Some(query.as_str()),
                ),
                RemoveOutcome::NoEntry => {
                    embeds::warning_embed("Playlist", "That entry is not in the playlist.")
                }
                RemoveOutcome::NoPlaylist => no_such_playlist(),
            }
        }
        Command::PlaylistShow(name) => match bot.player().playlists().get(&name).await {
            Some(entries) => embeds::playlist_show_embed(color, &name, &entries),
            None => no_such_playlist(),
        },
        Command::PlaylistPlay(name) => handle_playlist_play(guild_id, &name, bot).await,
        Command::PlaylistDelete(name) => {
            if bot.player().playlists().delete(&name).await {
                embeds::music_embed(color, "📜 Playlist deleted", Some(name.as_str()))
            } else {
                no_such_playlist()
            }
        }
        Command::SetVc(arg) => {
            match find_channel(ctx, guild_id, &arg, &[ChannelType::Voice, ChannelType::Stage]) {
                Some((id, name)) => {
                    bot.settings().set_vc_channel(id);
                    info!("⚙️ Guild {}: canal de voz configurado a {}", guild_id, id);
                    embeds::music_embed(color, "⚙️ Voice channel set", Some(name.as_str()))
                }
                None => embeds::error_embed("Settings", "That is not a voice channel of this server."),
            }
        }
        Command::SetText(arg) => {
            match find_channel(ctx, guild_id, &arg, &[ChannelType::Text, ChannelType::News]) {
                Some((id, name)) => {
                    bot.settings().set_text_channel(id);
                    info!("⚙️ Guild {}: canal de texto configurado a {}", guild_id, id);
                    embeds::music_embed(color, "⚙️ Text channel set", Some(name.as_str()))
                }
                None => embeds::error_embed("Settings", "That is not a text channel of this server."),
            }
        }
        Command::SetRole(arg) => match find_role(ctx, guild_id, &arg) {
            Some(name) => {
                bot.settings().set_allowed_role(name.clone());
                info!("⚙️ Guild {}: rol permitido configurado a {}", guild_id, name);
                embeds::music_embed(color, "⚙️ Role set", Some(name.as_str()))
            }
            None => embeds::error_embed("Settings", "No such role in this server."),
        },
    };

    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_play(guild_id: GuildId, query: &str, bot: &TriggerBot) -> CreateEmbed {
    let Some(channel) = bot.settings().vc_channel() else {
        return no_voice_channel();
    };

    match bot.player().play(guild_id, channel, query).await {
        Ok(PlayOutcome::Queued { track, position }) => {
            embeds::track_added_embed(bot.color(), &track, position)
        }
        Ok(PlayOutcome::NotFound) => {
            embeds::warning_embed("Not found", "No track matched that query.")
        }
        Err(e) => session_error_embed(&e),
    }
}

async fn handle_playlist_play(guild_id: GuildId, name: &str, bot: &TriggerBot) -> CreateEmbed {
    let Some(channel) = bot.settings().vc_channel() else {
        return no_voice_channel();
    };

    match bot.player().play_playlist(guild_id, channel, name).await {
        Ok(Some(outcome)) if outcome.total == 0 => {
            embeds::music_embed(bot.color(), "📜 Playlist", Some("This playlist is empty."))
        }
        Ok(Some(outcome)) => embeds::playlist_queued_embed(bot.color(), name, &outcome),
        Ok(None) => no_such_playlist(),
        Err(e) => session_error_embed(&e),
    }
}

/// `Ok(true)` renders `done`, `Ok(false)` renders `noop` as a warning.
fn toggle_result(
    color: Colour,
    result: Result<bool, SessionError>,
    done: (&str, &str),
    noop: &str,
) -> CreateEmbed {
    match result {
        Ok(true) => embeds::music_embed(color, done.0, Some(done.1)),
        Ok(false) => embeds::warning_embed("Nothing to do", noop),
        Err(e) => session_error_embed(&e),
    }
}

pub fn session_error_embed(error: &SessionError) -> CreateEmbed {
    if error.is_connection() {
        embeds::error_embed(
            "Voice connection",
            &format!("Could not use the voice channel: {}", error),
        )
    } else {
        embeds::error_embed("Playback error", &error.to_string())
    }
}

fn no_voice_channel() -> CreateEmbed {
    embeds::error_embed("Voice channel", "No voice channel configured. Use `set_vc` first.")
}

fn no_such_playlist() -> CreateEmbed {
    embeds::warning_embed("Playlist", "No such playlist.")
}

/// Channel mention or raw id.
pub fn channel_id_argument(arg: &str) -> Option<ChannelId> {
    parse_channel_mention(arg).or_else(|| {
        arg.trim()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(ChannelId::new)
    })
}

/// Role mention or raw id.
pub fn role_id_argument(arg: &str) -> Option<RoleId> {
    parse_role_mention(arg).or_else(|| {
        arg.trim()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(RoleId::new)
    })
}

/// Looks a channel up by mention, id or name among `kinds`.
fn find_channel(
    ctx: &Context,
    guild_id: GuildId,
    arg: &str,
    kinds: &[ChannelType],
) -> Option<(ChannelId, String)> {
    let guild = ctx.cache.guild(guild_id)?;
    let by_id = channel_id_argument(arg);
    let by_name = arg.trim().trim_start_matches('#');

    guild
        .channels
        .values()
        .filter(|channel| kinds.contains(&channel.kind))
        .find(|channel| Some(channel.id) == by_id || channel.name.eq_ignore_ascii_case(by_name))
        .map(|channel| (channel.id, channel.name.clone()))
}

/// Looks a role up by mention, id or name. Returns its name.
fn find_role(ctx: &Context, guild_id: GuildId, arg: &str) -> Option<String> {
    let guild = ctx.cache.guild(guild_id)?;
    let by_id = role_id_argument(arg);
    let by_name = arg.trim().trim_start_matches('@');

    guild
        .roles
        .values()
        .find(|role| Some(role.id) == by_id || role.name == by_name)
        .map(|role| role.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[test]
    fn test_id_arguments() {
        assert_eq!(channel_id_argument("<#123>"), Some(ChannelId::new(123)));
        assert_eq!(channel_id_argument(" 456 "), Some(ChannelId::new(456)));
        assert_eq!(channel_id_argument("0"), None);
        assert_eq!(channel_id_argument("general"), None);
        assert_eq!(role_id_argument("<@&789>"), Some(RoleId::new(789)));
        assert_eq!(role_id_argument("DJ"), None);
    }

    #[test]
    fn test_error_embeds_describe_failure() {
        let refused = SessionError::Backend(BackendError::Connection("missing permissions".into()));
        let json = serde_json::to_value(session_error_embed(&refused)).unwrap();
        assert_eq!(json["title"], "❌ Voice connection");
        assert!(json["description"].as_str().unwrap().contains("missing permissions"));

        let submit = SessionError::Backend(BackendError::Submit("bad track".into()));
        let json = serde_json::to_value(session_error_embed(&submit)).unwrap();
        assert_eq!(json["title"], "❌ Playback error");
    }
}
