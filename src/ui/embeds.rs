use regex::Regex;
use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::{fmt::Display, sync::LazyLock};

use crate::{
    audio::{
        player::PlaylistOutcome,
        track::{LoopMode, Track},
    },
    session::SessionSnapshot,
};

/// Entries shown by `queue` before the "(+N more)" tail.
pub const QUEUE_PREVIEW_LIMIT: usize = 10;
/// Entries shown by `playlist_show`.
pub const PLAYLIST_PREVIEW_LIMIT: usize = 15;
/// Discord rejects field values longer than this.
pub const FIELD_VALUE_LIMIT: usize = 1024;
/// Discord rejects descriptions longer than this.
pub const DESCRIPTION_LIMIT: usize = 4096;

static YOUTUBE_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/shorts/)([A-Za-z0-9_-]+)").ok()
});

/// Colores fijos para respuestas que no son de música
pub mod colors {
    use serenity::all::Colour;

    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
}

/// Embed base con el color configurado.
pub fn music_embed(color: Colour, title: &str, description: Option<&str>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description.unwrap_or_default())
        .color(color)
}

pub fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
}

pub fn warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
}

pub fn track_added_embed(color: Colour, track: &Track, position: usize) -> CreateEmbed {
    let mut embed = music_embed(color, "✅ Added to queue", Some(track_line(track).as_str()))
        .field("Position in queue", position.to_string(), true);

    if let Some(duration) = track.duration_ms() {
        embed = embed.field("Duration", format_duration_ms(Some(duration)), true);
    }
    if let Some(thumbnail) = youtube_thumbnail(track.uri()) {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

pub fn now_playing_embed(color: Colour, current: Option<&Track>) -> CreateEmbed {
    let Some(track) = current else {
        return music_embed(color, "🎵 Now playing", Some("Nothing is playing right now."));
    };

    let mut embed = music_embed(color, "🎵 Now playing", Some(track_line(track).as_str()));
    if let Some(author) = track.author() {
        embed = embed.field("Artist", author, true);
    }
    if let Some(duration) = track.duration_ms() {
        embed = embed.field("Duration", format_duration_ms(Some(duration)), true);
    }
    if let Some(thumbnail) = youtube_thumbnail(track.uri()) {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

pub fn queue_embed(color: Colour, snapshot: &SessionSnapshot) -> CreateEmbed {
    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return music_embed(color, "📋 Queue", Some("The queue is empty."));
    }

    let mut embed = music_embed(color, "📋 Queue", None);
    if let Some(current) = &snapshot.current {
        embed = embed.field("Now playing", track_line(current), false);
    }

    let up_next = if snapshot.queue.is_empty() {
        "(none)".to_string()
    } else {
        let lines: Vec<String> = snapshot.queue.iter().map(track_line).collect();
        numbered_preview(&lines, QUEUE_PREVIEW_LIMIT, FIELD_VALUE_LIMIT)
    };

    embed
        .field("Up next", up_next, false)
        .footer(CreateEmbedFooter::new(queue_footer(snapshot)))
}

fn queue_footer(snapshot: &SessionSnapshot) -> String {
    if !snapshot.connected {
        return format!("Loop: {}", snapshot.loop_mode);
    }
    let status = if snapshot.paused {
        "paused"
    } else if snapshot.current.is_some() {
        "playing"
    } else {
        "stopped"
    };
    format!("Status: {} • Loop: {}", status, snapshot.loop_mode)
}

pub fn playlist_list_embed(color: Colour, playlists: &[(String, usize)]) -> CreateEmbed {
    if playlists.is_empty() {
        return music_embed(color, "📜 Playlists", Some("No playlists yet."));
    }
    let lines: Vec<String> = playlists
        .iter()
        .map(|(name, count)| format!("• **{}** ({} entries)", name, count))
        .collect();
    let description = fit_lines(lines, playlists.len(), DESCRIPTION_LIMIT);
    music_embed(color, "📜 Playlists", Some(description.as_str()))
}

pub fn playlist_show_embed(color: Colour, name: &str, entries: &[String]) -> CreateEmbed {
    let title = format!("📜 Playlist: {}", name);
    if entries.is_empty() {
        return music_embed(color, &title, Some("This playlist is empty."));
    }
    music_embed(color, &title, Some(numbered_preview(entries, PLAYLIST_PREVIEW_LIMIT, DESCRIPTION_LIMIT).as_str()))
}

pub fn playlist_queued_embed(color: Colour, name: &str, outcome: &PlaylistOutcome) -> CreateEmbed {
    music_embed(
        color,
        &format!("📜 Playlist queued: {}", name),
        Some(
            format!(
                "Added to queue: **{}**/**{}**",
                outcome.succeeded, outcome.total
            )
            .as_str(),
        ),
    )
    .field("Queue", outcome.queue_len.to_string(), true)
}

pub fn loop_embed(color: Colour, mode: LoopMode) -> CreateEmbed {
    let message = match mode {
        LoopMode::Off => "Looping disabled.",
        LoopMode::Song => "Looping the current song.",
        LoopMode::Queue => "Looping the whole queue.",
    };
    music_embed(color, "🔁 Loop", Some(message))
}

pub fn loop_status_embed(color: Colour, mode: LoopMode) -> CreateEmbed {
    music_embed(color, "🔁 Loop", Some(format!("Current mode: **{}**", mode).as_str()))
}

/// `m:ss`, or `h:mm:ss` past an hour. Unknown or zero renders as `?`.
pub fn format_duration_ms(ms: Option<u64>) -> String {
    let Some(ms) = ms.filter(|ms| *ms > 0) else {
        return "?".to_string();
    };
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Miniatura para URLs de watch, enlaces cortos y shorts.
pub fn youtube_thumbnail(url: Option<&str>) -> Option<String> {
    let video_id = YOUTUBE_ID.as_ref()?.captures(url?)?.get(1)?.as_str();
    Some(format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id))
}

/// Enlace markdown si la pista tiene URI, si no el título solo.
pub fn track_line(track: &Track) -> String {
    match track.uri() {
        Some(uri) => format!("[{}]({})", track.title(), uri),
        None => track.title().to_string(),
    }
}

/// `1. item` lines, at most `limit` of them and `max_chars` in total, with a
/// "(+N more)" tail for whatever was left out.
pub fn numbered_preview<T: Display>(items: &[T], limit: usize, max_chars: usize) -> String {
    let lines = items
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect();
    fit_lines(lines, items.len(), max_chars)
}

/// Joins as many of `lines` as fit in `max_chars`, leaving room for the
/// "(+N more)" tail whenever fewer than `total` entries are shown.
fn fit_lines(lines: Vec<String>, total: usize, max_chars: usize) -> String {
    let reserve = format!("\n… (+{} more)", total).chars().count();
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0;

    for (i, line) in lines.into_iter().enumerate() {
        let cost = line.chars().count() + usize::from(!kept.is_empty());
        let budget = if i + 1 < total {
            max_chars.saturating_sub(reserve)
        } else {
            max_chars
        };
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line);
    }

    if total > kept.len() {
        kept.push(format!("… (+{} more)", total - kept.len()));
    }
    kept.join("\n")
}
