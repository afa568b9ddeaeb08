use anyhow::Result;
use std::{path::PathBuf, time::Duration};

/// Address and credentials of the Lavalink node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LavalinkConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub ssl: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,
    pub enable_message_content_intent: bool,

    // Backend de audio
    pub lavalink: LavalinkConfig,
    pub search_prefix: String,

    // Sesión
    pub idle_disconnect: Option<Duration>,
    pub autoplay_playlist: Option<String>,

    // Ajustes iniciales (cambian con set_vc / set_text / set_role)
    pub vc_channel_id: Option<u64>,
    pub text_channel_id: Option<u64>,
    pub allowed_role_name: Option<String>,

    // Almacenamiento
    pub playlists_file: PathBuf,

    // UI
    pub embed_color: u32,

    // Servidor web keep-alive
    pub run_web: bool,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            enable_message_content_intent: parse_flag(
                &std::env::var("ENABLE_MESSAGE_CONTENT_INTENT").unwrap_or_else(|_| "1".to_string()),
            ),

            // Backend de audio
            lavalink: LavalinkConfig {
                host: std::env::var("LAVALINK_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("LAVALINK_PORT")
                    .unwrap_or_else(|_| "2333".to_string())
                    .parse()?,
                password: std::env::var("LAVALINK_PASSWORD")
                    .unwrap_or_else(|_| "youshallnotpass".to_string()),
                ssl: parse_flag(&std::env::var("LAVALINK_SSL").unwrap_or_else(|_| "0".to_string())),
            },
            search_prefix: std::env::var("SEARCH_PREFIX").unwrap_or_else(|_| "ytsearch:".to_string()),

            // Sesión
            idle_disconnect: idle_delay(
                std::env::var("IDLE_DISCONNECT_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .trim()
                    .parse()?,
            ),
            autoplay_playlist: non_empty(std::env::var("AUTOPLAY_PLAYLIST").ok()),

            // Ajustes en caliente
            vc_channel_id: nonzero_id(
                std::env::var("VC_CHANNEL_ID")
                    .unwrap_or_else(|_| "0".to_string())
                    .trim()
                    .parse()?,
            ),
            text_channel_id: nonzero_id(
                std::env::var("TEXT_CHANNEL_ID")
                    .unwrap_or_else(|_| "0".to_string())
                    .trim()
                    .parse()?,
            ),
            allowed_role_name: non_empty(Some(
                std::env::var("ALLOWED_ROLE_NAME").unwrap_or_else(|_| "Nekromanta".to_string()),
            )),

            // Almacenamiento
            playlists_file: std::env::var("PLAYLISTS_FILE")
                .unwrap_or_else(|_| "playlists.json".to_string())
                .into(),

            // UI
            embed_color: parse_color(
                &std::env::var("EMBED_COLOR").unwrap_or_else(|_| "0x5865F2".to_string()),
            )?,

            // Web
            run_web: parse_flag(&std::env::var("RUN_WEB").unwrap_or_else(|_| "1".to_string())),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Catches values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.lavalink.host.trim().is_empty() {
            anyhow::bail!("LAVALINK_HOST must not be empty");
        }

        if self.lavalink.port == 0 {
            anyhow::bail!("LAVALINK_PORT must be greater than 0");
        }

        if self.run_web && self.port == 0 {
            anyhow::bail!("PORT must be greater than 0 when RUN_WEB is enabled");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("COMMAND_PREFIX must not be empty");
        }

        Ok(())
    }

    /// Log-safe description of the configuration (no secrets).
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Lavalink: {}:{} (ssl={})\n  \
            Commands: prefix '{}', search '{}'\n  \
            Idle disconnect: {}\n  \
            Channels: vc={}, text={}, role={}\n  \
            Playlists: {} (autoplay: {})\n  \
            Web: {}",
            self.lavalink.host,
            self.lavalink.port,
            self.lavalink.ssl,
            self.command_prefix,
            self.search_prefix,
            self.idle_disconnect
                .map_or("disabled".to_string(), |d| format!("{}s", d.as_secs())),
            self.vc_channel_id.map_or("unset".to_string(), |id| id.to_string()),
            self.text_channel_id.map_or("any".to_string(), |id| id.to_string()),
            self.allowed_role_name.as_deref().unwrap_or("everyone"),
            self.playlists_file.display(),
            self.autoplay_playlist.as_deref().unwrap_or("none"),
            if self.run_web {
                format!("port {}", self.port)
            } else {
                "disabled".to_string()
            }
        )
    }
}

/// Non-positive delays disable auto-disconnect.
pub fn idle_delay(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

/// Accepts `0x`-prefixed, `#`-prefixed or bare hex.
pub fn parse_color(value: &str) -> Result<u32> {
    let value = value.trim();
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'))
        .unwrap_or(value);
    u32::from_str_radix(hex, 16)
        .map_err(|e| anyhow::anyhow!("Invalid EMBED_COLOR '{}': {}", value, e))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn nonzero_id(id: u64) -> Option<u64> {
    (id != 0).then_some(id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
