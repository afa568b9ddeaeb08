use parking_lot::RwLock;
use serenity::model::id::ChannelId;

use crate::config::Config;

/// Valores que `set_vc`, `set_text` y `set_role` cambian en caliente.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub vc_channel: Option<ChannelId>,
    pub text_channel: Option<ChannelId>,
    pub allowed_role: Option<String>,
}

#[derive(Debug, Default)]
pub struct BotSettings {
    inner: RwLock<Settings>,
}

impl BotSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Settings {
            vc_channel: config.vc_channel_id.map(ChannelId::new),
            text_channel: config.text_channel_id.map(ChannelId::new),
            allowed_role: config.allowed_role_name.clone(),
        })
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn vc_channel(&self) -> Option<ChannelId> {
        self.inner.read().vc_channel
    }

    pub fn set_vc_channel(&self, channel: ChannelId) {
        self.inner.write().vc_channel = Some(channel);
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.inner.read().text_channel
    }

    pub fn set_text_channel(&self, channel: ChannelId) {
        self.inner.write().text_channel = Some(channel);
    }

    pub fn allowed_role(&self) -> Option<String> {
        self.inner.read().allowed_role.clone()
    }

    pub fn set_allowed_role(&self, role: impl Into<String>) {
        self.inner.write().allowed_role = Some(role.into());
    }

    /// Los comandos solo se aceptan en el canal de texto (si hay uno) y de
    /// miembros con el rol permitido (si hay uno).
    pub fn permits<'a>(
        &self,
        channel: ChannelId,
        mut role_names: impl Iterator<Item = &'a str>,
    ) -> bool {
        let settings = self.inner.read();
        if settings.text_channel.is_some_and(|text| text != channel) {
            return false;
        }
        match &settings.allowed_role {
            Some(role) => role_names.any(|name| name == role),
            None => true,
        }
    }
}
