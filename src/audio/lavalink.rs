use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::{de::IgnoredAny, Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest, http::HeaderValue, protocol::Message,
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::backend::{
    AudioBackend, BackendEvent, ConnectionHandle, EndReason, PlayerStatus, SearchResult,
    TrackSearch,
};
use super::track::Track;
use crate::config::LavalinkConfig;
use crate::error::BackendError;

const CLIENT_NAME: &str = concat!("trigger-bot/", env!("CARGO_PKG_VERSION"));
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_MAX_SHIFT: u32 = 5;

/// Credenciales de voz enviadas al nodo para un guild.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceState {
    token: String,
    endpoint: String,
    session_id: String,
}

/// Conexión a un nodo Lavalink v4.
///
/// Las entradas a voz de Discord pasan por songbird solo vía gateway; el nodo
/// recibe las credenciales resultantes y hace el streaming.
pub struct LavalinkNode {
    http: reqwest::Client,
    rest_base: Url,
    ws_url: Url,
    password: String,
    user_id: UserId,
    songbird: Arc<Songbird>,
    session_id: RwLock<Option<String>>,
    voice: DashMap<GuildId, VoiceState>,
}

impl LavalinkNode {
    pub fn new(
        config: &LavalinkConfig,
        user_id: UserId,
        songbird: Arc<Songbird>,
    ) -> Result<Self, BackendError> {
        let (http_scheme, ws_scheme) = if config.ssl { ("https", "wss") } else { ("http", "ws") };

        let rest_base = Url::parse(&format!("{http_scheme}://{}:{}/v4/", config.host, config.port))
            .map_err(|e| BackendError::Protocol(format!("invalid Lavalink address: {e}")))?;
        let ws_url = Url::parse(&format!(
            "{ws_scheme}://{}:{}/v4/websocket",
            config.host, config.port
        ))
        .map_err(|e| BackendError::Protocol(format!("invalid Lavalink address: {e}")))?;

        info!("🎼 Nodo Lavalink configurado en {}:{}", config.host, config.port);

        Ok(Self {
            http: reqwest::Client::new(),
            rest_base,
            ws_url,
            password: config.password.clone(),
            user_id,
            songbird,
            session_id: RwLock::new(None),
            voice: DashMap::new(),
        })
    }

    /// Mantiene vivo el WebSocket de eventos y reenvía los de ciclo de vida.
    ///
    /// Reconecta siempre con backoff exponencial acotado.
    pub async fn run(self: Arc<Self>, events: mpsc::UnboundedSender<BackendEvent>) {
        let mut backoff = Backoff::new();

        loop {
            match self.listen(&events, &mut backoff).await {
                Ok(()) => info!("🔌 WebSocket de Lavalink cerrado"),
                Err(e) => warn!("Error en el WebSocket de Lavalink: {}", e),
            }

            let was_ready = self.session_id.write().take().is_some();
            if was_ready && events.send(BackendEvent::NodeDisconnected).is_err() {
                debug!("Receptor de eventos cerrado, deteniendo el listener de Lavalink");
                return;
            }

            let delay = backoff.next();
            info!("🔄 Reconectando a Lavalink en {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn listen(
        &self,
        events: &mpsc::UnboundedSender<BackendEvent>,
        backoff: &mut Backoff,
    ) -> Result<(), BackendError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header_value(&self.password)?);
        headers.insert("User-Id", header_value(&self.user_id.to_string())?);
        headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let (_write, mut read) = stream.split();

        while let Some(message) = read.next().await {
            let message = message.map_err(|e| BackendError::Connection(e.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    debug!("Frame de cierre de Lavalink: {:?}", frame);
                    return Ok(());
                }
                _ => continue,
            };

            let incoming: IncomingMessage = match serde_json::from_str(text.as_str()) {
                Ok(incoming) => incoming,
                Err(e) => {
                    warn!("Mensaje de Lavalink ilegible: {}", e);
                    continue;
                }
            };

            match incoming {
                IncomingMessage::Ready { resumed, session_id } => {
                    info!("✅ Lavalink listo (sesión {}, reanudada: {})", session_id, resumed);
                    *self.session_id.write() = Some(session_id);
                    backoff.reset();
                }
                IncomingMessage::Event(event) => {
                    if let Some(event) = event.into_backend_event() {
                        if events.send(event).is_err() {
                            return Ok(());
                        }
                    }
                }
                IncomingMessage::PlayerUpdate { .. }
                | IncomingMessage::Stats {}
                | IncomingMessage::Unknown => {}
            }
        }

        Ok(())
    }

    fn session_id(&self) -> Result<String, BackendError> {
        self.session_id.read().clone().ok_or(BackendError::NotReady)
    }

    fn player_url(&self, guild_id: GuildId) -> Result<Url, BackendError> {
        let session_id = self.session_id()?;
        self.rest_base
            .join(&format!("sessions/{session_id}/players/{guild_id}"))
            .map_err(|e| BackendError::Protocol(e.to_string()))
    }

    async fn update_player(
        &self,
        guild_id: GuildId,
        update: &UpdatePlayer<'_>,
    ) -> Result<(), BackendError> {
        let url = self.player_url(guild_id)?;
        let response = self
            .http
            .patch(url)
            .query(&[("noReplace", "false")])
            .header("Authorization", &self.password)
            .json(update)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Protocol(format!("player update returned {status}: {body}")));
        }

        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value).map_err(|e| BackendError::Protocol(e.to_string()))
}

#[async_trait]
impl AudioBackend for LavalinkNode {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, BackendError> {
        if self.session_id.read().is_none() {
            return Err(BackendError::Connection("Lavalink node is not ready".into()));
        }

        let (info, _call) = self
            .songbird
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let voice = VoiceState {
            token: info.token,
            endpoint: info.endpoint,
            session_id: info.session_id,
        };

        self.update_player(
            guild_id,
            &UpdatePlayer {
                voice: Some(&voice),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| BackendError::Connection(e.to_string()))?;

        self.voice.insert(guild_id, voice);
        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);

        Ok(ConnectionHandle { guild_id, channel_id })
    }

    async fn submit(&self, handle: &ConnectionHandle, track: &Track) -> Result<(), BackendError> {
        // La voz va siempre, así un nodo reiniciado recupera el guild.
        let voice = self.voice.get(&handle.guild_id).map(|v| v.value().clone());

        self.update_player(
            handle.guild_id,
            &UpdatePlayer {
                track: Some(UpdateTrack {
                    encoded: Some(track.encoded()),
                }),
                paused: Some(false),
                voice: voice.as_ref(),
            },
        )
        .await
        .map_err(|e| BackendError::Submit(e.to_string()))
    }

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), BackendError> {
        self.update_player(
            handle.guild_id,
            &UpdatePlayer {
                track: Some(UpdateTrack { encoded: None }),
                ..Default::default()
            },
        )
        .await
    }

    async fn set_paused(&self, handle: &ConnectionHandle, paused: bool) -> Result<(), BackendError> {
        self.update_player(
            handle.guild_id,
            &UpdatePlayer {
                paused: Some(paused),
                ..Default::default()
            },
        )
        .await
    }

    async fn disconnect(&self, handle: &ConnectionHandle) -> Result<(), BackendError> {
        self.voice.remove(&handle.guild_id);

        // Un nodo reiniciado ya no conoce el player; salir de voz sigue siendo necesario.
        match self.player_url(handle.guild_id) {
            Ok(url) => {
                let response = self
                    .http
                    .delete(url)
                    .header("Authorization", &self.password)
                    .send()
                    .await;
                match response {
                    Ok(r) if !r.status().is_success() && r.status() != reqwest::StatusCode::NOT_FOUND => {
                        warn!("Destruir el player del guild {} devolvió {}", handle.guild_id, r.status());
                    }
                    Err(e) => warn!("Error destruyendo el player del guild {}: {}", handle.guild_id, e),
                    _ => {}
                }
            }
            Err(e) => debug!("Se omite destruir el player del guild {}: {}", handle.guild_id, e),
        }

        self.songbird
            .remove(handle.guild_id)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        info!("👋 Salió de voz en guild {}", handle.guild_id);
        Ok(())
    }

    async fn status(&self, guild_id: GuildId) -> Result<PlayerStatus, BackendError> {
        let url = self.player_url(guild_id)?;
        let response = self
            .http
            .get(url)
            .header("Authorization", &self.password)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(PlayerStatus::default());
        }

        let player: ApiPlayer = response.error_for_status()?.json().await?;
        Ok(player.status())
    }
}

#[async_trait]
impl TrackSearch for LavalinkNode {
    async fn search(&self, identifier: &str) -> Result<SearchResult, BackendError> {
        let url = self
            .rest_base
            .join("loadtracks")
            .map_err(|e| BackendError::Protocol(e.to_string()))?;

        let result: LoadResult = self
            .http
            .get(url)
            .query(&[("identifier", identifier)])
            .header("Authorization", &self.password)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        result.into_search_result()
    }
}

/// Espera exponencial acotada entre reintentos de conexión.
struct Backoff {
    attempt: u32,
}

impl Backoff {
    fn new() -> Self {
        Self { attempt: 0 }
    }

    fn next(&mut self) -> Duration {
        let delay = BACKOFF_BASE_MS * 2u64.pow(self.attempt.min(BACKOFF_MAX_SHIFT));
        self.attempt += 1;
        Duration::from_millis(delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

// Formato de red

#[derive(Debug, Default, Serialize)]
struct UpdatePlayer<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<UpdateTrack<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a VoiceState>,
}

/// `encoded: null` detiene el player.
#[derive(Debug, Serialize)]
struct UpdateTrack<'a> {
    encoded: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum IncomingMessage {
    Ready {
        resumed: bool,
        session_id: String,
    },
    PlayerUpdate {
        #[allow(dead_code)]
        guild_id: String,
    },
    Stats {},
    Event(ApiEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
enum ApiEvent {
    TrackStartEvent {
        guild_id: String,
        track: ApiTrack,
    },
    TrackEndEvent {
        guild_id: String,
        track: ApiTrack,
        reason: EndReason,
    },
    TrackExceptionEvent {
        guild_id: String,
        track: ApiTrack,
        exception: ApiException,
    },
    TrackStuckEvent {
        guild_id: String,
        track: ApiTrack,
        threshold_ms: u64,
    },
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    #[serde(other)]
    Unknown,
}

impl ApiEvent {
    fn into_backend_event(self) -> Option<BackendEvent> {
        match self {
            ApiEvent::TrackStartEvent { guild_id, track } => {
                debug!("▶️ Pista iniciada en guild {}: {}", guild_id, track.info.title);
                None
            }
            ApiEvent::TrackEndEvent { guild_id, track, reason } => Some(BackendEvent::TrackEnded {
                guild_id: parse_guild_id(&guild_id)?,
                encoded: track.encoded,
                reason,
            }),
            ApiEvent::TrackExceptionEvent { guild_id, track, exception } => {
                Some(BackendEvent::TrackErrored {
                    guild_id: parse_guild_id(&guild_id)?,
                    encoded: track.encoded,
                    reason: exception.describe(),
                })
            }
            ApiEvent::TrackStuckEvent { guild_id, track, threshold_ms } => {
                Some(BackendEvent::TrackStuck {
                    guild_id: parse_guild_id(&guild_id)?,
                    encoded: track.encoded,
                    threshold_ms,
                })
            }
            ApiEvent::WebSocketClosedEvent { guild_id, code, reason, by_remote } => {
                warn!(
                    "Socket de voz de Discord cerrado para guild {} ({} {}, remoto: {})",
                    guild_id, code, reason, by_remote
                );
                None
            }
            ApiEvent::Unknown => None,
        }
    }
}

fn parse_guild_id(raw: &str) -> Option<GuildId> {
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Some(GuildId::new(id)),
        _ => {
            error!("Lavalink envió un guild id inválido: {}", raw);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrack {
    encoded: String,
    info: ApiTrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrackInfo {
    title: String,
    author: String,
    length: u64,
    is_stream: bool,
    uri: Option<String>,
}

impl From<ApiTrack> for Track {
    fn from(api: ApiTrack) -> Self {
        let mut track = Track::new(api.encoded, api.info.title).with_author(api.info.author);
        if let Some(uri) = api.info.uri {
            track = track.with_uri(uri);
        }
        if !api.info.is_stream {
            track = track.with_duration_ms(api.info.length);
        }
        track
    }
}

#[derive(Debug, Deserialize)]
struct ApiException {
    message: Option<String>,
    severity: String,
    cause: String,
}

impl ApiException {
    fn describe(&self) -> String {
        format!(
            "{} ({}; cause: {})",
            self.message.as_deref().unwrap_or("unknown error"),
            self.severity,
            self.cause
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    info: ApiPlaylistInfo,
    tracks: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
enum LoadResult {
    Track(ApiTrack),
    Playlist(ApiPlaylist),
    Search(Vec<ApiTrack>),
    Empty(IgnoredAny),
    Error(ApiException),
}

impl LoadResult {
    fn into_search_result(self) -> Result<SearchResult, BackendError> {
        match self {
            LoadResult::Track(track) => Ok(SearchResult::Tracks(vec![track.into()])),
            LoadResult::Search(tracks) => {
                let tracks: Vec<Track> = tracks.into_iter().map(Track::from).collect();
                if tracks.is_empty() {
                    Ok(SearchResult::Empty)
                } else {
                    Ok(SearchResult::Tracks(tracks))
                }
            }
            LoadResult::Playlist(playlist) => Ok(SearchResult::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks.into_iter().map(Track::from).collect(),
            }),
            LoadResult::Empty(_) => Ok(SearchResult::Empty),
            LoadResult::Error(exception) => Err(BackendError::Protocol(exception.describe())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiPlayer {
    track: Option<ApiTrack>,
    paused: bool,
}

impl ApiPlayer {
    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            playing: self.track.is_some() && !self.paused,
            paused: self.track.is_some() && self.paused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TRACK_JSON: &str = r#"{
        "encoded": "QAAAjQIAJFJpY2sgQXN0bGV5",
        "info": {
            "identifier": "dQw4w9WgXcQ",
            "isSeekable": true,
            "author": "RickAstleyVEVO",
            "length": 212000,
            "isStream": false,
            "position": 0,
            "title": "Never Gonna Give You Up",
            "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "artworkUrl": null,
            "isrc": null,
            "sourceName": "youtube"
        },
        "pluginInfo": {},
        "userData": {}
    }"#;

    #[test]
    fn search_results_keep_order() {
        let body = format!(r#"{{"loadType":"search","data":[{TRACK_JSON},{TRACK_JSON}]}}"#);
        let result: LoadResult = serde_json::from_str(&body).unwrap();

        match result.into_search_result().unwrap() {
            SearchResult::Tracks(tracks) => {
                assert_eq!(tracks.len(), 2);
                assert_eq!(tracks[0].title(), "Never Gonna Give You Up");
                assert_eq!(tracks[0].duration_ms(), Some(212_000));
                assert_eq!(tracks[0].uri(), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn empty_and_error_loads() {
        let empty: LoadResult = serde_json::from_str(r#"{"loadType":"empty","data":{}}"#).unwrap();
        assert_eq!(empty.into_search_result().unwrap(), SearchResult::Empty);

        let error: LoadResult = serde_json::from_str(
            r#"{"loadType":"error","data":{"message":"blocked","severity":"common","cause":"403"}}"#,
        )
        .unwrap();
        assert!(error.into_search_result().is_err());
    }

    #[test]
    fn playlist_load_names_the_playlist() {
        let body = format!(
            r#"{{"loadType":"playlist","data":{{"info":{{"name":"Mix","selectedTrack":-1}},"pluginInfo":{{}},"tracks":[{TRACK_JSON}]}}}}"#
        );
        let result: LoadResult = serde_json::from_str(&body).unwrap();

        match result.into_search_result().unwrap() {
            SearchResult::Playlist { name, tracks } => {
                assert_eq!(name, "Mix");
                assert_eq!(tracks.len(), 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn track_end_event_becomes_backend_event() {
        let body = format!(
            r#"{{"op":"event","type":"TrackEndEvent","guildId":"123","track":{TRACK_JSON},"reason":"finished"}}"#
        );
        let incoming: IncomingMessage = serde_json::from_str(&body).unwrap();

        let IncomingMessage::Event(event) = incoming else {
            panic!("expected event");
        };
        assert_eq!(
            event.into_backend_event(),
            Some(BackendEvent::TrackEnded {
                guild_id: GuildId::new(123),
                encoded: "QAAAjQIAJFJpY2sgQXN0bGV5".into(),
                reason: EndReason::Finished,
            })
        );
    }

    #[test]
    fn stuck_and_exception_events() {
        let stuck = format!(
            r#"{{"op":"event","type":"TrackStuckEvent","guildId":"7","track":{TRACK_JSON},"thresholdMs":10000}}"#
        );
        let IncomingMessage::Event(event) = serde_json::from_str(&stuck).unwrap() else {
            panic!("expected event");
        };
        assert!(matches!(
            event.into_backend_event(),
            Some(BackendEvent::TrackStuck { threshold_ms: 10_000, .. })
        ));

        let exception = format!(
            r#"{{"op":"event","type":"TrackExceptionEvent","guildId":"7","track":{TRACK_JSON},"exception":{{"message":"boom","severity":"fault","cause":"io"}}}}"#
        );
        let IncomingMessage::Event(event) = serde_json::from_str(&exception).unwrap() else {
            panic!("expected event");
        };
        assert!(matches!(event.into_backend_event(), Some(BackendEvent::TrackErrored { .. })));
    }

    #[test]
    fn ready_and_unknown_ops() {
        let ready: IncomingMessage =
            serde_json::from_str(r#"{"op":"ready","resumed":false,"sessionId":"abc"}"#).unwrap();
        assert!(matches!(ready, IncomingMessage::Ready { ref session_id, .. } if session_id == "abc"));

        let stats: IncomingMessage =
            serde_json::from_str(r#"{"op":"stats","players":1,"playingPlayers":1}"#).unwrap();
        assert!(matches!(stats, IncomingMessage::Stats {}));

        let unknown: IncomingMessage = serde_json::from_str(r#"{"op":"somethingNew"}"#).unwrap();
        assert!(matches!(unknown, IncomingMessage::Unknown));
    }

    #[test]
    fn stop_serializes_null_track() {
        let update = UpdatePlayer {
            track: Some(UpdateTrack { encoded: None }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "track": { "encoded": null } })
        );
    }

    #[test]
    fn player_status_from_api() {
        let player: ApiPlayer =
            serde_json::from_str(&format!(r#"{{"track":{TRACK_JSON},"paused":true}}"#)).unwrap();
        assert_eq!(player.status(), PlayerStatus { playing: false, paused: true });

        let idle: ApiPlayer = serde_json::from_str(r#"{"track":null,"paused":false}"#).unwrap();
        assert!(idle.status().is_idle());
    }

    #[test]
    fn backoff_is_capped() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next(), Duration::from_secs(1));
        assert_eq!(backoff.next(), Duration::from_secs(2));
        for _ in 0..10 {
            backoff.next();
        }
        assert_eq!(backoff.next(), Duration::from_secs(32));
        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_secs(1));
    }
}
