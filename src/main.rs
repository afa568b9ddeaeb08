use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use trigger_bot::{
    audio::{lavalink::LavalinkNode, player::MusicPlayer, resolver::TrackResolver},
    bot::{settings::BotSettings, TriggerBot},
    config::Config,
    session::{FirstArrivalTrigger, PresenceReactor, SessionManager},
    storage::PlaylistStore,
    web,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trigger_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando trigger-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let songbird = Songbird::serenity();
    let user_id = Http::new(&config.discord_token).get_current_user().await?.id;

    // Nodo Lavalink, compartido como backend de reproducción y búsqueda
    let node = Arc::new(LavalinkNode::new(&config.lavalink, user_id, songbird.clone())?);
    let sessions = Arc::new(SessionManager::new(node.clone(), config.idle_disconnect));

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    tokio::spawn(node.clone().run(events_tx));
    let dispatcher = sessions.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            dispatcher.dispatch(event);
        }
    });

    let playlists = Arc::new(PlaylistStore::load(config.playlists_file.clone()).await);
    let resolver = TrackResolver::new(node.clone(), config.search_prefix.clone());
    let player = Arc::new(MusicPlayer::new(
        sessions.clone(),
        resolver,
        playlists,
        config.autoplay_playlist.clone(),
    ));

    let trigger: Arc<dyn FirstArrivalTrigger> = player.clone();
    let presence = PresenceReactor::new(sessions.clone(), Some(trigger));
    let settings = Arc::new(BotSettings::from_config(&config));

    let mut intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;
    if config.enable_message_content_intent {
        intents |= GatewayIntents::MESSAGE_CONTENT;
    }

    let handler = TriggerBot::new(config.clone(), settings, player, presence);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    if config.run_web {
        let port = config.port;
        tokio::spawn(async move {
            if let Err(e) = web::serve(port).await {
                error!("❌ Servidor keep-alive detenido: {:?}", e);
            }
        });
    }

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, saliendo de los canales de voz...");
        sessions.disconnect_all().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
