use dotenv::dotenv;
use std::{env, sync::Arc};
use teloxide::{prelude::*, types::Message};
use tg_video_relay::{
    access::ChatRegistry,
    commands::{Command, Moderation},
    config::Config,
    download::{MediaFetcher, YtDlp},
    gateway::{IncomingMessage, TelegramGateway},
    handlers::SocialHandler,
    telemetry::setup_logger,
};
use tracing::{debug, error, info};

macro_rules! add_handler_if_enabled {
    ($handlers:expr, $feature:expr, $handler:expr) => {
        #[cfg(feature = $feature)]
        {
            if is_handler_enabled($feature) {
                $handlers.push(Arc::new($handler));
            }
        }
    };
}

struct App {
    gateway: Arc<TelegramGateway>,
    moderation: Moderation,
    handlers: Vec<Arc<dyn SocialHandler>>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenv().ok();
    let _log_guard = setup_logger()?;

    let config = Config::from_env();
    let registry = Arc::new(
        ChatRegistry::load(&config.allowed_chats_path, &config.blacklist_chats_path).await,
    );

    let bot = config.bot_token.clone().map_or_else(Bot::from_env, Bot::new);
    let gateway = Arc::new(TelegramGateway::new(bot.clone()));

    let mut handlers: Vec<Arc<dyn SocialHandler>> = Vec::new();

    add_handler_if_enabled!(
        handlers,
        "tiktok",
        tg_video_relay::handlers::TiktokHandler::new(
            fetcher(&config, config.tiktok.cookies_path.clone()),
            registry.clone(),
            &config.download_dir,
            config.cache_capacity,
        )
    );
    add_handler_if_enabled!(
        handlers,
        "instagram",
        tg_video_relay::handlers::InstagramHandler::new(
            fetcher(&config, config.instagram.cookies_path.clone()),
            registry.clone(),
            &config.download_dir,
            config.cache_capacity,
        )
        .with_direct_links(Arc::new(tg_video_relay::handlers::InstagramApi::new(
            &config.instagram
        )?))
    );
    add_handler_if_enabled!(
        handlers,
        "youtube",
        tg_video_relay::handlers::YouTubeShortsHandler::new(
            fetcher(&config, config.youtube.cookies_path.clone()),
            registry.clone(),
            &config.download_dir,
            config.cache_capacity,
        )
    );

    info!(
        handlers = ?handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
        "bot starting"
    );

    let app = Arc::new(App {
        gateway,
        moderation: Moderation::new(registry, config.auth_chat_id),
        handlers,
    });

    let schema = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(dptree::endpoint(on_text));

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn fetcher(config: &Config, cookies_path: Option<std::path::PathBuf>) -> Arc<dyn MediaFetcher> {
    Arc::new(YtDlp::new(&config.ytdlp_path, config.max_file_size).with_cookies(cookies_path))
}

async fn on_command(msg: Message, cmd: Command, app: Arc<App>) -> ResponseResult<()> {
    let Some(incoming) = IncomingMessage::from_message(&msg) else {
        return respond(());
    };
    if let Err(err) = app
        .moderation
        .answer(app.gateway.as_ref(), &incoming, cmd)
        .await
    {
        error!(%err, chat_id = %incoming.chat_id, "command failed");
    }
    respond(())
}

async fn on_text(msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let Some(incoming) = IncomingMessage::from_message(&msg) else {
        return respond(());
    };
    if incoming.text.starts_with('/') {
        return respond(());
    }

    if let Some(handler) = app
        .handlers
        .iter()
        .find(|h| h.try_extract(&incoming.text).is_some())
    {
        let handler = handler.clone();
        let gateway = app.gateway.clone();
        tokio::spawn(async move {
            let outcome = handler.handle(gateway.as_ref(), &incoming).await;
            debug!(handler = handler.name(), ?outcome, "message handled");
        });
    }
    respond(())
}

fn has_env(key: &str) -> bool {
    !matches!(env::var(key), Ok(val) if val.trim().eq_ignore_ascii_case("false"))
}

fn is_handler_enabled(handler_key: &str) -> bool {
    has_env(&handler_key.to_uppercase())
}
