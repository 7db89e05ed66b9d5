mod classifier;
mod config;
mod nya;
mod pictures;
mod replies;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{BotCommand, InlineQuery, InputFile, ReplyParameters};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;

use classifier::classify;
use config::Config;

struct BotState {
    config: Config,
    /// Our own username, for matching `/command@botname` addressing.
    bot_username: Option<String>,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "nyabot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.storage.base_path.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("nyabot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting nyabot...");
    info!("Loaded config from {config_path}");
    let hidden = config.categories.iter().filter(|(_, c)| c.hidden).count();
    let nsfw = config.categories.iter().filter(|(_, c)| c.nsfw).count();
    info!("{} categories ({hidden} hidden, {nsfw} nsfw)", config.categories.len());
    if config.categories.is_empty() {
        warn!("No categories configured, the bot will only answer to nya");
    }
    info!("Admin chats: {:?}", config.bot.admin_chats);
    let source_count: usize = config.categories.iter().map(|(_, c)| c.sources.len()).sum();
    debug!(
        "Userbot parser: app {} with {} account(s), {source_count} picture source(s)",
        config.parser.app_id,
        config.parser.accounts.len()
    );
    debug!("Redis at {} (key prefix {:?})", config.redis.url(), config.redis.key_prefix);

    let mut bot = Bot::new(&config.bot.token);
    if let Some(api_url) = config.bot.api_url.clone() {
        info!("Using local Bot API server at {api_url}");
        bot = bot.set_api_url(api_url);
    }

    // Get bot info
    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            None
        }
    };

    register_command_menu(&bot, &config).await;

    let state = Arc::new(BotState { config, bot_username });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_inline_query().endpoint(handle_inline_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Publish non-hidden categories as the bot's command menu.
async fn register_command_menu(bot: &Bot, config: &Config) {
    let commands: Vec<BotCommand> = config
        .categories
        .visible()
        .map(|(name, _)| BotCommand::new(name.to_lowercase(), format!("a random {name} picture")))
        .collect();
    if commands.is_empty() {
        return;
    }
    let count = commands.len();
    match bot.set_my_commands(commands).await {
        Ok(_) => info!("Registered {count} command(s) in the menu"),
        Err(e) => warn!("Failed to register command menu: {e}"),
    }
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };

    // The easter egg runs first: a category-matching message that also says
    // nya can still get a kaomoji instead of a picture.
    let triggered = {
        let mut rng = rand::thread_rng();
        nya::is_nya(text, &mut rng)
    };
    if triggered {
        let reply = {
            let mut rng = rand::thread_rng();
            replies::kaomoji(&mut rng)
        };
        bot.send_message(msg.chat.id, reply).await?;
        return Ok(());
    }

    let Some(matched) = classify(text, state.bot_username.as_deref(), &state.config.categories)
    else {
        return Ok(());
    };
    debug!("Message matched category {:?} via {:?}", matched.name, matched.via);

    let Some(pic) = pictures::random_picture(&state.config.storage, matched.name).await else {
        // Hidden categories get this fallback too; hidden only affects the menu.
        bot.send_message(msg.chat.id, replies::no_pictures_text(matched.name))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    };

    let Some(url) = replies::picture_url(&state.config.storage.url, matched.name, &pic) else {
        warn!("Could not build a URL for {}/{pic}", matched.name);
        return Ok(());
    };
    let caption = {
        let mut rng = rand::thread_rng();
        replies::pick_caption(matched.category, &mut rng).to_owned()
    };
    info!("Sending picture {url}");
    bot.send_photo(msg.chat.id, InputFile::url(url))
        .caption(caption)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

async fn handle_inline_query(
    bot: Bot,
    query: InlineQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let results = replies::inline_results(&state.config).await;
    debug!("Answering inline query {:?} with {} result(s)", query.id, results.len());
    bot.answer_inline_query(query.id, results)
        .cache_time(1)
        .is_personal(true)
        .await?;
    Ok(())
}
