use serenity::all::GatewayIntents;
use spectrum_warden::{BOT_NAME, Error, WardenConfig, handlers, logging};
use tracing::info;

/// Main function to run the warden
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load and validate configuration; a bad config never starts enforcement
    let config = WardenConfig::load()?;
    logging::log_console(format!(
        "{BOT_NAME} enforcing ban lists from {} for guild {}",
        config.banlist_dir.display(),
        config.guild_id
    ));

    // Membership join events require the privileged GUILD_MEMBERS intent
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let token = config.token.clone();
    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(handlers::Handler::new(config))
        .await?;

    // Ctrl-C shuts the shards down so start() returns; the reload task
    // listens for the same signal on its own.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting warden...");
    // Start the gateway connection
    if let Err(err) = client.start().await {
        eprintln!("Error starting the warden: {}", err);
    }

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime")
        .block_on(async_main());

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
