mod domain;
mod handlers;
mod repo;
mod help;
mod metrics;
mod config;
mod commands;
mod scheduler;
mod coordinator;
mod messenger;

use std::env::VarError;
use std::net::SocketAddr;
use std::sync::Arc;
use futures::future::join_all;
use reqwest::Url;
use rust_i18n::i18n;
use teloxide::prelude::*;
use teloxide::dptree::deps;
use teloxide::update_listeners::webhooks::{axum_to_router, Options};
use teloxide::update_listeners::UpdateListener;
use crate::coordinator::AcknowledgmentCoordinator;
use crate::handlers::{checks, AnnounceCommands, HelpCommands};
use crate::messenger::TelegramMessenger;
use crate::scheduler::{ReminderScheduler, SystemClock};

const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";

i18n!(fallback = "en");    // load localizations with default parameters

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv()?;

    pretty_env_logger::init();

    let app_config = config::AppConfig::from_env()?;
    let database_config = config::DatabaseConfig::from_env()?;
    let db_conn = repo::establish_database_connection(&database_config).await?;

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<HelpCommands>().endpoint(handlers::help_cmd_handler))
        .branch(Update::filter_message().filter_command::<AnnounceCommands>().filter(checks::is_group_chat).endpoint(handlers::announce_cmd_handler))
        .branch(Update::filter_message().filter(checks::is_group_chat).endpoint(handlers::remember_sender_handler))
        .branch(Update::filter_message().filter(checks::is_not_group_chat).endpoint(checks::handle_not_group_chat))
        .branch(Update::filter_callback_query().filter(handlers::ack_callback_filter).endpoint(handlers::ack_callback_handler));

    let bot = Bot::from_env();
    bot.delete_webhook().await?;

    let set_my_commands_requests = _rust_i18n_available_locales()
        .into_iter()
        .map(|locale| commands::set_my_commands(&bot, locale));
    let set_my_commands_failed = join_all(set_my_commands_requests)
        .await
        .into_iter()
        .any(|res| res.is_err());
    if set_my_commands_failed {
        Err("couldn't set the bot's commands")?
    }

    let me = bot.get_me().await?;
    let repos = repo::Repositories::new(&db_conn);
    let help_container = help::render_help_messages(help::Context {
        bot_name: me.username().to_owned(),
        reminder_time: app_config.reminders.trigger.time_of_day(),
    })?;

    let reminder_scheduler = ReminderScheduler::new(Arc::new(SystemClock), app_config.reminders.poll_interval);
    let coordinator = Arc::new(AcknowledgmentCoordinator::new(
        Arc::new(repos.announcements.clone()),
        reminder_scheduler.clone(),
        Arc::new(TelegramMessenger::new(bot.clone())),
        app_config.reminders.trigger,
    ));
    if app_config.reminders.restore_on_startup {
        coordinator.restore_pending_reminders().await?;
    } else {
        log::warn!("pending reminders are not restored, they'll be lost until the recipients acknowledge");
    }
    reminder_scheduler.start(coordinator.clone())?;
    log::info!("Reminders are sent {}", app_config.reminders.trigger);

    let webhook_url: Option<Url> = match std::env::var(ENV_WEBHOOK_URL) {
        Ok(env_url) if !env_url.is_empty() => Some(env_url.parse()?),
        Ok(env_url) if env_url.is_empty() => None,
        Err(VarError::NotPresent) => None,
        _ => Err("invalid webhook URL!")?
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let metrics_router = metrics::init();

    let ignore_unknown_updates = |_| Box::pin(async {});
    let deps = deps![
        repos.users,
        coordinator,
        app_config,
        help_container
    ];

    let result = match webhook_url {
        Some(url) => {
            log::info!("Setting a webhook: {url}");

            let (mut listener, stop_flag, bot_router) = axum_to_router(bot.clone(), Options::new(addr, url)).await?;
            let stop_token = listener.stop_token();

            let error_handler = LoggingErrorHandler::with_custom_text("An error from the update listener");
            let mut dispatcher = Dispatcher::builder(bot, handler)
                .default_handler(ignore_unknown_updates)
                .dependencies(deps)
                .build();
            let bot_fut = dispatcher.dispatch_with_listener(listener, error_handler);

            let srv = tokio::spawn(async move {
                let tcp_listener = tokio::net::TcpListener::bind(addr)
                    .await
                    .map_err(|err| {
                        stop_token.stop();
                        err
                    })?;
                let app = axum::Router::new()
                    .merge(metrics_router)
                    .merge(bot_router);
                axum::serve(tcp_listener, app)
                    .with_graceful_shutdown(stop_flag)
                    .await
            });

            let (res, _) = futures::join!(srv, bot_fut);
            res
        }
        None => {
            log::info!("The polling dispatcher is activating...");

            let bot_fut = tokio::spawn(async move {
                Dispatcher::builder(bot, handler)
                    .default_handler(ignore_unknown_updates)
                    .dependencies(deps)
                    .enable_ctrlc_handler()
                    .build()
                    .dispatch()
                    .await
            });

            let srv = tokio::spawn(async move {
                let tcp_listener = tokio::net::TcpListener::bind(addr).await?;
                axum::serve(tcp_listener, metrics_router)
                    .with_graceful_shutdown(async {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            log::error!("failed to listen for the CTRL+C signal: {err}");
                        }
                        log::info!("Shutdown of the metrics server")
                    })
                    .await
            });

            let (res, _) = futures::join!(srv, bot_fut);
            res
        }
    };

    reminder_scheduler.stop().await;
    result?.map_err(Into::into)
}
