mod cors;
mod languages;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use api_access::{
    AccessResolver,
    services::webhook::{BillingWebhook, EntitlementEvents},
    store::{PgBillingStore, UsageCounter},
};
use api_chat::{
    feed::BroadcastFeed,
    mirror::ChatChannel,
    services::chat::{ChatService, PgMessageStore},
};
use api_translate::TranslationClient;
use common::{catalog::LanguageCatalog, env_config::Config, storage::SupabaseStorage};
use entitlements::EntitlementClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();

    // get info
    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();
    let jwt_config = config.jwt_config.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_level, &config.log_file).expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // access reconciliation
    let entitlement_client =
        EntitlementClient::new(&config.entitlements).expect("Failed to build entitlement client");
    let billing = PgBillingStore::new(pool.clone());
    let resolver = web::Data::new(AccessResolver::new(
        Arc::new(billing.clone()),
        Arc::new(entitlement_client.clone()),
        config.entitlements.entitlement_id.clone(),
        config.entitlements.timeout,
    ));
    let usage_counter: Arc<dyn UsageCounter> = Arc::new(billing.clone());
    let usage_counter = web::Data::from(usage_counter);
    let entitlement_events: Arc<dyn EntitlementEvents> = Arc::new(entitlement_client);
    let webhook = web::Data::new(BillingWebhook::new(
        config.stripe_webhook_secret.clone(),
        Arc::new(billing),
        entitlement_events.clone(),
    ));
    let entitlement_events = web::Data::from(entitlement_events);
    let usage_limits = web::Data::new(config.usage_limits.clone());

    // realtime chat relay
    let feed = BroadcastFeed::default();
    let listener = db::message::listen_inserts(&pool)
        .await
        .expect("Failed to listen for chat inserts");
    actix_web::rt::spawn(api_chat::relay::run_relay(
        listener,
        feed.clone(),
        config.chat_topic.clone(),
    ));
    let channel = web::Data::new(ChatChannel::new(Arc::new(feed), config.chat_topic.clone()));
    let storage = SupabaseStorage::new(&config.storage).expect("Failed to build storage client");
    let chat = web::Data::new(ChatService::new(
        Arc::new(PgMessageStore::new(pool.clone())),
        Arc::new(storage),
        config.storage.voice_bucket.clone(),
    ));

    // collaborators and reference data
    let translator = web::Data::new(
        TranslationClient::new(&config.translation).expect("Failed to build translation client"),
    );
    let catalog = web::Data::new(
        LanguageCatalog::load(config.language_catalog_path.as_deref())
            .expect("Failed to load language catalog"),
    );
    log::info!(
        "Serving {} languages, chat topic '{}'",
        catalog.all().len(),
        config.chat_topic
    );

    HttpServer::new(move || {
        App::new()
            .app_data(resolver.clone())
            .app_data(usage_counter.clone())
            .app_data(usage_limits.clone())
            .app_data(entitlement_events.clone())
            .app_data(webhook.clone())
            .app_data(channel.clone())
            .app_data(chat.clone())
            .app_data(translator.clone())
            .app_data(catalog.clone())
            .wrap(logger::middleware()) // 3rd
            .wrap(extractor::middleware(jwt_config.clone())) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_access::mount_access())
                    .service(api_access::mount_webhook())
                    .service(api_chat::mount_chat())
                    .service(api_translate::mount_translate())
                    .service(languages::get_languages)
                    .service(languages::get_language),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
