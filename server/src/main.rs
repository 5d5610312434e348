#[macro_use]
extern crate rocket;

mod entrypoints;

use std::sync::Arc;
use std::time::Duration;

use greenpoints_server::challenges::Challenges;
use greenpoints_server::events::Dispatcher;
use greenpoints_server::leaderboard::Leaderboard;
use greenpoints_server::ledger::{Ledger, DEFAULT_DEADLINE};
use greenpoints_server::storage::{PgStore, Store};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, serde::Deserialize)]
pub struct Env {
    database_url: String,
    ledger_timeout_in_seconds: Option<u64>,
}

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let env = envy::from_env::<Env>().expect("Failed to load environment variables");
    let deadline = env
        .ledger_timeout_in_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_DEADLINE);

    let store: Arc<dyn Store> = Arc::new(
        PgStore::connect(&env.database_url)
            .await
            .expect("Failed to connect to the database"),
    );
    let events = Dispatcher::new();

    let cors = rocket_cors::CorsOptions::default()
        .to_cors()
        .expect("Failed to configure CORS");

    rocket::build()
        .manage(Ledger::new(store.clone(), events.clone(), deadline))
        .manage(Challenges::new(store.clone(), events, deadline))
        .manage(Leaderboard::new(store, deadline))
        .attach(cors)
        .attach(entrypoints::stage())
}
