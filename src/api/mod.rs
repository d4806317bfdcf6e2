pub mod actor;
pub mod contributions;
pub mod events;
pub mod health;
pub mod payouts;
pub mod views;
pub mod webhooks;

use crate::config::Config;
use crate::db::Repository;
use crate::directory::Directory;
use crate::ledger::{ContributionLedger, EventRegistry, PayoutManager, SettlementReconciler};
use crate::processor::PaymentProcessor;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub events: EventRegistry,
    pub contributions: ContributionLedger,
    pub payouts: PayoutManager,
    pub reconciler: SettlementReconciler,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        directory: Arc<dyn Directory>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let events = EventRegistry::new(repo.clone(), directory.clone());
        let contributions =
            ContributionLedger::new(repo.clone(), directory.clone(), processor.clone());
        let payouts = PayoutManager::new(repo.clone(), directory, processor);
        let reconciler = SettlementReconciler::new(contributions.clone(), payouts.clone());

        Self {
            repo,
            config,
            events,
            contributions,
            payouts,
            reconciler,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/events", post(events::schedule_event))
        .route("/v1/events/:id", get(events::get_event))
        .route(
            "/v1/events/:id/contributions",
            get(contributions::list_contributions),
        )
        .route(
            "/v1/events/:id/contributions/ensure",
            post(contributions::list_contributions),
        )
        .route(
            "/v1/contributions/:id/checkout",
            post(contributions::begin_checkout),
        )
        .route(
            "/v1/contributions/:id/manual",
            post(contributions::apply_manual).delete(contributions::undo_manual),
        )
        .route(
            "/v1/events/:id/payouts",
            post(payouts::request_payout).get(payouts::list_event_payouts),
        )
        .route(
            "/v1/organizers/:id/payouts",
            get(payouts::list_organizer_payouts),
        )
        .route("/v1/groups/:id/events", delete(events::delete_group_events))
        .route("/v1/webhooks/processor", post(webhooks::processor_webhook))
        .layer(cors)
        .with_state(state)
}
