pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod openapi;
pub mod payment;
pub mod ports;
pub mod secrets;
pub mod services;
pub mod startup;
pub mod use_cases;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::health::HealthChecks;
use crate::payment::GatewayConfig;
use crate::ports::{BookingRepository, IntentStore, Notifier, UserRepository, VehicleRepository};
use crate::use_cases::{AvailabilityChecker, HandleCallback, InitiateReservation, MaterializeBooking};

/// Storage and collaborator implementations the app is wired with.
#[derive(Clone)]
pub struct Ports {
    pub bookings: Arc<dyn BookingRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub intents: Arc<dyn IntentStore>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<dyn BookingRepository>,
    pub initiate: InitiateReservation,
    pub callback: HandleCallback,
    pub gateway: Arc<GatewayConfig>,
    pub health: Arc<HealthChecks>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        ports: Ports,
        gateway: Arc<GatewayConfig>,
        enforce_payment_holds: bool,
        health: HealthChecks,
    ) -> Self {
        let availability = AvailabilityChecker::new(ports.bookings.clone());
        let initiate = InitiateReservation::new(
            ports.vehicles.clone(),
            availability,
            ports.intents.clone(),
            gateway.clone(),
            enforce_payment_holds,
        );
        let materializer = MaterializeBooking::new(
            ports.bookings.clone(),
            ports.vehicles,
            ports.users,
            ports.notifier,
        );
        let callback = HandleCallback::new(ports.intents, materializer, gateway.clone());

        Self {
            bookings: ports.bookings,
            initiate,
            callback,
            gateway,
            health: Arc::new(health),
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = match HeaderValue::from_str(&state.gateway.frontend_url) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(tower_http::cors::Any),
        Err(_) => CorsLayer::new(),
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/payments/esewa/initiate",
            post(handlers::payments::initiate_payment),
        )
        .route(
            payment::gateway::CALLBACK_PATH,
            get(handlers::payments::esewa_callback),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .with_state(state)
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
