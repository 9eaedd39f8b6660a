use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Redirect},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::use_cases::{InitiatedPayment, ReservationRequest};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub success: bool,
    pub data: InitiatedPayment,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Base64-encoded JSON payload from the gateway.
    pub data: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/payments/esewa/initiate",
    request_body = ReservationRequest,
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Signed gateway form", body = InitiatePaymentResponse),
        (status = 400, description = "Missing or invalid booking fields"),
        (status = 401, description = "No authenticated user"),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "Vehicle unavailable for the requested dates"),
        (status = 500, description = "Gateway misconfigured or storage failure")
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let initiated = state.initiate.execute(user_id, request).await?;

    Ok(Json(InitiatePaymentResponse {
        success: true,
        data: initiated,
    }))
}

/// Browser lands here after paying (or not). Always answers with a redirect
/// to the frontend; errors never surface as an error page.
#[utoipa::path(
    get,
    path = "/api/payments/esewa/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend payment result page")
    ),
    tag = "Payments"
)]
pub async fn esewa_callback(
    State(state): State<AppState>,
    query: Option<Query<CallbackQuery>>,
) -> Redirect {
    let data = query.and_then(|Query(q)| q.data);
    let outcome = state.callback.execute(data.as_deref()).await;
    Redirect::to(&outcome.redirect_url(&state.gateway.frontend_url))
}
