use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rental Core API",
        version = "0.1.0",
        description = "Payment-gated vehicle reservations backed by the eSewa ePay gateway."
    ),
    tags(
        (name = "Payments", description = "Payment initiation and gateway callback"),
        (name = "Bookings", description = "Committed bookings"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::esewa_callback,
        crate::handlers::bookings::get_booking,
        crate::handlers::health,
    ),
    components(
        schemas(
            crate::use_cases::ReservationRequest,
            crate::use_cases::InitiatedPayment,
            crate::payment::PaymentForm,
            crate::handlers::payments::InitiatePaymentResponse,
            crate::handlers::bookings::BookingResponse,
            crate::handlers::bookings::PickupLocationResponse,
            crate::health::HealthResponse,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
