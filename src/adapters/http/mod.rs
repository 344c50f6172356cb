//! JSON API over [`DomainLogic`].
//!
//! Booking commands go through their `tower::Service` implementations. Catalog and reporting
//! endpoints call the domain logic directly.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    commands::{
        amend_booking::AmendBookingRequest,
        catalog::{MemberChanges, NewMember, NewPayment, NewSpace, PaymentChanges, SpaceChanges},
        propose_booking::ProposeBookingRequest,
        quote_booking::{QuoteBookingRequest, QuoteBookingResponse},
        report::DashboardSummary,
        DomainLogic,
    },
    domain::{ActivityLog, Booking, Member, Payment, Space},
    ports::{activity::ActivityPort, database::DatabasePort},
};

mod error;
mod requests;

pub use error::HttpError;
pub use requests::{ActivityQuery, CreateBookingApiRequest, UpdateBookingApiRequest};

/// Header naming the staff member behind a request
pub const ACTOR_HEADER: &str = "x-actor-id";
/// Header carrying the idempotency key of `POST /bookings`
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Storage the router can be built over
pub trait Database: DatabasePort + Send + Sync + 'static {}
impl<T: DatabasePort + Send + Sync + 'static> Database for T {}

/// Activity sink the router can be built over
pub trait Activity: ActivityPort + Send + Sync + 'static {}
impl<T: ActivityPort + Send + Sync + 'static> Activity for T {}

type HttpResult<T> = Result<T, HttpError>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn actor_id(headers: &HeaderMap) -> Option<String> {
    header(headers, ACTOR_HEADER)
}

/// Build the application router
pub fn router<D: Database, A: Activity>(logic: DomainLogic<D, A>) -> Router {
    Router::new()
        .route(
            "/bookings",
            get(list_bookings::<D, A>).post(create_booking::<D, A>),
        )
        .route("/bookings/quote", post(quote_booking::<D, A>))
        .route(
            "/bookings/{id}",
            get(get_booking::<D, A>).patch(update_booking::<D, A>),
        )
        .route("/bookings/{id}/cancel", post(cancel_booking::<D, A>))
        .route("/bookings/{id}/complete", post(complete_booking::<D, A>))
        .route(
            "/members",
            get(list_members::<D, A>).post(create_member::<D, A>),
        )
        .route(
            "/members/{id}",
            get(get_member::<D, A>).patch(update_member::<D, A>),
        )
        .route("/spaces", get(list_spaces::<D, A>).post(create_space::<D, A>))
        .route(
            "/spaces/{id}",
            get(get_space::<D, A>).patch(update_space::<D, A>),
        )
        .route(
            "/payments",
            get(list_payments::<D, A>).post(record_payment::<D, A>),
        )
        .route(
            "/payments/{id}",
            get(get_payment::<D, A>).patch(update_payment::<D, A>),
        )
        .route("/activity-logs", get(recent_activity::<D, A>))
        .route("/reports/summary", get(dashboard_summary::<D, A>))
        .with_state(logic)
}

// Bookings

async fn create_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingApiRequest>,
) -> HttpResult<(StatusCode, Json<Booking>)> {
    let cmd = req.into_command(actor_id(&headers), header(&headers, IDEMPOTENCY_HEADER));
    let res = ServiceExt::<ProposeBookingRequest>::oneshot(logic, cmd).await?;

    let status = if res.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(res.booking)))
}

async fn update_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateBookingApiRequest>,
) -> HttpResult<Json<Booking>> {
    let cmd = AmendBookingRequest {
        actor_id: actor_id(&headers),
        booking_id,
        changes: req.into(),
    };
    let booking = ServiceExt::<AmendBookingRequest>::oneshot(logic, cmd).await?;
    Ok(Json(booking))
}

async fn cancel_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
) -> HttpResult<Json<Booking>> {
    let cmd = AmendBookingRequest::cancel(booking_id, actor_id(&headers));
    let booking = ServiceExt::<AmendBookingRequest>::oneshot(logic, cmd).await?;
    Ok(Json(booking))
}

async fn complete_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
) -> HttpResult<Json<Booking>> {
    let cmd = AmendBookingRequest::complete(booking_id, actor_id(&headers));
    let booking = ServiceExt::<AmendBookingRequest>::oneshot(logic, cmd).await?;
    Ok(Json(booking))
}

async fn quote_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Json(req): Json<QuoteBookingRequest>,
) -> HttpResult<Json<QuoteBookingResponse>> {
    let quote = ServiceExt::<QuoteBookingRequest>::oneshot(logic, req).await?;
    Ok(Json(quote))
}

async fn list_bookings<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
) -> HttpResult<Json<Vec<Booking>>> {
    Ok(Json(logic.list_bookings().await?))
}

async fn get_booking<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(booking_id): Path<Uuid>,
) -> HttpResult<Json<Booking>> {
    Ok(Json(logic.get_booking(booking_id).await?))
}

// Members

async fn list_members<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
) -> HttpResult<Json<Vec<Member>>> {
    Ok(Json(logic.list_members().await?))
}

async fn get_member<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(member_id): Path<Uuid>,
) -> HttpResult<Json<Member>> {
    Ok(Json(logic.get_member(member_id).await?))
}

async fn create_member<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    headers: HeaderMap,
    Json(req): Json<NewMember>,
) -> HttpResult<(StatusCode, Json<Member>)> {
    let member = logic.create_member(actor_id(&headers), req).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(member_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<MemberChanges>,
) -> HttpResult<Json<Member>> {
    Ok(Json(
        logic
            .update_member(actor_id(&headers), member_id, req)
            .await?,
    ))
}

// Spaces

async fn list_spaces<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
) -> HttpResult<Json<Vec<Space>>> {
    Ok(Json(logic.list_spaces().await?))
}

async fn get_space<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(space_id): Path<Uuid>,
) -> HttpResult<Json<Space>> {
    Ok(Json(logic.get_space(space_id).await?))
}

async fn create_space<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    headers: HeaderMap,
    Json(req): Json<NewSpace>,
) -> HttpResult<(StatusCode, Json<Space>)> {
    let space = logic.create_space(actor_id(&headers), req).await?;
    Ok((StatusCode::CREATED, Json(space)))
}

async fn update_space<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(space_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SpaceChanges>,
) -> HttpResult<Json<Space>> {
    Ok(Json(
        logic.update_space(actor_id(&headers), space_id, req).await?,
    ))
}

// Payments

async fn list_payments<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
) -> HttpResult<Json<Vec<Payment>>> {
    Ok(Json(logic.list_payments().await?))
}

async fn get_payment<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(payment_id): Path<Uuid>,
) -> HttpResult<Json<Payment>> {
    Ok(Json(logic.get_payment(payment_id).await?))
}

async fn record_payment<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    headers: HeaderMap,
    Json(req): Json<NewPayment>,
) -> HttpResult<(StatusCode, Json<Payment>)> {
    let payment = logic.record_payment(actor_id(&headers), req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn update_payment<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Path(payment_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<PaymentChanges>,
) -> HttpResult<Json<Payment>> {
    Ok(Json(
        logic
            .update_payment(actor_id(&headers), payment_id, req)
            .await?,
    ))
}

// Activity and reports

async fn recent_activity<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
    Query(query): Query<ActivityQuery>,
) -> HttpResult<Json<Vec<ActivityLog>>> {
    Ok(Json(logic.recent_activity(query.limit).await?))
}

async fn dashboard_summary<D: Database, A: Activity>(
    State(logic): State<DomainLogic<D, A>>,
) -> HttpResult<Json<DashboardSummary>> {
    Ok(Json(logic.dashboard_summary().await?))
}
