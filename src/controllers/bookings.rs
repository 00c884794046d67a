use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

use crate::controllers::{api_error, booking_error, parse_seats, ApiError};
use crate::middleware::AuthUser;
use crate::models::{Booking, BookingStatus};
use crate::services::BookingRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/cancel", patch(cancel_booking))
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    id: String,
    showtime_id: String,
    movie_id: String,
    cinema_id: String,
    seats: Vec<String>,
    total_amount: i64,
    booking_date: DateTime<Utc>,
    status: BookingStatus,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            seats: booking.seat_labels(),
            id: booking.id,
            showtime_id: booking.showtime_id,
            movie_id: booking.movie_id,
            cinema_id: booking.cinema_id,
            total_amount: booking.total_amount,
            booking_date: booking.booking_date,
            status: booking.status,
        }
    }
}

/// Loads a booking and checks it belongs to the caller.
async fn owned_booking(state: &AppState, user: &AuthUser, booking_id: &str) -> Result<Booking, ApiError> {
    let booking = state.bookings.get(booking_id).await.map_err(booking_error)?;
    if booking.user_id != user.user_id {
        warn!("User {} tried to touch booking {} of another user", user.user_id, booking_id);
        return Err(api_error(StatusCode::FORBIDDEN, "Booking does not belong to you"));
    }
    Ok(booking)
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    showtime_id: String,
    movie_id: String,
    cinema_id: String,
    seats: Vec<String>,
    total_amount: i64,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Labels like "A1" become typed seats before the service sees them
    let seats = parse_seats(&req.showtime_id, &req.seats)?;
    let request = BookingRequest {
        showtime_id: req.showtime_id,
        movie_id: req.movie_id,
        cinema_id: req.cinema_id,
        seats,
        total_amount: req.total_amount,
    };

    let booking = state.bookings.create(&user, request).await.map_err(booking_error)?;
    // Seat map changed, drop the cached copy
    state.invalidate_seat_map(&booking.showtime_id).await;

    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let bookings = state
        .bookings
        .bookings_for_user(&user.user_id)
        .await
        .map_err(booking_error)?;

    let resp: Vec<BookingResponse> = bookings.into_iter().map(BookingResponse::from).collect();
    Ok((StatusCode::OK, Json(resp)))
}

// PATCH /api/bookings/cancel
#[derive(Debug, Deserialize, Validate)]
struct BookingActionRequest {
    #[validate(length(min = 1, message = "booking_id must not be empty"))]
    booking_id: String,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<BookingActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(|e| booking_error(e.into()))?;
    // Ownership check
    owned_booking(&state, &user, &req.booking_id).await?;

    let booking = state.bookings.cancel(&req.booking_id).await.map_err(booking_error)?;
    state.invalidate_seat_map(&booking.showtime_id).await;

    Ok((StatusCode::OK, Json(BookingResponse::from(booking))))
}
