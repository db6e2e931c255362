//! Events published by the reservation service into `reservation-events`

/// Table has been reserved
pub const CREATED: &str = "reservation.created";
/// Reservation has been confirmed by the restaurant
pub const CONFIRMED: &str = "reservation.confirmed";
/// Reservation has been cancelled
pub const CANCELLED: &str = "reservation.cancelled";
/// Guests have left after their visit
pub const COMPLETED: &str = "reservation.completed";
/// Guests did not show up
pub const NO_SHOW: &str = "reservation.no_show";
/// Time, party size or table of a reservation changed
pub const UPDATED: &str = "reservation.updated";

/// Every event type of the reservation context
pub const ALL: [&str; 6] = [CREATED, CONFIRMED, CANCELLED, COMPLETED, NO_SHOW, UPDATED];
