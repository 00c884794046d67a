pub mod booked_seats;
pub mod booking;
pub mod cleanup;
pub mod lifecycle;
pub mod pricing;
pub mod seat_map;
pub mod showtimes;

pub use booked_seats::BookedSeatIndex;
pub use booking::{BookingRequest, BookingService};
pub use cleanup::{LifecycleSweeper, SweepReport};
pub use seat_map::generate_seat_map;
pub use showtimes::{NewShowtime, ShowtimeCatalog};
