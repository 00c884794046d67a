pub mod booking;
pub mod movie;
pub mod seat;
pub mod showtime;
pub mod user;

pub use booking::{Booking, BookingStatus, SeatClaim};
pub use movie::Movie;
pub use seat::{Seat, SeatRef, SeatRefError, SeatType};
pub use showtime::{Showtime, ShowtimeFormat};
pub use user::{MembershipTier, User};
