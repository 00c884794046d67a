use std::collections::HashSet;

use crate::models::seat::{ROWS, SEATS_PER_ROW};
use crate::models::{Seat, SeatRef, SeatType};

/// Expands a showtime into its 8x10 seat grid, row by row, marking every seat
/// in `booked` unavailable.
///
/// The layout is the same for every screen, so the result depends only on the
/// showtime id and the booked set.
pub fn generate_seat_map(showtime_id: &str, booked: &HashSet<SeatRef>) -> Vec<Seat> {
    let mut seats = Vec::with_capacity(ROWS.len() * SEATS_PER_ROW as usize);
    for row in ROWS {
        for number in 1..=SEATS_PER_ROW {
            let id = SeatRef { showtime_id: showtime_id.to_string(), row, number };
            let is_available = !booked.contains(&id);
            seats.push(Seat {
                id,
                row,
                number,
                seat_type: SeatType::for_row(row),
                is_available,
                is_selected: false,
            });
        }
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_ids_are_deterministic() {
        let first = generate_seat_map("show123", &HashSet::new());
        let second = generate_seat_map("show123", &HashSet::new());
        assert_eq!(first, second);

        let c5 = first.iter().find(|s| s.row == 'C' && s.number == 5).unwrap();
        assert_eq!(c5.id.to_string(), "show123_C_5");
        assert_eq!(c5.seat_type, SeatType::Premium);
    }

    #[test]
    fn covers_the_whole_layout_in_order() {
        let seats = generate_seat_map("s1", &HashSet::new());
        assert_eq!(seats.len(), 80);
        assert_eq!(seats.first().unwrap().id.label(), "A1");
        assert_eq!(seats[10].id.label(), "B1");
        assert_eq!(seats.last().unwrap().id.label(), "H10");
        assert!(seats.iter().all(|s| s.is_available && !s.is_selected));
    }

    #[test]
    fn row_partition_assigns_types() {
        let seats = generate_seat_map("s1", &HashSet::new());
        let type_of = |label: &str| seats.iter().find(|s| s.id.label() == label).unwrap().seat_type;
        assert_eq!(type_of("B10"), SeatType::Standard);
        assert_eq!(type_of("E1"), SeatType::Premium);
        assert_eq!(type_of("F3"), SeatType::Vip);
        assert_eq!(type_of("G1"), SeatType::Couple);
        assert_eq!(type_of("H7"), SeatType::Couple);
    }

    #[test]
    fn booked_seats_are_unavailable() {
        let booked: HashSet<SeatRef> = ["s1_A_1", "s1_H_10", "other_A_2"]
            .iter()
            .map(|id| id.parse().unwrap())
            .collect();
        let seats = generate_seat_map("s1", &booked);

        let unavailable: Vec<String> = seats.iter().filter(|s| !s.is_available).map(|s| s.id.label()).collect();
        assert_eq!(unavailable, vec!["A1".to_string(), "H10".to_string()]);
    }
}
