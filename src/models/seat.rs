use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rows of the screen layout, front to back.
pub const ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];
pub const SEATS_PER_ROW: u8 = 10;
pub const TOTAL_SEATS: i64 = ROWS.len() as i64 * SEATS_PER_ROW as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Standard,
    Premium,
    Vip,
    Couple,
}

impl SeatType {
    /// Fixed row partition: A-B standard, C-E premium, F VIP, the rest couple seats.
    pub fn for_row(row: char) -> SeatType {
        match row {
            'A' | 'B' => SeatType::Standard,
            'C' | 'D' | 'E' => SeatType::Premium,
            'F' => SeatType::Vip,
            _ => SeatType::Couple,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatRefError {
    #[error("malformed seat id `{0}`")]
    Malformed(String),
    #[error("unknown row `{0}`")]
    UnknownRow(char),
    #[error("seat number {0} outside 1..={max}", max = SEATS_PER_ROW)]
    NumberOutOfRange(u8),
}

/// Structured seat identifier, persisted as `{showtime_id}_{row}_{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatRef {
    pub showtime_id: String,
    pub row: char,
    pub number: u8,
}

impl SeatRef {
    pub fn new(showtime_id: impl Into<String>, row: char, number: u8) -> Result<Self, SeatRefError> {
        if !ROWS.contains(&row) {
            return Err(SeatRefError::UnknownRow(row));
        }
        if number == 0 || number > SEATS_PER_ROW {
            return Err(SeatRefError::NumberOutOfRange(number));
        }
        Ok(Self { showtime_id: showtime_id.into(), row, number })
    }

    /// Parses a hall label such as `C5` for the given showtime.
    pub fn from_label(showtime_id: &str, label: &str) -> Result<Self, SeatRefError> {
        let mut chars = label.chars();
        let row = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| SeatRefError::Malformed(label.to_string()))?;
        let number = chars
            .as_str()
            .parse::<u8>()
            .map_err(|_| SeatRefError::Malformed(label.to_string()))?;
        Self::new(showtime_id, row, number)
    }

    /// Short label shown to customers, e.g. `A1`.
    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.number)
    }

    pub fn seat_type(&self) -> SeatType {
        SeatType::for_row(self.row)
    }
}

impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.showtime_id, self.row, self.number)
    }
}

impl FromStr for SeatRef {
    type Err = SeatRefError;

    // Split from the right: showtime ids may themselves contain underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SeatRefError::Malformed(s.to_string());
        let mut parts = s.rsplitn(3, '_');
        let number = parts.next().ok_or_else(malformed)?;
        let row = parts.next().ok_or_else(malformed)?;
        let showtime_id = parts.next().filter(|id| !id.is_empty()).ok_or_else(malformed)?;

        let mut row_chars = row.chars();
        let row = match (row_chars.next(), row_chars.next()) {
            (Some(row), None) => row,
            _ => return Err(malformed()),
        };
        let number = number.parse::<u8>().map_err(|_| malformed())?;
        SeatRef::new(showtime_id, row, number)
    }
}

impl TryFrom<String> for SeatRef {
    type Error = SeatRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatRef> for String {
    fn from(seat: SeatRef) -> Self {
        seat.to_string()
    }
}

/// A cell of a showtime's seat map. Synthesized on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatRef,
    pub row: char,
    pub number: u8,
    #[serde(rename = "type")]
    pub seat_type: SeatType,
    pub is_available: bool,
    /// Client-side selection state.
    #[serde(skip)]
    pub is_selected: bool,
}
