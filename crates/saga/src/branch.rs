//! The three branches of a trip and their operations.

use serde::{Deserialize, Serialize};

use crate::names::{
    BOOK_CAR, BOOK_FLIGHT, BOOK_HOTEL, BookOperation, CANCEL_CAR_BOOKING, CANCEL_FLIGHT_BOOKING,
    CANCEL_HOTEL_BOOKING, CancelOperation,
};

/// Which resource a branch books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripBranch {
    Car,
    Hotel,
    Flight,
}

impl TripBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripBranch::Car => "car",
            TripBranch::Hotel => "hotel",
            TripBranch::Flight => "flight",
        }
    }

    /// Returns the branch whose booking or cancellation activity has this name.
    pub fn for_activity(activity_type: &str) -> Option<Self> {
        BRANCHES
            .iter()
            .find(|b| b.book.name() == activity_type || b.cancel.name() == activity_type)
            .map(|b| b.kind)
    }
}

impl std::fmt::Display for TripBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TripBranch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(TripBranch::Car),
            "hotel" => Ok(TripBranch::Hotel),
            "flight" => Ok(TripBranch::Flight),
            other => Err(format!("unknown trip branch '{other}'")),
        }
    }
}

/// A booking operation paired with the operation that undoes it.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    pub kind: TripBranch,
    pub book: BookOperation,
    pub cancel: CancelOperation,
}

/// Every branch, in dispatch order.
pub const BRANCHES: [Branch; 3] = [
    Branch {
        kind: TripBranch::Car,
        book: BOOK_CAR,
        cancel: CANCEL_CAR_BOOKING,
    },
    Branch {
        kind: TripBranch::Hotel,
        book: BOOK_HOTEL,
        cancel: CANCEL_HOTEL_BOOKING,
    },
    Branch {
        kind: TripBranch::Flight,
        book: BOOK_FLIGHT,
        cancel: CANCEL_FLIGHT_BOOKING,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branches_are_ordered_car_hotel_flight() {
        let kinds: Vec<_> = BRANCHES.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![TripBranch::Car, TripBranch::Hotel, TripBranch::Flight]);
    }

    #[test]
    fn branch_for_activity() {
        assert_eq!(TripBranch::for_activity("book-hotel"), Some(TripBranch::Hotel));
        assert_eq!(
            TripBranch::for_activity("cancel-flight-booking"),
            Some(TripBranch::Flight)
        );
        assert_eq!(TripBranch::for_activity("book-trip"), None);
    }

    #[test]
    fn parses_branch_names() {
        assert_eq!(" Car ".parse::<TripBranch>(), Ok(TripBranch::Car));
        assert!("boat".parse::<TripBranch>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TripBranch::Flight).unwrap(),
            serde_json::json!("flight")
        );
    }
}
