//! Board coordinates: zero-based (file, rank) pairs with step arithmetic.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub file: i8,
    pub rank: i8,
}

impl Coord {
    #[inline]
    pub const fn new(file: i8, rank: i8) -> Self {
        Self { file, rank }
    }

    /// Per-component sign: the unit step pointing from the origin towards `self`.
    #[inline]
    pub fn signum(self) -> Coord {
        Coord::new(self.file.signum(), self.rank.signum())
    }

    /// Sum of absolute components.
    #[inline]
    pub fn manhattan(self) -> i8 {
        self.file.abs() + self.rank.abs()
    }

    #[inline]
    pub fn is_inside(self, width: u8, height: u8) -> bool {
        self.file >= 0 && self.rank >= 0 && (self.file as u8) < width && (self.rank as u8) < height
    }

    /// True when the delta is purely horizontal, vertical or diagonal.
    pub fn is_straight_line(self) -> bool {
        self.file == 0 || self.rank == 0 || self.file.abs() == self.rank.abs()
    }

    pub fn file_char(self) -> char {
        (b'a' + self.file as u8) as char
    }
}

impl Add for Coord {
    type Output = Coord;

    #[inline]
    fn add(self, rhs: Coord) -> Coord {
        Coord::new(self.file + rhs.file, self.rank + rhs.rank)
    }
}

impl AddAssign for Coord {
    #[inline]
    fn add_assign(&mut self, rhs: Coord) {
        self.file += rhs.file;
        self.rank += rhs.rank;
    }
}

impl Sub for Coord {
    type Output = Coord;

    #[inline]
    fn sub(self, rhs: Coord) -> Coord {
        Coord::new(self.file - rhs.file, self.rank - rhs.rank)
    }
}

impl Mul<i8> for Coord {
    type Output = Coord;

    #[inline]
    fn mul(self, rhs: i8) -> Coord {
        Coord::new(self.file * rhs, self.rank * rhs)
    }
}

impl Neg for Coord {
    type Output = Coord;

    #[inline]
    fn neg(self) -> Coord {
        Coord::new(-self.file, -self.rank)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank + 1)
    }
}

impl FromStr for Coord {
    type Err = CoordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(CoordParseError::InvalidFormat(s.to_string()));
        };
        if !('a'..='z').contains(&file) {
            return Err(CoordParseError::InvalidFile(file));
        }
        let rank = rank
            .to_digit(10)
            .filter(|r| *r >= 1)
            .ok_or(CoordParseError::InvalidRank(rank))?;
        Ok(Coord::new((file as u8 - b'a') as i8, rank as i8 - 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordParseError {
    #[error("Invalid square: {0}")]
    InvalidFormat(String),
    #[error("Invalid file: {0}")]
    InvalidFile(char),
    #[error("Invalid rank: {0}")]
    InvalidRank(char),
}
