use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ChecklistError;

/// Calendar quarter, 1 through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quarter(u32);

impl Quarter {
    pub fn new(quarter: u32) -> Result<Self, ChecklistError> {
        match quarter {
            1..=4 => Ok(Self(quarter)),
            other => Err(ChecklistError::InvalidQuarter(other)),
        }
    }

    pub fn of_month(month: u32) -> Result<Self, ChecklistError> {
        match month {
            1..=12 => Ok(Self((month - 1) / 3 + 1)),
            other => Err(ChecklistError::InvalidMonth(other)),
        }
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// The three months of the quarter, in calendar order.
    pub fn months(self) -> [u32; 3] {
        let first = (self.0 - 1) * 3 + 1;
        [first, first + 1, first + 2]
    }

    pub fn contains(self, month: u32) -> bool {
        self.months().contains(&month)
    }
}

impl TryFrom<u32> for Quarter {
    type Error = ChecklistError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quarter> for u32 {
    fn from(value: Quarter) -> Self {
        value.0
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// Reporting period. `month` always belongs to `quarter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    year: i32,
    quarter: Quarter,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, ChecklistError> {
        let quarter = Quarter::of_month(month)?;
        Ok(Self {
            year,
            quarter,
            month,
        })
    }

    pub fn current(date: NaiveDate) -> Self {
        let month = date.month();
        Self {
            year: date.year(),
            quarter: Quarter((month - 1) / 3 + 1),
            month,
        }
    }

    /// Moves the period to `quarter`. The month is kept when it already belongs
    /// to the new quarter, otherwise it snaps to the quarter's first month.
    pub fn with_quarter(self, quarter: Quarter) -> Self {
        let month = if quarter.contains(self.month) {
            self.month
        } else {
            quarter.months()[0]
        };
        Self {
            year: self.year,
            quarter,
            month,
        }
    }

    pub fn with_year(self, year: i32) -> Self {
        Self { year, ..self }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> Quarter {
        self.quarter
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.year,
            self.quarter,
            crate::util::month_label(self.month)
        )
    }
}
