use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;

/// An exchange rate observation for one day, multiplied with a foreign
/// amount to produce the local-currency equivalent.
/// A zero rate marks a day the markets published nothing (weekend, holiday);
/// see the rate loader for how those resolve.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DailyRate {
    pub date: Date,
    pub foreign_to_local_rate: Decimal,
}

impl DailyRate {
    pub fn new(date: Date, foreign_to_local_rate: Decimal) -> DailyRate {
        DailyRate {
            date,
            foreign_to_local_rate,
        }
    }
}

impl Display for DailyRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.date, self.foreign_to_local_rate)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::date;

    use super::DailyRate;

    #[test]
    fn test_display() {
        let rate = DailyRate::new(date!(2024 - 01 - 23), dec!(1.35));
        assert_eq!(rate.to_string(), "2024-01-23 : 1.35");
    }
}
