use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use time::{Date, Duration, Month};

use crate::fx::DailyRate;
use crate::util::basic::SError;
use crate::util::date::today_local;
use crate::util::rw::WriteHandle;
use crate::write_errln;

use super::rates_cache::RatesCache;
use super::remote_rate_loader::RemoteRateLoader;

// Fills gaps in a year's daily rates with zeros, up to (but not including)
// today. Zero-marked days let the cache distinguish "looked up, markets were
// closed" from "not fetched yet".
fn fill_in_unknown_day_rates(rates: &[DailyRate], year: i32) -> Vec<DailyRate> {
    let mut filled: Vec<DailyRate> = Vec::with_capacity(366);
    let mut date_to_fill =
        Date::from_calendar_date(year, Month::January, 1).unwrap();
    for rate in rates {
        while date_to_fill < rate.date {
            filled.push(DailyRate::new(date_to_fill, Decimal::ZERO));
            date_to_fill = date_to_fill.saturating_add(Duration::days(1));
        }
        filled.push(rate.clone());
        date_to_fill = date_to_fill.saturating_add(Duration::days(1));
    }

    let today = today_local();
    while date_to_fill < today && date_to_fill.year() == year {
        filled.push(DailyRate::new(date_to_fill, Decimal::ZERO));
        date_to_fill = date_to_fill.saturating_add(Duration::days(1));
    }
    filled
}

/// Resolves "rate for USD on date D", loading (and caching) year batches
/// from the cache or the remote source as needed.
pub struct RateLoader {
    force_download: bool,
    year_rates: HashMap<i32, HashMap<Date, DailyRate>>,
    fresh_loaded_years: HashSet<i32>,
    cache: Box<dyn RatesCache>,
    remote: Box<dyn RemoteRateLoader>,
    err_stream: WriteHandle,
}

impl RateLoader {
    pub fn new(
        force_download: bool,
        cache: Box<dyn RatesCache>,
        remote: Box<dyn RemoteRateLoader>,
        err_stream: WriteHandle,
    ) -> RateLoader {
        RateLoader {
            force_download,
            year_rates: HashMap::new(),
            fresh_loaded_years: HashSet::new(),
            cache,
            remote,
            err_stream,
        }
    }

    /// The effective USD/CAD rate for a trade date. On days with no
    /// published rate (weekends, holidays), falls back to the most recent
    /// preceding rate, per the CRA's acceptance of the preceding business
    /// day's rate.
    pub fn get_effective_usd_cad_rate(
        &mut self,
        trade_date: Date,
    ) -> Result<DailyRate, SError> {
        let today = today_local();
        if trade_date >= today {
            return Err(format!(
                "No USD/CAD exchange rate is published yet for {}. Provide \
                 the exchange rate explicitly",
                trade_date
            ));
        }

        let year = trade_date.year();
        self.ensure_year_loaded(year)?;

        let mut date = trade_date;
        for _ in 0..7 {
            if let Some(rate) = self
                .year_rates
                .get(&date.year())
                .and_then(|rates| rates.get(&date))
            {
                if !rate.foreign_to_local_rate.is_zero() {
                    return Ok(rate.clone());
                }
            }
            date = date.saturating_sub(Duration::days(1));
            if date.year() != year {
                self.ensure_year_loaded(date.year())?;
            }
        }

        Err(format!(
            "Could not find a USD/CAD exchange rate for {} or the preceding \
             week",
            trade_date
        ))
    }

    fn ensure_year_loaded(&mut self, year: i32) -> Result<(), SError> {
        if self.year_rates.contains_key(&year) {
            return Ok(());
        }

        if !self.force_download {
            if let Some(rates) = self.read_cache(year)? {
                self.store_year(year, rates);
                return Ok(());
            }
        }

        let result = self.remote.get_remote_usd_cad_rates(year)?;
        for non_fatal in &result.non_fatal_errors {
            write_errln!(
                self.err_stream,
                "Warning: while fetching rates for {}: {}",
                year,
                non_fatal
            );
        }

        let filled = fill_in_unknown_day_rates(&result.rates, year);
        if let Err(e) = self.cache.write_rates(year, &filled) {
            write_errln!(
                self.err_stream,
                "Warning: could not cache rates for {}: {}",
                year,
                e
            );
        }
        self.fresh_loaded_years.insert(year);
        self.store_year(year, filled);
        Ok(())
    }

    // A cached year is usable if it extends far enough to cover every date
    // that could be asked of it: the end of the year, or yesterday for the
    // current year. Otherwise it is stale and must be re-fetched.
    fn read_cache(&mut self, year: i32) -> Result<Option<Vec<DailyRate>>, SError> {
        let rates = match self.cache.read_rates(year) {
            Ok(Some(rates)) => rates,
            Ok(None) => return Ok(None),
            Err(e) => {
                write_errln!(
                    self.err_stream,
                    "Warning: could not read rates cache for {}: {}",
                    year,
                    e
                );
                return Ok(None);
            }
        };

        let latest_cached = match rates.last() {
            Some(rate) => rate.date,
            None => return Ok(None),
        };
        let today = today_local();
        let needed_through = if year < today.year() {
            Date::from_calendar_date(year, Month::December, 31).unwrap()
        } else {
            today.saturating_sub(Duration::days(1))
        };
        if latest_cached < needed_through {
            return Ok(None);
        }
        Ok(Some(rates))
    }

    fn store_year(&mut self, year: i32, rates: Vec<DailyRate>) {
        let by_date: HashMap<Date, DailyRate> =
            rates.into_iter().map(|r| (r.date, r)).collect();
        self.year_rates.insert(year, by_date);
    }
}
