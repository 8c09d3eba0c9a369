use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::fx::DailyRate;
use crate::util::basic::SError;
use crate::util::date::parse_standard_date;

/// Year-granular persistence for downloaded rates.
pub trait RatesCache {
    fn write_rates(&mut self, year: i32, rates: &[DailyRate])
        -> Result<(), SError>;
    /// Ok(None) when the year has never been cached.
    fn read_rates(&mut self, year: i32)
        -> Result<Option<Vec<DailyRate>>, SError>;
}

/// Stores one CSV file of `date,rate` rows per year, under a dot-directory
/// in the user's home.
pub struct CsvRatesCache {
    dir: PathBuf,
}

impl CsvRatesCache {
    pub fn new(home_dir: PathBuf) -> CsvRatesCache {
        CsvRatesCache {
            dir: home_dir.join(".acbtally"),
        }
    }

    fn file_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("usd-cad-rates-{}.csv", year))
    }
}

impl RatesCache for CsvRatesCache {
    fn write_rates(
        &mut self,
        year: i32,
        rates: &[DailyRate],
    ) -> Result<(), SError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            format!("Could not create {}: {}", self.dir.display(), e)
        })?;
        let path = self.file_path(year);
        let file = std::fs::File::create(&path)
            .map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        let mut csv_w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for rate in rates {
            csv_w
                .write_record(&[
                    rate.date.to_string(),
                    rate.foreign_to_local_rate.to_string(),
                ])
                .map_err(|e| e.to_string())?;
        }
        csv_w.flush().map_err(|e| e.to_string())
    }

    fn read_rates(
        &mut self,
        year: i32,
    ) -> Result<Option<Vec<DailyRate>>, SError> {
        let path = self.file_path(year);
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(e) => {
                return Err(format!("Could not open {}: {}", path.display(), e))
            }
        };

        let mut csv_r = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(file);
        let mut rates = Vec::new();
        for record in csv_r.records() {
            let record = record.map_err(|e| e.to_string())?;
            if record.len() < 2 {
                return Err(format!(
                    "Malformed rates cache line in {}",
                    path.display()
                ));
            }
            let date = parse_standard_date(&record[0])?;
            let rate = Decimal::from_str(record[1].trim())
                .map_err(|e| format!("Bad rate in cache: {}", e))?;
            rates.push(DailyRate::new(date, rate));
        }
        Ok(Some(rates))
    }
}

/// Cache for tests and the occasions where nothing should touch disk.
pub struct InMemoryRatesCache {
    pub rates_by_year: HashMap<i32, Vec<DailyRate>>,
}

impl InMemoryRatesCache {
    pub fn new() -> InMemoryRatesCache {
        InMemoryRatesCache {
            rates_by_year: HashMap::new(),
        }
    }
}

impl RatesCache for InMemoryRatesCache {
    fn write_rates(
        &mut self,
        year: i32,
        rates: &[DailyRate],
    ) -> Result<(), SError> {
        self.rates_by_year.insert(year, rates.to_vec());
        Ok(())
    }

    fn read_rates(
        &mut self,
        year: i32,
    ) -> Result<Option<Vec<DailyRate>>, SError> {
        Ok(self.rates_by_year.get(&year).cloned())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::fx::DailyRate;

    use super::{CsvRatesCache, InMemoryRatesCache, RatesCache};

    #[test]
    fn test_in_memory_cache() {
        let mut cache = InMemoryRatesCache::new();
        assert_eq!(cache.read_rates(2022).unwrap(), None);

        let rates = vec![DailyRate::new(date!(2022 - 01 - 04), dec!(1.27))];
        cache.write_rates(2022, &rates).unwrap();
        assert_eq!(cache.read_rates(2022).unwrap(), Some(rates));
    }

    #[test]
    fn test_csv_cache_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = CsvRatesCache::new(tmp.path().to_path_buf());

        assert_eq!(cache.read_rates(2022).unwrap(), None);

        let rates = vec![
            DailyRate::new(date!(2022 - 01 - 04), dec!(1.27)),
            DailyRate::new(date!(2022 - 01 - 05), dec!(0)),
        ];
        cache.write_rates(2022, &rates).unwrap();
        assert_eq!(cache.read_rates(2022).unwrap(), Some(rates));

        // Other years remain uncached.
        assert_eq!(cache.read_rates(2023).unwrap(), None);
    }
}
