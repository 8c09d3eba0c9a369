use acbtally::fx::io::{InMemoryRatesCache, RateLoader, RemoteRateLoader, RemoteRateLoadResult};
use acbtally::util::basic::SError;
use acbtally::util::rw::{DescribedReader, WriteHandle};

pub const CSV_HEADER: &str =
    "security,trade date,settlement date,action,shares,amount/share,\
     commission,currency,exchange rate,commission currency,\
     commission exchange rate,superficial loss,affiliate,memo";

pub fn csv_reader(name: &str, rows: &[&str]) -> DescribedReader {
    let mut data = String::from(CSV_HEADER);
    for row in rows {
        data.push('\n');
        data.push_str(row);
    }
    DescribedReader::from_string(name.to_string(), data)
}

struct NoNetworkRemoteLoader;

impl RemoteRateLoader for NoNetworkRemoteLoader {
    fn get_remote_usd_cad_rates(
        &mut self,
        year: i32,
    ) -> Result<RemoteRateLoadResult, SError> {
        Err(format!("tests must not fetch rates (year {})", year))
    }
}

pub fn no_network_rate_loader() -> RateLoader {
    RateLoader::new(
        false,
        Box::new(InMemoryRatesCache::new()),
        Box::new(NoNetworkRemoteLoader),
        WriteHandle::empty_write_handle(),
    )
}
