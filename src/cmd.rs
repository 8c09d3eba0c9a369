use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::app::input_parse::parse_initial_status;
use crate::app::{run_acb_app_to_console, Options};
use crate::fx::io::{BankOfCanadaRateLoader, CsvRatesCache, RateLoader};
use crate::portfolio::csv_common::CsvCol;
use crate::portfolio::io::tx_csv::TxCsvParseOptions;
use crate::util::date::{parse_dyn_date_format, parse_standard_date};
use crate::util::rw::{DescribedReader, WriteHandle};
use crate::write_errln;

const ABOUT: &str = "Adjusted cost base (ACB) and capital gains calculator";

fn get_long_about() -> String {
    format!(
        "\
Computes adjusted cost bases (ACBs) and capital gains from a history of
stock or fund transactions, applying the superficial-loss rule across
multiple affiliated accounts.

Transactions in USD can have their exchange rates downloaded automatically,
or rates may be provided per-transaction.

Each CSV provided should contain a header with these column names:
{}
Non-essential columns like currencies and exchange rates are optional.

Exchange rates are always multiplied with the given amount to produce the
equivalent value in the default (local) currency.",
        CsvCol::export_order_cols().join(", ")
    )
}

#[derive(Parser, Debug)]
#[command(version = crate::app::APP_VERSION,
          about = ABOUT, long_about = get_long_about())]
pub struct Args {
    #[arg(required = true)]
    csv_files: Vec<String>,

    /// Print verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Download exchange rates, even if they are cached
    #[arg(short, long, default_value_t = false)]
    pub force_download: bool,

    /// Format of how dates appear in the csv file.
    /// The default is "[year]-[month]-[day]".
    #[arg(long)]
    pub date_fmt: Option<String>,

    /// Base amount of each security at the start of the transaction history,
    /// as SYMBOL:nShares:totalAcb. Eg. GOOG:20:1000.00 . May be provided
    /// multiple times.
    #[arg(short = 'b', long)]
    pub initial_status: Vec<String>,

    /// Print all digits in output values
    #[arg(long, default_value_t = false)]
    pub print_full_values: bool,

    /// Generate a summary CSV for transactions before the provided date
    /// (YYYY-MM-DD format). (--help for more)
    ///
    /// You should include all transactions made up to the present for an
    /// accurate summary.
    #[arg(long)]
    pub summarize_before: Option<String>,

    /// Summary will include transactions which represent annual capital
    /// gains/losses.
    ///
    /// Only valid with --summarize-before.
    #[arg(long, default_value_t = false)]
    pub summarize_annual_gains: bool,

    /// Write output as CSV files to the specified directory.
    #[arg(short = 'd', long)]
    pub csv_output_dir: Option<String>,
}

pub fn command_main() -> Result<(), ExitCode> {
    crate::tracing::setup_tracing();

    let args = Args::parse();

    if args.verbose {
        crate::log::set_verbose(true);
    }

    let mut err_printer = WriteHandle::stderr_write_handle();

    let csv_readers: Vec<DescribedReader> = args
        .csv_files
        .iter()
        .map(|name| DescribedReader::from_file_path(PathBuf::from(name)))
        .collect();

    let csv_parse_options = TxCsvParseOptions {
        date_format: match &args.date_fmt {
            Some(fmt) => match parse_dyn_date_format(fmt) {
                Ok(f) => Some(f),
                Err(e) => {
                    write_errln!(err_printer, "Error parsing --date-fmt: {}", e);
                    return Err(ExitCode::FAILURE);
                }
            },
            None => None,
        },
    };

    let summary_mode_latest_date = match &args.summarize_before {
        Some(date_str) => match parse_standard_date(date_str) {
            Ok(d) => Some(d),
            Err(e) => {
                write_errln!(err_printer, "Error parsing --summarize-before: {}", e);
                return Err(ExitCode::FAILURE);
            }
        },
        None => None,
    };

    let all_init_status = match parse_initial_status(&args.initial_status) {
        Ok(statuses) => statuses,
        Err(e) => {
            write_errln!(err_printer, "Error: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let options = Options {
        render_full_dollar_values: args.print_full_values,
        summary_mode_latest_date,
        split_annual_summary_gains: args.summarize_annual_gains,
        csv_output_dir: args.csv_output_dir,
        csv_parse_options,
    };

    let home_dir = match crate::util::os::home_dir_path() {
        Ok(d) => d,
        Err(e) => {
            write_errln!(
                err_printer,
                "Unable to determine user home directory: {}",
                e
            );
            return Err(ExitCode::FAILURE);
        }
    };

    let rate_loader = RateLoader::new(
        args.force_download,
        Box::new(CsvRatesCache::new(home_dir)),
        BankOfCanadaRateLoader::new_boxed(),
        err_printer.clone(),
    );

    run_acb_app_to_console(
        &csv_readers,
        &all_init_status,
        options,
        rate_loader,
        err_printer,
    )
    .map_err(|_| ExitCode::FAILURE)
}
