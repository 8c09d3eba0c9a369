use std::collections::HashMap;

use acbtally::app::input_parse::parse_initial_status;
use acbtally::app::approot::{
    run_acb_app_summary_to_model, run_acb_app_to_render_model, Options,
};
use acbtally::portfolio::io::tx_csv::write_txs_to_csv;
use acbtally::portfolio::RawTx;
use acbtally::util::date::testlib::doy_date;
use acbtally::util::date::set_todays_date_for_test;
use acbtally::util::rw::DescribedReader;

mod common;
use common::{csv_reader, no_network_rate_loader};

#[test]
fn test_full_pipeline_with_superficial_loss() {
    let readers = vec![csv_reader(
        "txs.csv",
        &[
            "FOO,2017-01-02,2017-01-03,Buy,100,10,,,,,,,,initial",
            "FOO,2017-02-01,2017-02-02,Sell,100,8,,,,,,,,the loss",
            "FOO,2017-02-10,2017-02-11,Buy,30,8,,,,,,,,rebuy",
        ],
    )];

    let res = run_acb_app_to_render_model(
        &readers,
        &HashMap::new(),
        &Options::default(),
        &mut no_network_rate_loader(),
    )
    .unwrap();

    let table = &res.security_tables["FOO"];
    assert!(table.errors.is_empty());
    // buy, sell, synthesized SfLA adjustment, rebuy
    assert_eq!(table.rows.len(), 4);
    assert_eq!(table.rows[1][3], "Sell");
    assert_eq!(table.rows[1][9], "-$140.00 *\n(SfL -$60.00; 30/100)");
    assert_eq!(table.rows[2][3], "SfLA");
    // The rebuy's ACB carries the disallowed loss: 30*8 + 60.
    assert_eq!(table.rows[3][12], "$300.00");

    // Footer total reflects only the allowed loss.
    assert_eq!(table.footer[9].split('\n').next().unwrap(), "-$140.00");
}

#[test]
fn test_pipeline_with_affiliates_and_currencies() {
    let readers = vec![csv_reader(
        "txs.csv",
        &[
            "FOO,2017-01-02,2017-01-03,Buy,10,10,,USD,1.3,,,,,",
            "FOO,2017-01-02,2017-01-03,Buy,20,10,,,,,,,My Spouse,",
            "FOO,2017-03-01,2017-03-02,Sell,10,15,,,,,,,My Spouse,",
        ],
    )];

    let res = run_acb_app_to_render_model(
        &readers,
        &HashMap::new(),
        &Options::default(),
        &mut no_network_rate_loader(),
    )
    .unwrap();

    let table = &res.security_tables["FOO"];
    assert!(table.errors.is_empty());
    assert_eq!(table.rows.len(), 3);
    // USD amounts render with their original value attached.
    assert_eq!(table.rows[0][4], "$130.00\n(100.00 USD)");
    // Cross-affiliate share balances render as "own / all".
    assert_eq!(table.rows[1][10], "20 / 30");
    assert_eq!(table.rows[1][14], "My Spouse");
    // Spouse's gain: 150 - 100
    assert_eq!(table.rows[2][9], "$50.00");
}

#[test]
fn test_initial_status_flag() {
    let init = parse_initial_status(&["FOO:20:100".to_string()]).unwrap();
    let readers = vec![csv_reader(
        "txs.csv",
        &["FOO,2017-01-02,2017-01-03,Sell,20,10,,,,,,,,"],
    )];

    let res = run_acb_app_to_render_model(
        &readers,
        &init,
        &Options::default(),
        &mut no_network_rate_loader(),
    )
    .unwrap();

    let table = &res.security_tables["FOO"];
    assert!(table.errors.is_empty());
    // Proceeds 200 against the seeded ACB of 100.
    assert_eq!(table.rows[0][9], "$100.00");
}

// Summaries written to CSV and replayed must reproduce the original
// positions.
#[test]
fn test_summary_csv_round_trip() {
    set_todays_date_for_test(doy_date(2020, 0));

    let rows = &[
        "FOO,2017-01-02,2017-01-03,Buy,100,10,5,,,,,,,",
        "FOO,2017-02-01,2017-02-02,Sell,50,12,3,,,,,,,",
        "BAR,2017-03-01,2017-03-02,Buy,10,5,,,,,,,My Spouse,",
    ];
    let readers = vec![csv_reader("txs.csv", rows)];

    let summary = run_acb_app_summary_to_model(
        doy_date(2019, 0),
        &readers,
        &HashMap::new(),
        &Options::default(),
        &mut no_network_rate_loader(),
    )
    .unwrap();

    assert_eq!(summary.txs.len(), 2);

    // Serialize the summary, re-read it, and run it through the app again.
    let raw_txs: Vec<RawTx> =
        summary.txs.into_iter().map(RawTx::from).collect();
    let mut csv_bytes = Vec::<u8>::new();
    write_txs_to_csv(&raw_txs, &mut csv_bytes).unwrap();
    let summary_reader = DescribedReader::from_string(
        "summary.csv".to_string(),
        String::from_utf8(csv_bytes).unwrap(),
    );

    let res = run_acb_app_to_render_model(
        &[summary_reader],
        &HashMap::new(),
        &Options::default(),
        &mut no_network_rate_loader(),
    )
    .unwrap();

    let foo = &res.security_tables["FOO"];
    assert!(foo.errors.is_empty());
    assert_eq!(foo.rows.len(), 1);
    // 50 shares at the original ACB of 502.50.
    assert_eq!(foo.rows[0][10], "50");
    assert_eq!(foo.rows[0][12], "$502.50");

    let bar = &res.security_tables["BAR"];
    assert_eq!(bar.rows[0][10], "10");
    assert_eq!(bar.rows[0][12], "$50.00");
    assert_eq!(bar.rows[0][14], "My Spouse");
}
