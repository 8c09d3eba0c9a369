mod apply;
mod fold;
mod superficial_loss;
mod tracker;

pub use apply::apply_tx;
pub use fold::{split_txs_by_security, txs_to_delta_list, DeltaListResult};
pub use superficial_loss::{
    first_day_in_sfl_period, last_day_in_sfl_period,
};
pub use tracker::AffiliateStatusTracker;
