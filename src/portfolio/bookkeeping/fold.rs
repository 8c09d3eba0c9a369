use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use crate::portfolio::model::errors::AcbError;
use crate::portfolio::{PortfolioSecurityStatus, Security, Tx, TxDelta};

use super::apply::apply_tx;
use super::tracker::AffiliateStatusTracker;

/// The outcome of folding one security's transactions. On error, `deltas`
/// holds everything computed before the failure, which is still useful for
/// diagnostics and partial rendering.
pub struct DeltaListResult {
    pub deltas: Vec<TxDelta>,
    pub error: Option<AcbError>,
}

impl DeltaListResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Folds the (pre-sorted) transactions of a single security into deltas.
/// Synthesized SfLA Txs are spliced in immediately after the SELL that
/// produced them, and processed on the following iterations.
pub fn txs_to_delta_list(
    txs: &[Tx],
    initial_status: Option<Rc<PortfolioSecurityStatus>>,
) -> DeltaListResult {
    let mut deltas = Vec::with_capacity(txs.len());
    if txs.is_empty() {
        return DeltaListResult {
            deltas,
            error: None,
        };
    }

    let mut tracker =
        AffiliateStatusTracker::new(txs[0].security.clone(), initial_status);

    // Only cloned if a splice actually happens.
    let mut active: Cow<[Tx]> = Cow::Borrowed(txs);

    let mut i = 0;
    while i < active.len() {
        let (delta, synthesized) = match apply_tx(i, active.as_ref(), &tracker)
        {
            Ok(res) => res,
            Err(e) => {
                return DeltaListResult {
                    deltas,
                    error: Some(e),
                }
            }
        };
        tracker
            .set_latest_post_status(&delta.tx.affiliate, delta.post_status.clone());
        deltas.push(delta);

        if !synthesized.is_empty() {
            let vec = active.to_mut();
            for (offset, synth_tx) in synthesized.into_iter().enumerate() {
                vec.insert(i + 1 + offset, synth_tx);
            }
        }
        i += 1;
    }

    DeltaListResult {
        deltas,
        error: None,
    }
}

pub fn split_txs_by_security(all_txs: Vec<Tx>) -> HashMap<Security, Vec<Tx>> {
    let mut txs_by_sec: HashMap<Security, Vec<Tx>> = HashMap::new();
    for tx in all_txs {
        txs_by_sec
            .entry(tx.security.clone())
            .or_default()
            .push(tx);
    }
    txs_by_sec
}
