use std::collections::HashMap;
use std::rc::Rc;

use num_rational::BigRational;
use num_traits::Zero;

use crate::portfolio::{Affiliate, PortfolioSecurityStatus, Security};
use crate::util::decimal::NullableDecimal;

/// Tracks the most recent post-Tx status of every affiliate for a single
/// security, plus the share total across all of them.
///
/// The caller alternates next_pre_status / set_latest_post_status as it
/// walks the transaction stream.
pub struct AffiliateStatusTracker {
    last_post_status: HashMap<Affiliate, Rc<PortfolioSecurityStatus>>,
    security: Security,
    latest_all_affiliates_share_balance: BigRational,
    latest_affiliate: Affiliate,
}

impl AffiliateStatusTracker {
    /// An initial status may only be provided for the default affiliate, and
    /// must have share_balance == all_affiliates_share_balance (anything else
    /// would imply prior transactions existed, making it non-initial).
    pub fn new(
        security: Security,
        initial_default_status: Option<Rc<PortfolioSecurityStatus>>,
    ) -> AffiliateStatusTracker {
        let mut tracker = AffiliateStatusTracker {
            last_post_status: HashMap::new(),
            security,
            latest_all_affiliates_share_balance: BigRational::zero(),
            latest_affiliate: Affiliate::default(),
        };
        if let Some(init) = initial_default_status {
            assert_eq!(
                init.share_balance, init.all_affiliates_share_balance,
                "initial status share balances do not match"
            );
            tracker.set_latest_post_status(&Affiliate::default(), init);
        }
        tracker
    }

    fn fresh_status(&self, af: &Affiliate) -> PortfolioSecurityStatus {
        PortfolioSecurityStatus {
            security: self.security.clone(),
            share_balance: BigRational::zero(),
            all_affiliates_share_balance: self
                .latest_all_affiliates_share_balance
                .clone(),
            total_acb: if af.registered() {
                NullableDecimal::NULL
            } else {
                NullableDecimal::zero()
            },
        }
    }

    pub fn latest_post_status_for(
        &self,
        af: &Affiliate,
    ) -> Option<&Rc<PortfolioSecurityStatus>> {
        self.last_post_status.get(af)
    }

    /// The status most recently written, for whichever affiliate wrote it.
    /// A fresh zero status if nothing has been written yet.
    pub fn latest_post_status(&self) -> Rc<PortfolioSecurityStatus> {
        match self.latest_post_status_for(&self.latest_affiliate) {
            Some(st) => st.clone(),
            None => Rc::new(self.fresh_status(&self.latest_affiliate)),
        }
    }

    /// The status an affiliate's next Tx starts from: its last post-status,
    /// with the cross-affiliate share total refreshed if another affiliate
    /// has transacted since.
    pub fn next_pre_status(&self, af: &Affiliate) -> Rc<PortfolioSecurityStatus> {
        let last = match self.latest_post_status_for(af) {
            Some(st) => st.clone(),
            None => Rc::new(self.fresh_status(af)),
        };
        if last.all_affiliates_share_balance
            == self.latest_all_affiliates_share_balance
        {
            last
        } else {
            let mut refreshed = (*last).clone();
            refreshed.all_affiliates_share_balance =
                self.latest_all_affiliates_share_balance.clone();
            Rc::new(refreshed)
        }
    }

    /// Panics if the new status violates the cross-affiliate share-balance
    /// invariant, or carries an ACB inconsistent with the affiliate's
    /// registered state. Both indicate bugs in the applier.
    pub fn set_latest_post_status(
        &mut self,
        af: &Affiliate,
        status: Rc<PortfolioSecurityStatus>,
    ) {
        let last_share_balance = match self.last_post_status.get(af) {
            Some(st) => st.share_balance.clone(),
            None => BigRational::zero(),
        };
        let expected_all = &status.share_balance
            + &self.latest_all_affiliates_share_balance
            - &last_share_balance;

        assert_eq!(
            af.registered(),
            status.total_acb.is_null(),
            "in security {}, affiliate {}: total_acb has bad value ({:#?})",
            self.security,
            af.name(),
            status.total_acb
        );
        assert_eq!(
            status.all_affiliates_share_balance,
            expected_all,
            "in security {}, affiliate {}: all-affiliate share balance {} != \
             expected {}",
            self.security,
            af.name(),
            status.all_affiliates_share_balance,
            expected_all
        );

        self.latest_all_affiliates_share_balance =
            status.all_affiliates_share_balance.clone();
        self.last_post_status.insert(af.clone(), status);
        self.latest_affiliate = af.clone();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::portfolio::testlib::{default_sec, TStat};
    use crate::portfolio::Affiliate;
    use crate::testlib::assert_big_struct_eq;
    use crate::util::rational::testlib::rat;

    use super::AffiliateStatusTracker;

    #[test]
    fn test_empty_tracker() {
        let tracker = AffiliateStatusTracker::new(default_sec(), None);
        assert!(tracker
            .latest_post_status_for(&Affiliate::default())
            .is_none());

        let latest = tracker.latest_post_status();
        assert_big_struct_eq(
            latest,
            TStat { shares: rat("0"), acb: Some(dec!(0)), ..TStat::d() }.x(),
        );

        // Registered affiliates start with a null ACB.
        let pre = tracker.next_pre_status(&Affiliate::default_registered());
        assert_big_struct_eq(
            pre,
            TStat { shares: rat("0"), acb: None, ..TStat::d() }.x(),
        );
    }

    #[test]
    fn test_initial_status() {
        let init =
            TStat { shares: rat("12"), acb: Some(dec!(24)), ..TStat::d() }.x();
        let tracker =
            AffiliateStatusTracker::new(default_sec(), Some(init.clone()));
        assert_big_struct_eq(
            tracker
                .latest_post_status_for(&Affiliate::default())
                .unwrap()
                .clone(),
            init.clone(),
        );
        assert_big_struct_eq(tracker.latest_post_status(), init);
    }

    #[test]
    #[should_panic]
    fn test_unbalanced_initial_status_panics() {
        let init = TStat {
            shares: rat("12"),
            all_shares: Some(rat("14")),
            acb: Some(dec!(24)),
            ..TStat::d()
        }
        .x();
        AffiliateStatusTracker::new(default_sec(), Some(init));
    }

    #[test]
    fn test_cross_affiliate_updates() {
        let af_b = Affiliate::from_label("B");
        let default_af = Affiliate::default();

        let mut tracker = AffiliateStatusTracker::new(default_sec(), None);

        // Default buys 3
        tracker.set_latest_post_status(
            &default_af,
            TStat { shares: rat("3"), acb: Some(dec!(6)), ..TStat::d() }.x(),
        );

        // B's pre-status picks up the global total
        let pre = tracker.next_pre_status(&af_b);
        assert_big_struct_eq(
            pre,
            TStat {
                shares: rat("0"),
                all_shares: Some(rat("3")),
                acb: Some(dec!(0)),
                ..TStat::d()
            }
            .x(),
        );

        // B buys 12
        tracker.set_latest_post_status(
            &af_b,
            TStat {
                shares: rat("12"),
                all_shares: Some(rat("15")),
                acb: Some(dec!(24)),
                ..TStat::d()
            }
            .x(),
        );

        // Default's own balance is unchanged; the total is refreshed.
        let pre = tracker.next_pre_status(&default_af);
        assert_big_struct_eq(
            pre,
            TStat {
                shares: rat("3"),
                all_shares: Some(rat("15")),
                acb: Some(dec!(6)),
                ..TStat::d()
            }
            .x(),
        );

        let latest = tracker.latest_post_status();
        assert_eq!(latest.share_balance, rat("12"));
        assert_eq!(latest.all_affiliates_share_balance, rat("15"));
    }

    #[test]
    #[should_panic]
    fn test_bad_all_share_balance_panics() {
        let af_b = Affiliate::from_label("B");
        let mut tracker = AffiliateStatusTracker::new(
            default_sec(),
            Some(TStat { shares: rat("12"), acb: Some(dec!(24)), ..TStat::d() }.x()),
        );
        // all_shares should be 14 here, not 2.
        tracker.set_latest_post_status(
            &af_b,
            TStat {
                shares: rat("2"),
                all_shares: Some(rat("2")),
                acb: Some(dec!(4)),
                ..TStat::d()
            }
            .x(),
        );
    }

    #[test]
    #[should_panic]
    fn test_acb_on_registered_panics() {
        let mut tracker = AffiliateStatusTracker::new(default_sec(), None);
        tracker.set_latest_post_status(
            &Affiliate::default_registered(),
            TStat { shares: rat("0"), acb: Some(dec!(0)), ..TStat::d() }.x(),
        );
    }

    #[test]
    #[should_panic]
    fn test_null_acb_on_non_registered_panics() {
        let mut tracker = AffiliateStatusTracker::new(default_sec(), None);
        tracker.set_latest_post_status(
            &Affiliate::default(),
            TStat { shares: rat("0"), acb: None, ..TStat::d() }.x(),
        );
    }
}
