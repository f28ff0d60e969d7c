//! Transient multi-token ledger.
//!
//! A [`TokenLedger`] lives for exactly one unit of work. It is filled from the
//! payments a call receives, debited and credited while the call runs, and read
//! out with [`TokenLedger::settle_all`] to build the outbound transfers.
//!
//! Balances are kept in a hash map for lookup, next to a vector that records the
//! order in which each token first appeared. Settlement walks the vector, so
//! the output order is deterministic and independent of hashing. A token is in
//! the vector if and only if it has a non-zero balance in the map.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace, warn};

use tokenvault_common::{Amount, Payment, Ratio, Rounding, TokenId};

use crate::error::{LedgerError, LedgerResult};
use crate::operation::Operation;

/// In-memory balances for one unit of work.
#[derive(Debug, Clone)]
pub struct TokenLedger<A = TokenId> {
    /// Non-zero balances.
    balances: HashMap<A, Amount>,
    /// Tokens in first-deposit order.
    order: Vec<A>,
}

impl<A> TokenLedger<A> {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of tokens with a non-zero balance.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the ledger holds nothing.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tokens with a non-zero balance, in first-deposit order.
    pub fn tokens(&self) -> impl Iterator<Item = &A> + '_ {
        self.order.iter()
    }
}

impl<A> Default for TokenLedger<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TokenLedger<A>
where
    A: Clone + Eq + Hash + fmt::Debug,
{
    /// Build a ledger by crediting each incoming payment in order.
    pub fn from_batch<I, P>(payments: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Payment<A>>,
    {
        let mut ledger = Self::new();
        ledger.extend(payments);
        debug!(tokens = ledger.len(), "Ledger opened from payment batch");
        ledger
    }

    /// Credit `amount` of `asset`.
    ///
    /// A zero deposit of an unknown token is ignored so no zero entry is ever
    /// stored.
    pub fn deposit(&mut self, asset: A, amount: impl Into<Amount>) {
        let amount = amount.into();
        if amount.is_zero() {
            trace!(asset = ?asset, "Ignoring zero deposit");
            return;
        }

        match self.balances.get_mut(&asset) {
            Some(balance) => {
                *balance += amount;
                trace!(asset = ?asset, balance = %balance, "Deposit");
            }
            None => {
                trace!(asset = ?asset, amount = %amount, "Deposit opens new entry");
                self.order.push(asset.clone());
                self.balances.insert(asset, amount);
            }
        }
    }

    /// Debit exactly `amount` of `asset` and return it.
    ///
    /// Fails without touching the ledger when the balance is short. A balance
    /// drained to zero drops the token from the ledger.
    pub fn withdraw(&mut self, asset: &A, amount: impl Into<Amount>) -> LedgerResult<Amount, A> {
        let amount = amount.into();
        if amount.is_zero() {
            return Ok(amount);
        }

        let available = self.balance_of(asset);
        let Some(remaining) = available.checked_sub(&amount) else {
            warn!(
                asset = ?asset,
                requested = %amount,
                available = %available,
                "Insufficient balance"
            );
            return Err(LedgerError::InsufficientBalance {
                asset: asset.clone(),
                requested: amount,
                available,
            });
        };

        if remaining.is_zero() {
            self.remove_entry(asset);
        } else if let Some(balance) = self.balances.get_mut(asset) {
            *balance = remaining;
        }

        trace!(asset = ?asset, amount = %amount, "Withdraw");
        Ok(amount)
    }

    /// Debit `ratio` of the current balance, rounded down.
    ///
    /// A share that rounds to zero leaves the ledger untouched and returns zero.
    pub fn withdraw_percentage(&mut self, asset: &A, ratio: Ratio) -> LedgerResult<Amount, A> {
        self.withdraw_percentage_rounded(asset, ratio, Rounding::Down)
    }

    /// Debit `ratio` of the current balance with an explicit rounding direction.
    pub fn withdraw_percentage_rounded(
        &mut self,
        asset: &A,
        ratio: Ratio,
        rounding: Rounding,
    ) -> LedgerResult<Amount, A> {
        let amount = self.balance_of(asset).apply_ratio(&ratio, rounding);
        if amount.is_zero() {
            trace!(asset = ?asset, ratio = %ratio, "Share rounds to zero");
            return Ok(amount);
        }

        self.withdraw(asset, amount)
    }

    /// Remove and return the whole balance of `asset` (zero if absent).
    pub fn withdraw_all(&mut self, asset: &A) -> Amount {
        let amount = self.remove_entry(asset).unwrap_or_default();
        trace!(asset = ?asset, amount = %amount, "Withdraw all");
        amount
    }

    /// Current balance of `asset`, or zero.
    pub fn balance_of(&self, asset: &A) -> Amount {
        self.balances.get(asset).cloned().unwrap_or_default()
    }

    /// Check if `asset` has a non-zero balance.
    pub fn contains(&self, asset: &A) -> bool {
        self.balances.contains_key(asset)
    }

    /// Balances in first-deposit order.
    pub fn iter(&self) -> impl Iterator<Item = (&A, &Amount)> + '_ {
        self.order
            .iter()
            .filter_map(move |asset| self.balances.get(asset).map(|amount| (asset, amount)))
    }

    /// Snapshot every remaining balance as a payment, in first-deposit order.
    ///
    /// Does not modify the ledger; calling it twice yields the same list.
    pub fn settle_all(&self) -> Vec<Payment<A>> {
        let payments: Vec<_> = self
            .iter()
            .map(|(asset, amount)| Payment {
                token: asset.clone(),
                amount: amount.clone(),
            })
            .collect();

        debug!(payments = payments.len(), "Ledger settled");
        payments
    }

    /// Consume the ledger into its settlement list.
    pub fn into_settlement(self) -> Vec<Payment<A>> {
        let Self {
            mut balances,
            order,
        } = self;

        order
            .into_iter()
            .filter_map(|token| balances.remove(&token).map(|amount| Payment { token, amount }))
            .collect()
    }

    /// Apply a described operation and return the amount it moved.
    pub fn apply(&mut self, op: &Operation<A>) -> LedgerResult<Amount, A> {
        match op {
            Operation::Deposit { token, amount } => {
                self.deposit(token.clone(), amount.clone());
                Ok(amount.clone())
            }
            Operation::Withdraw { token, amount } => self.withdraw(token, amount.clone()),
            Operation::WithdrawPercentage {
                token,
                ratio,
                rounding,
            } => self.withdraw_percentage_rounded(token, *ratio, *rounding),
            Operation::WithdrawAll { token } => Ok(self.withdraw_all(token)),
        }
    }

    /// Drop `asset` from both the map and the order vector.
    fn remove_entry(&mut self, asset: &A) -> Option<Amount> {
        let amount = self.balances.remove(asset)?;

        // Linear scan; a call touches a handful of tokens.
        if let Some(pos) = self.order.iter().position(|a| a == asset) {
            self.order.remove(pos);
        }

        trace!(asset = ?asset, "Entry removed");
        Some(amount)
    }
}

impl<A, P> FromIterator<P> for TokenLedger<A>
where
    A: Clone + Eq + Hash + fmt::Debug,
    P: Into<Payment<A>>,
{
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut ledger = Self::new();
        ledger.extend(iter);
        ledger
    }
}

impl<A, P> Extend<P> for TokenLedger<A>
where
    A: Clone + Eq + Hash + fmt::Debug,
    P: Into<Payment<A>>,
{
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        for payment in iter {
            let Payment { token, amount } = payment.into();
            self.deposit(token, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn token_x() -> TokenId {
        TokenId::new("TOKENX-000001")
    }

    fn token_y() -> TokenId {
        TokenId::new("TOKENY-000002")
    }

    fn token_z() -> TokenId {
        TokenId::new("TOKENZ-000003")
    }

    fn amount(value: u64) -> Amount {
        Amount::from(value)
    }

    /// Map keys and order vector describe the same set, with no duplicates and
    /// no zero balances.
    pub(super) fn assert_consistent<A: Clone + Eq + Hash + fmt::Debug>(ledger: &TokenLedger<A>) {
        let ordered: HashSet<_> = ledger.order.iter().collect();
        let keyed: HashSet<_> = ledger.balances.keys().collect();

        assert_eq!(ordered.len(), ledger.order.len(), "duplicate in order");
        assert_eq!(ordered, keyed, "order and map diverged");
        assert!(ledger.balances.values().all(|b| !b.is_zero()), "zero entry stored");
    }

    fn scenario_ledger() -> TokenLedger {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 100u64);
        ledger.deposit(token_y(), 50u64);
        ledger.deposit(token_x(), 25u64);
        ledger
    }

    #[test]
    fn test_new_is_empty() {
        let ledger: TokenLedger = TokenLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.len(), 0);
        assert!(ledger.settle_all().is_empty());
    }

    #[test]
    fn test_deposits_accumulate() {
        let ledger = scenario_ledger();

        assert_eq!(ledger.balance_of(&token_x()), amount(125));
        assert_eq!(ledger.balance_of(&token_y()), amount(50));
        assert_eq!(
            ledger.settle_all(),
            vec![Payment::new(token_x(), 125u64), Payment::new(token_y(), 50u64)]
        );
        assert_consistent(&ledger);
    }

    #[test]
    fn test_full_withdraw_removes_entry() {
        let mut ledger = scenario_ledger();

        let taken = ledger.withdraw(&token_x(), 125u64).unwrap();

        assert_eq!(taken, amount(125));
        assert_eq!(ledger.balance_of(&token_x()), Amount::zero());
        assert!(!ledger.contains(&token_x()));
        assert_eq!(ledger.settle_all(), vec![Payment::new(token_y(), 50u64)]);
        assert_consistent(&ledger);
    }

    #[test]
    fn test_withdraw_percentage_floors() {
        let mut ledger = scenario_ledger();

        let taken = ledger
            .withdraw_percentage(&token_y(), Ratio::from_ppm(200_000))
            .unwrap();

        assert_eq!(taken, amount(10));
        assert_eq!(ledger.balance_of(&token_y()), amount(40));
    }

    #[test]
    fn test_withdraw_percentage_rounded_up() {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 10u64);

        let taken = ledger
            .withdraw_percentage_rounded(&token_x(), Ratio::from_ppm(333_333), Rounding::Up)
            .unwrap();

        assert_eq!(taken, amount(4));
        assert_eq!(ledger.balance_of(&token_x()), amount(6));
    }

    #[test]
    fn test_withdraw_percentage_dust_is_noop() {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 99u64);

        let taken = ledger.withdraw_percentage(&token_x(), Ratio::percent(1)).unwrap();

        assert!(taken.is_zero());
        assert_eq!(ledger.balance_of(&token_x()), amount(99));
    }

    #[test]
    fn test_withdraw_percentage_full_share_drains() {
        let mut ledger = scenario_ledger();

        let taken = ledger.withdraw_percentage(&token_y(), Ratio::ONE).unwrap();

        assert_eq!(taken, amount(50));
        assert!(!ledger.contains(&token_y()));
        assert_consistent(&ledger);
    }

    #[test]
    fn test_withdraw_percentage_over_one_fails() {
        let mut ledger = scenario_ledger();

        let err = ledger
            .withdraw_percentage(&token_y(), Ratio::percent(150))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                asset: token_y(),
                requested: amount(75),
                available: amount(50),
            }
        );
        assert_eq!(ledger.balance_of(&token_y()), amount(50));
    }

    #[test]
    fn test_withdraw_from_empty_fails() {
        let mut ledger = TokenLedger::new();

        let err = ledger.withdraw(&token_z(), 1u64).unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                asset: token_z(),
                requested: amount(1),
                available: Amount::zero(),
            }
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_withdraw_zero_is_noop() {
        let mut ledger = scenario_ledger();
        let before = ledger.settle_all();

        assert!(ledger.withdraw(&token_y(), 0u64).unwrap().is_zero());
        assert!(ledger.withdraw(&token_z(), 0u64).unwrap().is_zero());

        assert_eq!(ledger.settle_all(), before);
        assert!(!ledger.contains(&token_z()));
    }

    #[test]
    fn test_failed_withdraw_leaves_state() {
        let mut ledger = scenario_ledger();
        let before = ledger.settle_all();

        assert!(ledger.withdraw(&token_x(), 126u64).is_err());

        assert_eq!(ledger.settle_all(), before);
    }

    #[test]
    fn test_zero_deposit_not_stored() {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 0u64);

        assert!(ledger.is_empty());
        assert!(!ledger.contains(&token_x()));
        assert_consistent(&ledger);
    }

    #[test]
    fn test_zero_deposit_on_present_token() {
        let mut ledger = scenario_ledger();
        ledger.deposit(token_y(), 0u64);

        assert_eq!(ledger.balance_of(&token_y()), amount(50));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_withdraw_all() {
        let mut ledger = scenario_ledger();

        assert_eq!(ledger.withdraw_all(&token_x()), amount(125));
        assert_eq!(ledger.balance_of(&token_x()), Amount::zero());
        assert_eq!(ledger.withdraw_all(&token_z()), Amount::zero());
        assert_consistent(&ledger);
    }

    #[test]
    fn test_partial_withdraw_keeps_order() {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 10u64);
        ledger.deposit(token_y(), 20u64);
        ledger.deposit(token_z(), 30u64);

        ledger.withdraw(&token_y(), 5u64).unwrap();

        let order: Vec<_> = ledger.tokens().cloned().collect();
        assert_eq!(order, vec![token_x(), token_y(), token_z()]);
    }

    #[test]
    fn test_redeposit_moves_to_back() {
        let mut ledger = TokenLedger::new();
        ledger.deposit(token_x(), 10u64);
        ledger.deposit(token_y(), 20u64);

        ledger.withdraw_all(&token_x());
        ledger.deposit(token_x(), 5u64);

        let order: Vec<_> = ledger.tokens().cloned().collect();
        assert_eq!(order, vec![token_y(), token_x()]);
    }

    #[test]
    fn test_from_batch_follows_input_order() {
        let ledger: TokenLedger = TokenLedger::from_batch(vec![
            (token_z(), amount(1)),
            (token_x(), amount(2)),
            (token_z(), amount(3)),
            (token_y(), Amount::zero()),
        ]);

        assert_eq!(
            ledger.settle_all(),
            vec![Payment::new(token_z(), 4u64), Payment::new(token_x(), 2u64)]
        );
        assert_consistent(&ledger);
    }

    #[test]
    fn test_collect_from_payments() {
        let ledger: TokenLedger = vec![
            Payment::new(token_x(), 1u64),
            Payment::new(token_y(), 2u64),
        ]
        .into_iter()
        .collect();

        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_settle_all_is_repeatable() {
        let ledger = scenario_ledger();
        assert_eq!(ledger.settle_all(), ledger.settle_all());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_into_settlement_matches_snapshot() {
        let ledger = scenario_ledger();
        let snapshot = ledger.settle_all();
        assert_eq!(ledger.into_settlement(), snapshot);
    }

    #[test]
    fn test_apply_operations() {
        let mut ledger = TokenLedger::new();

        let moved = ledger
            .apply(&Operation::Deposit {
                token: token_x(),
                amount: amount(80),
            })
            .unwrap();
        assert_eq!(moved, amount(80));

        let moved = ledger
            .apply(&Operation::WithdrawPercentage {
                token: token_x(),
                ratio: Ratio::percent(25),
                rounding: Rounding::Down,
            })
            .unwrap();
        assert_eq!(moved, amount(20));

        let moved = ledger
            .apply(&Operation::WithdrawAll { token: token_x() })
            .unwrap();
        assert_eq!(moved, amount(60));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_generic_asset_key() {
        let mut ledger: TokenLedger<u32> = TokenLedger::new();
        ledger.deposit(7, 3u64);
        ledger.deposit(1, 4u64);

        assert_eq!(
            ledger.settle_all(),
            vec![Payment::new(7u32, 3u64), Payment::new(1u32, 4u64)]
        );
    }
}

#[cfg(test)]
pub(crate) mod proptests {
    use super::tests::assert_consistent;
    use super::*;
    use proptest::prelude::*;
    use tokenvault_common::totals_by_token;

    fn token_at(i: usize) -> TokenId {
        TokenId::new(format!("TKN{i}-00000{i}"))
    }

    pub(crate) fn arb_token() -> impl Strategy<Value = TokenId> {
        (0usize..5).prop_map(token_at)
    }

    fn arb_rounding() -> impl Strategy<Value = Rounding> {
        prop_oneof![Just(Rounding::Down), Just(Rounding::Up)]
    }

    pub(crate) fn arb_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            (arb_token(), 0u64..1_000).prop_map(|(token, amount)| Operation::Deposit {
                token,
                amount: amount.into(),
            }),
            (arb_token(), 0u64..1_000).prop_map(|(token, amount)| Operation::Withdraw {
                token,
                amount: amount.into(),
            }),
            (arb_token(), 0u32..=1_200_000, arb_rounding()).prop_map(
                |(token, ppm, rounding)| Operation::WithdrawPercentage {
                    token,
                    ratio: Ratio::from_ppm(ppm),
                    rounding,
                }
            ),
            arb_token().prop_map(|token| Operation::WithdrawAll { token }),
        ]
    }

    proptest! {
        #[test]
        fn prop_consistent_after_every_operation(
            ops in prop::collection::vec(arb_operation(), 0..64)
        ) {
            let mut ledger = TokenLedger::new();

            for op in &ops {
                let before = ledger.settle_all();
                if ledger.apply(op).is_err() {
                    prop_assert_eq!(ledger.settle_all(), before);
                }
                assert_consistent(&ledger);
            }
        }

        #[test]
        fn prop_batch_conserves_totals(
            batch in prop::collection::vec((arb_token(), 0u64..10_000), 0..32)
        ) {
            let payments: Vec<Payment> = batch
                .iter()
                .map(|(token, amount)| Payment::new(token.clone(), *amount))
                .collect();

            let ledger: TokenLedger = TokenLedger::from_batch(payments.clone());
            let settled = ledger.settle_all();

            let mut expected = totals_by_token(&payments);
            expected.retain(|_, amount| !amount.is_zero());
            prop_assert_eq!(totals_by_token(&settled), expected);

            // Settlement order is first appearance of a non-zero payment.
            let mut first_seen: Vec<TokenId> = Vec::new();
            for payment in payments.iter().filter(|p| !p.amount.is_zero()) {
                if !first_seen.contains(&payment.token) {
                    first_seen.push(payment.token.clone());
                }
            }
            let order: Vec<TokenId> = settled.into_iter().map(|p| p.token).collect();
            prop_assert_eq!(order, first_seen);
        }

        #[test]
        fn prop_withdraw_boundary(
            ops in prop::collection::vec(arb_operation(), 0..32),
            token in arb_token()
        ) {
            let mut ledger = TokenLedger::new();
            for op in &ops {
                let _ = ledger.apply(op);
            }

            let balance = ledger.balance_of(&token);
            let over = &balance + &Amount::from(1u32);

            prop_assert!(ledger.clone().withdraw(&token, over).is_err());

            prop_assert_eq!(ledger.withdraw(&token, balance.clone()), Ok(balance));
            prop_assert!(ledger.balance_of(&token).is_zero());
            prop_assert!(!ledger.contains(&token));
            assert_consistent(&ledger);
        }

        #[test]
        fn prop_withdraw_all_leaves_zero(
            ops in prop::collection::vec(arb_operation(), 0..32),
            token in arb_token()
        ) {
            let mut ledger = TokenLedger::new();
            for op in &ops {
                let _ = ledger.apply(op);
            }

            let balance = ledger.balance_of(&token);
            prop_assert_eq!(ledger.withdraw_all(&token), balance);
            prop_assert!(ledger.balance_of(&token).is_zero());
        }

        #[test]
        fn prop_share_within_balance(
            start in 0u64..1_000_000,
            ppm in 0u32..=1_000_000,
            rounding in arb_rounding()
        ) {
            let token = token_at(0);
            let mut ledger = TokenLedger::new();
            ledger.deposit(token.clone(), start);

            let taken = ledger
                .withdraw_percentage_rounded(&token, Ratio::from_ppm(ppm), rounding)
                .unwrap();

            prop_assert!(taken <= Amount::from(start));
            prop_assert_eq!(&taken + &ledger.balance_of(&token), Amount::from(start));
        }
    }
}
