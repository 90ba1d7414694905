//! Commission models.

use super::transaction::Transaction;

/// Maps an order to a non-negative fee.
pub trait CommissionModel {
    fn commission(&self, transaction: &Transaction) -> f64;
}

impl<F> CommissionModel for F
where
    F: Fn(&Transaction) -> f64,
{
    fn commission(&self, transaction: &Transaction) -> f64 {
        self(transaction)
    }
}

/// Fixed fee per order. A sell whose proceeds are below the fee is not
/// charged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlatFee {
    pub fee: f64,
}

impl FlatFee {
    pub fn new(fee: f64) -> Self {
        FlatFee { fee }
    }
}

impl CommissionModel for FlatFee {
    fn commission(&self, transaction: &Transaction) -> f64 {
        let value = transaction.price() * transaction.amount() as f64;
        if transaction.is_sell() && value < self.fee {
            return 0.0;
        }
        self.fee
    }
}

/// Flat fee plus a percentage of the order value:
/// `per_trade + value * pct / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerTradePlusPct {
    pub per_trade: f64,
    pub pct: f64,
}

impl CommissionModel for PerTradePlusPct {
    fn commission(&self, transaction: &Transaction) -> f64 {
        let value = transaction.price() * transaction.amount() as f64;
        self.per_trade + value * self.pct / 100.0
    }
}
