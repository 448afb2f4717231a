//! Payment entity and the append-only payment history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{Money, PaymentId, SubscriptionId, UserId};

use super::PaymentStatus;

/// One billing attempt against a subscription.
///
/// Immutable once created. Only the owning [`Subscription`](super::Subscription)
/// appends payments; readers get shared references or clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub occurred_on: NaiveDate,

    /// Provider correlation key this payment was derived from, if any.
    pub external_id: Option<String>,
}

impl Payment {
    pub fn new(
        subscription_id: SubscriptionId,
        user_id: UserId,
        amount: Money,
        status: PaymentStatus,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            subscription_id,
            user_id,
            amount,
            status,
            occurred_on,
            external_id: None,
        }
    }

    /// Attaches the provider correlation key.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}

/// Arena of payments keyed by id, plus their arrival order.
///
/// History only grows: there is no API to replace or remove a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Payment>", into = "Vec<Payment>")]
pub struct PaymentHistory {
    records: HashMap<PaymentId, Payment>,
    order: Vec<PaymentId>,
}

impl PaymentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a payment. Returns false if a payment with the same id is
    /// already recorded (the history is left untouched).
    pub(crate) fn append(&mut self, payment: Payment) -> bool {
        if self.records.contains_key(&payment.id) {
            return false;
        }
        self.order.push(payment.id);
        self.records.insert(payment.id, payment);
        true
    }

    pub fn get(&self, id: &PaymentId) -> Option<&Payment> {
        self.records.get(id)
    }

    /// Payment ids in arrival order.
    pub fn ids(&self) -> &[PaymentId] {
        &self.order
    }

    /// Payments in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Payment> + '_ {
        self.order.iter().filter_map(move |id| self.records.get(id))
    }

    pub fn last(&self) -> Option<&Payment> {
        self.order.last().and_then(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.iter().any(Payment::is_pending)
    }

    /// True if a payment recorded for provider event `external_id` exists.
    pub fn contains_external_id(&self, external_id: &str) -> bool {
        self.iter()
            .any(|p| p.external_id.as_deref() == Some(external_id))
    }

    /// Payments from arrival position `from` onwards.
    pub fn since(&self, from: usize) -> impl Iterator<Item = (usize, &Payment)> + '_ {
        self.order
            .iter()
            .enumerate()
            .skip(from)
            .filter_map(move |(position, id)| self.records.get(id).map(|p| (position, p)))
    }

    pub fn to_vec(&self) -> Vec<Payment> {
        self.iter().cloned().collect()
    }
}

impl From<Vec<Payment>> for PaymentHistory {
    fn from(payments: Vec<Payment>) -> Self {
        let mut history = PaymentHistory::new();
        for payment in payments {
            history.append(payment);
        }
        history
    }
}

impl From<PaymentHistory> for Vec<Payment> {
    fn from(history: PaymentHistory) -> Self {
        let PaymentHistory { mut records, order } = history;
        order.iter().filter_map(|id| records.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Currency;

    fn payment(status: PaymentStatus) -> Payment {
        Payment::new(
            SubscriptionId::new(),
            UserId::new("user-1").unwrap(),
            Money::from_minor_units(999, Currency::USD),
            status,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
    }

    #[test]
    fn history_preserves_arrival_order() {
        let mut history = PaymentHistory::new();
        let first = payment(PaymentStatus::Failed);
        let second = payment(PaymentStatus::Succeeded);
        history.append(first.clone());
        history.append(second.clone());

        assert_eq!(history.ids(), &[first.id, second.id]);
        assert_eq!(history.last(), Some(&second));
        let statuses: Vec<_> = history.iter().map(|p| p.status).collect();
        assert_eq!(statuses, vec![PaymentStatus::Failed, PaymentStatus::Succeeded]);
    }

    #[test]
    fn finds_payment_by_external_id() {
        let mut history = PaymentHistory::new();
        history.append(payment(PaymentStatus::Failed).with_external_id("evt_1"));
        history.append(payment(PaymentStatus::Succeeded));

        assert!(history.contains_external_id("evt_1"));
        assert!(!history.contains_external_id("evt_2"));
    }

    #[test]
    fn since_skips_earlier_positions() {
        let history: PaymentHistory = vec![
            payment(PaymentStatus::Failed),
            payment(PaymentStatus::Failed),
            payment(PaymentStatus::Succeeded),
        ]
        .into();

        let tail: Vec<_> = history.since(1).map(|(pos, p)| (pos, p.id)).collect();

        assert_eq!(tail, vec![(1, history.ids()[1]), (2, history.ids()[2])]);
        assert_eq!(history.since(3).count(), 0);
        assert_eq!(history.since(10).count(), 0);
    }

    #[test]
    fn append_ignores_duplicate_ids() {
        let mut history = PaymentHistory::new();
        let p = payment(PaymentStatus::Succeeded);
        assert!(history.append(p.clone()));
        assert!(!history.append(p));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn has_pending_detects_in_flight_payment() {
        let history: PaymentHistory =
            vec![payment(PaymentStatus::Succeeded), payment(PaymentStatus::Pending)].into();
        assert!(history.has_pending());
    }

    #[test]
    fn history_serializes_as_ordered_list() {
        let history: PaymentHistory =
            vec![payment(PaymentStatus::Succeeded), payment(PaymentStatus::Failed)].into();
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[1]["status"], "FAILED");

        let back: PaymentHistory = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn external_id_is_attached() {
        let p = payment(PaymentStatus::Succeeded).with_external_id("evt_1");
        assert_eq!(p.external_id.as_deref(), Some("evt_1"));
    }
}
