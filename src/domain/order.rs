use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Edges of the strict status graph. Re-asserting the current status is
    /// always allowed so repeated updates stay idempotent.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Partial,
    Paid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
}

/// Where an order came from. Staff-entered and storefront orders share one table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderChannel {
    Staff,
    Storefront,
}

/// How `update_order_status` treats transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusPolicy {
    /// Directed graph, cancelled is terminal and restores stock.
    Strict,
    /// Any status may follow any other. Stock is never restored.
    Legacy,
}

impl StatusPolicy {
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> AppResult<()> {
        match self {
            StatusPolicy::Legacy => Ok(()),
            StatusPolicy::Strict if from.can_transition_to(to) => Ok(()),
            StatusPolicy::Strict => Err(AppError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn restocks(self, from: OrderStatus, to: OrderStatus) -> bool {
        self == StatusPolicy::Strict
            && to == OrderStatus::Cancelled
            && from != OrderStatus::Cancelled
    }
}

/// Money figures of an order header, in minor units.
///
/// `grand_total` is never accepted from outside; it only exists as the
/// output of [`OrderTotals::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_amount: i64,
    pub tax_amount: i64,
    pub discount_amount: i64,
    pub grand_total: i64,
}

impl OrderTotals {
    pub fn new(total_amount: i64, tax_amount: i64, discount_amount: i64) -> AppResult<Self> {
        for (name, value) in [
            ("total_amount", total_amount),
            ("tax_amount", tax_amount),
            ("discount_amount", discount_amount),
        ] {
            if value < 0 {
                return Err(AppError::Validation(format!("{name} must not be negative")));
            }
        }

        let gross = total_amount
            .checked_add(tax_amount)
            .ok_or_else(|| AppError::Validation("order total overflows".into()))?;
        if discount_amount > gross {
            return Err(AppError::Validation(
                "discount_amount exceeds total_amount plus tax_amount".into(),
            ));
        }

        Ok(Self {
            total_amount,
            tax_amount,
            discount_amount,
            grand_total: gross - discount_amount,
        })
    }
}

pub fn line_total(quantity: i32, unit_price: i64) -> AppResult<i64> {
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::Validation("line total overflows".into()))
}

pub fn sum_lines<I>(line_totals: I) -> AppResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    line_totals.into_iter().try_fold(0i64, |acc, line| {
        acc.checked_add(line)
            .ok_or_else(|| AppError::Validation("order total overflows".into()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grand_total_is_total_plus_tax_minus_discount() {
        let totals = OrderTotals::new(10_000, 1_000, 500).unwrap();
        assert_eq!(totals.grand_total, 10_500);
    }

    #[test]
    fn discount_larger_than_gross_is_rejected() {
        assert!(matches!(
            OrderTotals::new(100, 0, 101),
            Err(AppError::Validation(_))
        ));
        assert!(OrderTotals::new(100, 5, 105).is_ok());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(OrderTotals::new(-1, 0, 0).is_err());
        assert!(OrderTotals::new(0, -1, 0).is_err());
        assert!(OrderTotals::new(0, 0, -1).is_err());
    }

    #[test]
    fn line_total_guards_quantity_and_overflow() {
        assert_eq!(line_total(3, 250).unwrap(), 750);
        assert!(line_total(0, 250).is_err());
        assert!(line_total(2, i64::MAX).is_err());
        assert!(sum_lines([i64::MAX, 1]).is_err());
        assert_eq!(sum_lines([1, 2, 3]).unwrap(), 6);
    }

    #[test]
    fn strict_graph_moves_forward_one_step() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Delivered.can_transition_to(Delivered));
    }

    #[test]
    fn legacy_policy_allows_anything() {
        assert!(
            StatusPolicy::Legacy
                .check(OrderStatus::Delivered, OrderStatus::Pending)
                .is_ok()
        );
        assert!(matches!(
            StatusPolicy::Strict.check(OrderStatus::Delivered, OrderStatus::Pending),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn only_strict_cancellation_restocks_once() {
        use OrderStatus::*;
        assert!(StatusPolicy::Strict.restocks(Pending, Cancelled));
        assert!(!StatusPolicy::Strict.restocks(Cancelled, Cancelled));
        assert!(!StatusPolicy::Legacy.restocks(Pending, Cancelled));
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        assert_eq!(OrderStatus::Cancelled.as_ref(), "cancelled");
        assert_eq!("cash_on_delivery".parse::<PaymentMethod>().unwrap(), PaymentMethod::CashOnDelivery);
        assert_eq!("LEGACY".parse::<StatusPolicy>().unwrap(), StatusPolicy::Legacy);
        assert!("archived".parse::<OrderStatus>().is_err());
    }
}
