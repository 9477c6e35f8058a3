use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long after purchase a customer may still get their money back.
pub const REFUND_WINDOW_HOURS: i64 = 24;

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Activated,
    Expired,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Activated => "activated",
            OrderStatus::Expired => "expired",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Activated, OrderStatus::Refunded],
            OrderStatus::Activated => &[OrderStatus::Expired, OrderStatus::Refunded],
            OrderStatus::Expired | OrderStatus::Cancelled | OrderStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn is_refundable_at(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Activated)
            && now - created_at <= Duration::hours(REFUND_WINDOW_HOURS)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "activated" => Ok(OrderStatus::Activated),
            "expired" => Ok(OrderStatus::Expired),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(anyhow::anyhow!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_lifecycle() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Activated));
        assert!(OrderStatus::Activated.can_transition_to(OrderStatus::Refunded));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Activated));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn terminal_statuses() {
        for status in [OrderStatus::Expired, OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(status.is_terminal(), "{status}");
        }
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn refunds_only_within_a_day_of_purchase() {
        let now = Utc::now();
        assert!(OrderStatus::Paid.is_refundable_at(now - Duration::hours(23), now));
        assert!(OrderStatus::Activated.is_refundable_at(now - Duration::hours(24), now));
        assert!(!OrderStatus::Paid.is_refundable_at(now - Duration::hours(25), now));
        assert!(!OrderStatus::Pending.is_refundable_at(now, now));
    }

    #[test]
    fn parses_and_displays() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Activated,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
