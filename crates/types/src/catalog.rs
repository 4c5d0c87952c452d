//! Pricing catalog records: tiers, templates, bundle discounts, coupons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pricing tier a customer purchases.
///
/// `included_features` is the set of feature slugs bundled into the tier
/// without extra charge; selecting one of them never adds to the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricingTier {
    pub slug: String,
    pub name: String,

    /// Tier price in minor units
    pub price: i64,

    #[serde(default)]
    pub included_features: Vec<String>,

    #[serde(default)]
    pub display_order: i64,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A preset configuration layered on top of a tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Template {
    pub slug: String,
    pub name: String,

    #[serde(default)]
    pub included_features: Vec<String>,
}

/// Discount computation type shared by bundles and coupons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the subtotal
    Percentage,
    /// `value` is an amount in minor units
    Fixed,
}

impl DiscountType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

/// Optional activity window on a bundle discount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActiveWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ActiveWindow {
    /// Whether `now` falls inside the window. Open bounds always match.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return false;
            }
        }
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return false;
            }
        }
        true
    }
}

/// An automatic discount applied when an order matches its rules.
///
/// Bundles are evaluated in ascending `id` order; every eligible bundle
/// contributes to the order's discount total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleDiscount {
    pub id: i64,
    pub name: String,

    #[serde(rename = "type")]
    pub discount_type: DiscountType,

    /// Percentage points or minor units, depending on `discount_type`
    pub value: i64,

    /// Minimum number of selected add-on features
    #[serde(default)]
    pub min_items: usize,

    /// Empty means any tier qualifies
    #[serde(default)]
    pub applicable_tiers: Vec<String>,

    /// Empty means any selection qualifies
    #[serde(default)]
    pub applicable_features: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_window: Option<ActiveWindow>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A redeemable discount code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Coupon {
    pub code: String,

    #[serde(rename = "type")]
    pub discount_type: DiscountType,

    /// Percentage points or minor units, depending on `discount_type`
    pub value: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,

    #[serde(default)]
    pub used_count: u32,

    /// Minimum subtotal in minor units for the coupon to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Coupon {
    /// Whether the coupon has remaining redemptions and has not expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return false;
            }
        }
        if let Some(max_uses) = self.max_uses {
            if self.used_count >= max_uses {
                return false;
            }
        }
        true
    }
}

fn default_true() -> bool {
    true
}
