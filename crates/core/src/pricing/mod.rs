//! Pricing calculator: tier + add-ons + bundle rules + coupon.
//!
//! All monetary values are integer minor units. Rounding is
//! half-away-from-zero at each multiplication step. The resulting quote
//! is persisted on the order at checkout time and later materialized
//! into the emitted LICENSE document.

use chrono::{DateTime, Utc};
use forgekit_types::{BundleDiscount, Coupon, Currency, DiscountType, PricingTier};
use serde::Serialize;
use tracing::warn;

use crate::catalog::{CatalogError, CatalogReader};

/// Reserved for a future tax engine. Basis points applied to the
/// discounted subtotal.
pub const TAX_RATE_BASIS_POINTS: i64 = 0;

/// The studio currently settles everything in one currency.
pub const SETTLEMENT_CURRENCY: Currency = Currency::Usd;

/// Error types for pricing.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid or inactive tier: {0}")]
    InvalidTier(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One bundle discount applied to a quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleLine {
    pub id: i64,
    pub name: String,
    pub amount: i64,
}

/// The coupon discount applied to a quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponLine {
    pub code: String,
    pub amount: i64,
}

/// One human-readable line of the quote. Discounts carry negative
/// amounts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownLine {
    pub label: String,
    pub amount: i64,
}

/// A complete price quote for a tier + feature selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub tier_price: i64,
    pub features_price: i64,
    pub subtotal: i64,
    pub bundle_discounts: Vec<BundleLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_discount: Option<CouponLine>,
    pub total_discount: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: Currency,
    pub breakdown: Vec<BreakdownLine>,
}

/// Compute the quote for `tier_slug` + `selected` at `now`.
///
/// `now` is passed in rather than read from the clock so that a quote is
/// reproducible and testable.
pub fn calculate(
    catalog: &dyn CatalogReader,
    tier_slug: &str,
    selected: &[String],
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PriceQuote, PricingError> {
    let tier = catalog
        .tier(tier_slug)?
        .filter(|t| t.is_active)
        .ok_or_else(|| PricingError::InvalidTier(tier_slug.to_string()))?;

    let mut breakdown = vec![BreakdownLine {
        label: format!("Tier: {}", tier.name),
        amount: tier.price,
    }];

    let features_price = charge_features(catalog, &tier, selected, &mut breakdown)?;
    let subtotal = tier.price + features_price;

    let bundle_discounts = eligible_bundles(catalog, &tier, selected, subtotal, now)?;
    let bundle_total: i64 = bundle_discounts.iter().map(|b| b.amount).sum();
    for bundle in &bundle_discounts {
        breakdown.push(BreakdownLine {
            label: format!("Bundle: {}", bundle.name),
            amount: -bundle.amount,
        });
    }

    let coupon_discount = match coupon_code {
        Some(code) => redeem_coupon(catalog, code, subtotal, now)?,
        None => None,
    };
    if let Some(coupon) = &coupon_discount {
        breakdown.push(BreakdownLine {
            label: format!("Coupon: {}", coupon.code),
            amount: -coupon.amount,
        });
    }

    let total_discount = bundle_total + coupon_discount.as_ref().map_or(0, |c| c.amount);
    let tax = rounded_ratio(subtotal - total_discount, TAX_RATE_BASIS_POINTS, 10_000);
    let total = (subtotal - total_discount + tax).max(0);

    Ok(PriceQuote {
        tier_price: tier.price,
        features_price,
        subtotal,
        bundle_discounts,
        coupon_discount,
        total_discount,
        tax,
        total,
        currency: SETTLEMENT_CURRENCY,
        breakdown,
    })
}

/// Sum the prices of selected features the tier does not already
/// include. Tier-included features contribute zero.
fn charge_features(
    catalog: &dyn CatalogReader,
    tier: &PricingTier,
    selected: &[String],
    breakdown: &mut Vec<BreakdownLine>,
) -> Result<i64, PricingError> {
    let features = catalog.features(selected)?;
    if features.len() != selected.len() {
        for slug in selected {
            if !features.iter().any(|f| &f.slug == slug) {
                warn!("Selected feature '{}' not found in catalog; priced at 0", slug);
            }
        }
    }

    let mut total = 0;
    for feature in features {
        if tier.included_features.contains(&feature.slug) {
            continue;
        }
        total += feature.price;
        breakdown.push(BreakdownLine {
            label: format!("Feature: {}", feature.name),
            amount: feature.price,
        });
    }
    Ok(total)
}

/// Collect the bundles this order qualifies for, in ascending id order.
fn eligible_bundles(
    catalog: &dyn CatalogReader,
    tier: &PricingTier,
    selected: &[String],
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<Vec<BundleLine>, PricingError> {
    let mut bundles = catalog.active_bundles()?;
    bundles.sort_by_key(|b| b.id);

    let mut lines = Vec::new();
    for bundle in bundles {
        if !bundle_applies(&bundle, tier, selected, now) {
            continue;
        }
        lines.push(BundleLine {
            id: bundle.id,
            name: bundle.name.clone(),
            amount: discount_amount(bundle.discount_type, bundle.value, subtotal),
        });
    }
    Ok(lines)
}

fn bundle_applies(
    bundle: &BundleDiscount,
    tier: &PricingTier,
    selected: &[String],
    now: DateTime<Utc>,
) -> bool {
    if !bundle.is_active {
        return false;
    }
    if !bundle.applicable_tiers.is_empty() && !bundle.applicable_tiers.contains(&tier.slug) {
        return false;
    }
    if selected.len() < bundle.min_items {
        return false;
    }
    if !bundle.applicable_features.is_empty()
        && !bundle
            .applicable_features
            .iter()
            .any(|f| selected.contains(f))
    {
        return false;
    }
    if let Some(window) = &bundle.active_window {
        if !window.contains(now) {
            return false;
        }
    }
    true
}

/// Look up and price a coupon. Ineligible coupons contribute nothing.
fn redeem_coupon(
    catalog: &dyn CatalogReader,
    code: &str,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<Option<CouponLine>, PricingError> {
    let Some(coupon) = catalog.coupon_by_code(code)? else {
        return Ok(None);
    };
    if !coupon_applies(&coupon, subtotal, now) {
        return Ok(None);
    }
    Ok(Some(CouponLine {
        code: coupon.code.clone(),
        amount: discount_amount(coupon.discount_type, coupon.value, subtotal),
    }))
}

fn coupon_applies(coupon: &Coupon, subtotal: i64, now: DateTime<Utc>) -> bool {
    if !coupon.is_live(now) {
        return false;
    }
    if let Some(min_purchase) = coupon.min_purchase {
        if subtotal < min_purchase {
            return false;
        }
    }
    true
}

fn discount_amount(discount_type: DiscountType, value: i64, subtotal: i64) -> i64 {
    match discount_type {
        DiscountType::Percentage => rounded_ratio(subtotal, value, 100),
        DiscountType::Fixed => value,
    }
}

/// `amount * numerator / denominator`, rounded half-away-from-zero.
fn rounded_ratio(amount: i64, numerator: i64, denominator: i64) -> i64 {
    let product = amount as i128 * numerator as i128;
    let denominator = denominator as i128;
    let quotient = product / denominator;
    let remainder = product % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        let sign = if (product < 0) != (denominator < 0) { -1 } else { 1 };
        (quotient + sign) as i64
    } else {
        quotient as i64
    }
}
