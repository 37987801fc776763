use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::promotions::PromotionEntity;

/// One cart or order line with its resolved price snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: f32,
    pub discount_percent: f32,
}

impl PricedLine {
    pub fn undiscounted_total(&self) -> f32 {
        self.quantity as f32 * self.unit_price
    }

    pub fn line_total(&self) -> f32 {
        self.undiscounted_total() * (1.0 - self.discount_percent / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f32,
    pub discount_total: f32,
    pub shipping_fee: f32,
    pub grand_total: f32,
}

/// Pick the steepest discount among promotions running at `now` whose scope
/// covers the product directly or through its category. Discounts do not
/// stack.
pub fn best_discount_percent(
    product_id: i32,
    category_id: i32,
    now: DateTime<Utc>,
    promotions: &[PromotionEntity],
    product_scope: &HashSet<(i32, i32)>,
    category_scope: &HashSet<(i32, i32)>,
) -> f32 {
    promotions
        .iter()
        .filter(|promo| promo.is_running_at(now))
        .filter(|promo| {
            product_scope.contains(&(promo.id, product_id))
                || category_scope.contains(&(promo.id, category_id))
        })
        .map(|promo| promo.discount_percent)
        .fold(0.0, f32::max)
}

pub fn order_totals(lines: &[PricedLine], shipping_fee: f32) -> OrderTotals {
    let subtotal: f32 = lines.iter().map(PricedLine::undiscounted_total).sum();
    let discount_total: f32 = lines
        .iter()
        .map(|line| line.undiscounted_total() - line.line_total())
        .sum();
    OrderTotals {
        subtotal,
        discount_total,
        shipping_fee,
        grand_total: subtotal - discount_total + shipping_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn promo(id: i32, percent: f32, starts: i64, ends: i64, is_active: bool) -> PromotionEntity {
        PromotionEntity {
            id,
            name: format!("promo-{id}"),
            description: None,
            discount_percent: percent,
            starts_at: at(starts),
            ends_at: at(ends),
            is_active,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn unscoped_product_gets_no_discount() {
        let promotions = vec![promo(1, 25.0, 0, 10_000, true)];
        let percent = best_discount_percent(
            99,
            5,
            at(500),
            &promotions,
            &HashSet::from([(1, 1)]),
            &HashSet::new(),
        );
        assert_eq!(percent, 0.0);
    }

    #[test]
    fn best_of_product_and_category_scope_wins_without_stacking() {
        let promotions = vec![
            promo(1, 10.0, 0, 10_000, true),
            promo(2, 30.0, 0, 10_000, true),
        ];
        let product_scope = HashSet::from([(1, 7)]);
        let category_scope = HashSet::from([(2, 3)]);

        let percent =
            best_discount_percent(7, 3, at(500), &promotions, &product_scope, &category_scope);
        assert_eq!(percent, 30.0);
    }

    #[test]
    fn expired_and_inactive_promotions_are_ignored() {
        let promotions = vec![
            promo(1, 50.0, 0, 100, true),    // expired
            promo(2, 40.0, 0, 10_000, false), // deactivated
            promo(3, 5.0, 0, 10_000, true),
        ];
        let product_scope = HashSet::from([(1, 7), (2, 7), (3, 7)]);

        let percent = best_discount_percent(
            7,
            3,
            at(500),
            &promotions,
            &product_scope,
            &HashSet::new(),
        );
        assert_eq!(percent, 5.0);
    }

    #[test]
    fn promotion_window_is_half_open() {
        let promotions = vec![promo(1, 10.0, 100, 200, true)];
        let product_scope = HashSet::from([(1, 7)]);

        let scope = &HashSet::new();
        assert_eq!(
            best_discount_percent(7, 1, at(100), &promotions, &product_scope, scope),
            10.0
        );
        assert_eq!(
            best_discount_percent(7, 1, at(200), &promotions, &product_scope, scope),
            0.0
        );
    }

    #[test]
    fn totals_sum_lines_and_apply_shipping() {
        let lines = vec![
            PricedLine {
                product_id: 1,
                quantity: 2,
                unit_price: 10.0,
                discount_percent: 50.0,
            },
            PricedLine {
                product_id: 2,
                quantity: 1,
                unit_price: 5.0,
                discount_percent: 0.0,
            },
        ];
        let totals = order_totals(&lines, 3.0);
        assert_eq!(totals.subtotal, 25.0);
        assert_eq!(totals.discount_total, 10.0);
        assert_eq!(totals.shipping_fee, 3.0);
        assert_eq!(totals.grand_total, 18.0);
    }

    #[test]
    fn empty_cart_totals_are_just_shipping() {
        let totals = order_totals(&[], 4.5);
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.discount_total, 0.0);
        assert_eq!(totals.grand_total, 4.5);
    }
}
