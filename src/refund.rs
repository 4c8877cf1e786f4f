//! Refund allocation across order line items.
//!
//! Distributes a refund amount over the sellers of an order proportionally to
//! each line's frozen `seller_net_cents` snapshot. Integer arithmetic only:
//! floor-proportional shares with the rounding remainder absorbed by the last
//! eligible line, and every line's debit capped at its own net so a seller is
//! never debited more than the line ever credited.

use uuid::Uuid;

/// Input line: the slice of an order item the allocator is allowed to see.
#[derive(Debug, Clone)]
pub struct RefundItem {
    pub order_item_id: Uuid,
    pub seller_id: Uuid,
    pub seller_net_cents: i64,
}

/// One per-line debit produced by the allocator. Transient, not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundAllocation {
    pub order_item_id: Uuid,
    pub seller_id: Uuid,
    pub debit_cents: i64,
}

/// Allocate `refund_total_cents` across items proportional to seller net.
///
/// Guarantees, for nets n_1..n_k of the eligible (net > 0) items:
/// - sum of debits == min(refund_total, sum of nets)
/// - each debit <= its line's net
/// - deterministic: output depends only on input order and values
pub fn allocate_refund(items: &[RefundItem], refund_total_cents: i64) -> Vec<RefundAllocation> {
    if refund_total_cents <= 0 {
        return Vec::new();
    }

    let eligible: Vec<&RefundItem> = items.iter().filter(|it| it.seller_net_cents > 0).collect();
    let total_net: i64 = eligible.iter().map(|it| it.seller_net_cents).sum();
    if total_net <= 0 {
        return Vec::new();
    }

    let mut allocations = Vec::with_capacity(eligible.len());
    let mut remaining = refund_total_cents;

    for (idx, it) in eligible.iter().enumerate() {
        let net = it.seller_net_cents;

        let share = if idx == eligible.len() - 1 {
            // Last eligible line absorbs the rounding remainder.
            remaining
        } else {
            let proportional = refund_total_cents * net / total_net;
            proportional.clamp(0, remaining)
        };

        remaining -= share;

        // Never debit a line more than it was credited, even when the refund
        // total exceeds total net (processor-level refunds can include tax or
        // shipping not tracked per line).
        let debit = share.min(net);
        if debit <= 0 {
            continue;
        }

        allocations.push(RefundAllocation {
            order_item_id: it.order_item_id,
            seller_id: it.seller_id,
            debit_cents: debit,
        });
    }

    allocations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(net: i64) -> RefundItem {
        RefundItem {
            order_item_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            seller_net_cents: net,
        }
    }

    fn total(allocs: &[RefundAllocation]) -> i64 {
        allocs.iter().map(|a| a.debit_cents).sum()
    }

    #[test]
    fn full_refund_two_sellers() {
        let items = vec![item(6000), item(4000)];
        let allocs = allocate_refund(&items, 10000);
        assert_eq!(allocs.len(), 2);
        assert_eq!(allocs[0].debit_cents, 6000);
        assert_eq!(allocs[1].debit_cents, 4000);
        assert_eq!(allocs[0].order_item_id, items[0].order_item_id);
        assert_eq!(allocs[1].seller_id, items[1].seller_id);
    }

    #[test]
    fn rounding_remainder_goes_to_last() {
        let items = vec![item(33), item(33), item(34)];
        let allocs = allocate_refund(&items, 100);
        let debits: Vec<i64> = allocs.iter().map(|a| a.debit_cents).collect();
        assert_eq!(debits, vec![33, 33, 34]);
        assert_eq!(total(&allocs), 100);
    }

    #[test]
    fn partial_refund_sums_exactly() {
        let items = vec![item(3333), item(3333), item(3334)];
        for refund in [1, 7, 40, 999, 5000, 10000] {
            let allocs = allocate_refund(&items, refund);
            assert_eq!(total(&allocs), refund, "refund={refund}");
            for a in &allocs {
                let net = items
                    .iter()
                    .find(|it| it.order_item_id == a.order_item_id)
                    .map(|it| it.seller_net_cents)
                    .unwrap();
                assert!(a.debit_cents <= net);
            }
        }
    }

    #[test]
    fn over_refund_capped_at_total_net() {
        // Refund includes amounts not tracked per line (tax/shipping).
        let items = vec![item(5000)];
        let allocs = allocate_refund(&items, 6000);
        assert_eq!(allocs.len(), 1);
        assert_eq!(allocs[0].debit_cents, 5000);

        let items = vec![item(6000), item(4000)];
        let allocs = allocate_refund(&items, 12000);
        assert_eq!(total(&allocs), 10000);
    }

    #[test]
    fn zero_net_items_excluded() {
        let items = vec![item(0), item(5000), item(-100)];
        let allocs = allocate_refund(&items, 2000);
        assert_eq!(allocs.len(), 1);
        assert_eq!(allocs[0].order_item_id, items[1].order_item_id);
        assert_eq!(allocs[0].debit_cents, 2000);
    }

    #[test]
    fn degenerate_inputs_yield_empty() {
        assert!(allocate_refund(&[], 1000).is_empty());
        assert!(allocate_refund(&[item(5000)], 0).is_empty());
        assert!(allocate_refund(&[item(5000)], -50).is_empty());
        assert!(allocate_refund(&[item(0), item(0)], 1000).is_empty());
    }

    #[test]
    fn deterministic_for_same_input() {
        let items = vec![item(17), item(23), item(1), item(59)];
        let a = allocate_refund(&items, 73);
        let b = allocate_refund(&items, 73);
        assert_eq!(a, b);
        assert_eq!(total(&a), 73);
    }

    #[test]
    fn tiny_refund_lands_on_late_lines() {
        // Proportional floors round early shares to zero; the remainder rule
        // still pays out the full amount.
        let items = vec![item(1000), item(1000), item(1000)];
        let allocs = allocate_refund(&items, 2);
        assert_eq!(total(&allocs), 2);
    }
}
