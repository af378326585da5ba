//! # Admin Index Allocator
//!
//! Picks the smallest unused admin index. The caller is responsible for
//! holding the registry lock so that allocation and reservation happen
//! together.

use std::collections::BTreeSet;

use shared::{constants::FIRST_ADMIN_INDEX, types::AdminIndex};

/// Return the smallest admin index, starting at 1, not present in `active`
pub fn allocate_next(active: &BTreeSet<AdminIndex>) -> AdminIndex {
    let mut next = FIRST_ADMIN_INDEX;
    for &index in active.range(FIRST_ADMIN_INDEX..) {
        if index != next {
            break;
        }
        next += 1;
    }
    next
}
