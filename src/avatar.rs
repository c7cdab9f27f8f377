//! Deterministic avatar colors derived from display names.
//!
//! Every client must pick the same color for the same name without asking the
//! server, so the hash is fixed: `hash = c + ((hash << 5) - hash)` over the
//! UTF-16 code units of the name, then `|hash| mod 6` into [`AVATAR_PALETTE`].
//!
//! Only the shift works on 32 bits: the running hash is truncated to a signed
//! 32-bit value before `<< 5` and the shifted result wraps, while the sum
//! itself is kept wide. Browser clients compute it that way, and long names
//! must land on the same color there and here.

#[cfg(test)]
#[path = "avatar_test.rs"]
mod avatar_test;

/// Fixed palette of avatar color tokens.
pub const AVATAR_PALETTE: [&str; 6] = ["#FF6B6B", "#4ECDC4", "#FFD93D", "#6C5CE7", "#00B894", "#E17055"];

/// Rolling hash over UTF-16 code units; the shift operand wraps to `i32`,
/// the running sum does not.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn name_hash(name: &str) -> i64 {
    name.encode_utf16().fold(0_i64, |hash, unit| {
        // `as i32` keeps the low 32 bits, i.e. the value modulo 2^32 read as signed.
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        i64::from(unit).wrapping_add(shifted).wrapping_sub(hash)
    })
}

/// Palette entry for a display name. The empty name maps to entry 0.
#[must_use]
pub fn avatar_color(name: &str) -> &'static str {
    let slot = name_hash(name).unsigned_abs() % AVATAR_PALETTE.len() as u64;
    AVATAR_PALETTE[usize::try_from(slot).unwrap_or(0)]
}

/// Upper-cased first character of a name for the avatar badge; `?` when empty.
#[must_use]
pub fn avatar_initial(name: &str) -> String {
    match name.trim().chars().next() {
        Some(c) => c.to_uppercase().collect(),
        None => "?".to_owned(),
    }
}
