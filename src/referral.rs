//! Referral codes and badge milestones.
//!
//! Pure functions only — no I/O, no state. A referral code is a
//! deterministic digest of the signup email; badges are derived from a
//! contact's referral count against a fixed milestone table. Everything in
//! here is what the orchestrator computes between directory calls, kept
//! separate so it can be tested without a network.

/// Rendered length of a referral code.
const CODE_LEN: usize = 7;

/// Badge tier unlocked by crossing a referral milestone. Ordered so a
/// later tier compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Badge {
    Bronze,
    Silver,
    Gold,
}

/// Referral milestones, lowest threshold first.
///
/// Selection always picks the highest threshold not exceeding the count, so
/// appending a new tier here is the whole change.
const MILESTONES: &[(u32, Badge)] = &[
    (1, Badge::Bronze),
    (2, Badge::Silver),
    (3, Badge::Gold),
];

impl Badge {
    /// String form stored in the directory's `badge` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Bronze => "bronze",
            Badge::Silver => "silver",
            Badge::Gold => "gold",
        }
    }

    /// Parse the directory's stored badge field. Empty or unknown values
    /// mean no badge.
    pub fn parse(value: &str) -> Option<Badge> {
        match value {
            "bronze" => Some(Badge::Bronze),
            "silver" => Some(Badge::Silver),
            "gold" => Some(Badge::Gold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the referral code for an email address.
///
/// Lower-cases and trims the input, folds a wrapping 32-bit signed rolling
/// hash over its UTF-16 code units, then renders the absolute value in
/// upper-case base-36, zero-padded to a fixed 7 characters. Same email in,
/// same code out, forever — distinct emails may collide, which is accepted
/// (codes attribute signups, they are not secrets or unique keys).
pub fn referral_code(email: &str) -> String {
    let normalized = email.trim().to_lowercase();

    let mut hash: i32 = 0;
    for unit in normalized.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }

    let mut code = base36(hash.unsigned_abs());
    code.make_ascii_uppercase();
    if code.len() > CODE_LEN {
        code.truncate(CODE_LEN);
        code
    } else {
        format!("{:0>width$}", code, width = CODE_LEN)
    }
}

/// Render a value in lowercase base-36.
fn base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Highest badge whose milestone threshold is within `count` referrals.
/// `None` below the first milestone.
pub fn badge_for_count(count: u32) -> Option<Badge> {
    MILESTONES
        .iter()
        .filter(|(threshold, _)| *threshold <= count)
        .max_by_key(|(threshold, _)| *threshold)
        .map(|(_, badge)| *badge)
}

/// Outcome of crediting one referral to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralProgress {
    /// Count after the credit.
    pub new_count: u32,
    /// Badge after the credit. Never lower than the previous badge.
    pub new_badge: Option<Badge>,
    /// True when the credit crossed a milestone and changed the badge —
    /// this gates the badge email.
    pub unlocked: bool,
}

/// Credit one referral against a contact's current count and badge.
///
/// The badge keeps whichever is higher of the earned tier and the previous
/// one, so a stored badge is never downgraded even if the stored count
/// disagrees with it.
pub fn referral_progress(previous_count: u32, previous_badge: Option<Badge>) -> ReferralProgress {
    let new_count = previous_count.saturating_add(1);
    let new_badge = badge_for_count(new_count).max(previous_badge);

    ReferralProgress {
        new_count,
        new_badge,
        unlocked: new_badge != previous_badge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_deterministic() {
        let a = referral_code("alice@example.com");
        let b = referral_code("alice@example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn test_code_shape() {
        for email in [
            "alice@example.com",
            "bob@example.com",
            "x@y.z",
            "someone.with.a.long.address@subdomain.example.co.uk",
        ] {
            let code = referral_code(email);
            assert_eq!(code.len(), 7, "code for {email} has wrong length");
            assert!(
                code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
                "code for {email} is not uppercase alphanumeric: {code}"
            );
        }
    }

    #[test]
    fn test_code_ignores_case_and_whitespace() {
        let canonical = referral_code("alice@example.com");
        assert_eq!(referral_code("  alice@example.com  "), canonical);
        assert_eq!(referral_code("Alice@Example.COM"), canonical);
    }

    #[test]
    fn test_code_for_empty_input() {
        // Degenerate but must not panic; hash of nothing is zero.
        assert_eq!(referral_code(""), "0000000");
    }

    #[test]
    fn test_distinct_emails_usually_differ() {
        let a = referral_code("alice@example.com");
        let b = referral_code("bob@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_base36_digits() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(u32::MAX), "1z141z3");
    }

    #[test]
    fn test_badge_thresholds() {
        assert_eq!(badge_for_count(0), None);
        assert_eq!(badge_for_count(1), Some(Badge::Bronze));
        assert_eq!(badge_for_count(2), Some(Badge::Silver));
        assert_eq!(badge_for_count(3), Some(Badge::Gold));
        // Past the highest milestone the top tier sticks.
        assert_eq!(badge_for_count(5), Some(Badge::Gold));
        assert_eq!(badge_for_count(100), Some(Badge::Gold));
    }

    #[test]
    fn test_badge_is_monotonic() {
        let mut previous = None;
        for count in 0..10 {
            let badge = badge_for_count(count);
            assert!(badge >= previous, "badge regressed at count {count}");
            previous = badge;
        }
    }

    #[test]
    fn test_badge_round_trip() {
        for badge in [Badge::Bronze, Badge::Silver, Badge::Gold] {
            assert_eq!(Badge::parse(badge.as_str()), Some(badge));
        }
        assert_eq!(Badge::parse(""), None);
        assert_eq!(Badge::parse("platinum"), None);
    }

    #[test]
    fn test_progress_increments_by_one() {
        let progress = referral_progress(0, None);
        assert_eq!(progress.new_count, 1);
        assert_eq!(progress.new_badge, Some(Badge::Bronze));
        assert!(progress.unlocked);
    }

    #[test]
    fn test_progress_upgrades_only_on_threshold() {
        // 1 → 2 crosses the silver milestone.
        let progress = referral_progress(1, Some(Badge::Bronze));
        assert_eq!(progress.new_count, 2);
        assert_eq!(progress.new_badge, Some(Badge::Silver));
        assert!(progress.unlocked);

        // 3 → 4 crosses nothing; gold stays, no unlock.
        let progress = referral_progress(3, Some(Badge::Gold));
        assert_eq!(progress.new_count, 4);
        assert_eq!(progress.new_badge, Some(Badge::Gold));
        assert!(!progress.unlocked);
    }

    #[test]
    fn test_progress_never_downgrades() {
        // Stored badge higher than the stored count implies. The badge must
        // survive the credit even though the earned tier is lower.
        let progress = referral_progress(0, Some(Badge::Gold));
        assert_eq!(progress.new_count, 1);
        assert_eq!(progress.new_badge, Some(Badge::Gold));
        assert!(!progress.unlocked);
    }

    #[test]
    fn test_racing_credits_lose_an_increment() {
        // Two referred signups racing on the same referrer both read the
        // same snapshot and both write count + 1. The second write clobbers
        // the first — a known limitation of the read-then-write update, not
        // something the system defends against. Both computations must
        // still be well-formed.
        let first = referral_progress(1, Some(Badge::Bronze));
        let second = referral_progress(1, Some(Badge::Bronze));
        assert_eq!(first, second);
        assert_eq!(first.new_count, 2);
    }
}
