use rand::rngs::OsRng;
use rand::RngCore;

use crate::models::cancellation::Variant;

/// Source of fair coin flips for variant assignment and flow branching.
/// Injected through `AppState` so tests can pin or seed the outcome.
pub trait CoinSource: Send + Sync {
    fn flip(&self) -> bool;
}

/// Production source backed by the operating system RNG. Pricing decisions
/// should not ride on a wall-clock-seeded PRNG, even at these stakes.
pub struct OsCoinSource;

impl CoinSource for OsCoinSource {
    fn flip(&self) -> bool {
        OsRng.next_u32() & 1 == 0
    }
}

/// Returns the user's sticky variant: reuse the one recorded on any prior
/// cancellation, otherwise flip for a fresh assignment. The caller persists
/// the result into the new cancellation row.
pub fn assign_variant(prior: Option<Variant>, coins: &dyn CoinSource) -> Variant {
    match prior {
        Some(v) => v,
        None => {
            if coins.flip() {
                Variant::A
            } else {
                Variant::B
            }
        }
    }
}

/// Single source of truth for the downsell price. Variant A sees no discount;
/// variant B gets the fixed table ($25 -> $15, $29 -> $19) and a generic
/// $10-off fallback floored at zero.
pub fn discounted_price(variant: Variant, monthly_price: i32) -> i32 {
    match variant {
        Variant::A => monthly_price,
        Variant::B => match monthly_price {
            2500 => 1500,
            2900 => 1900,
            p => (p - 1000).max(0),
        },
    }
}

#[cfg(test)]
pub struct FixedCoinSource(pub bool);

#[cfg(test)]
impl CoinSource for FixedCoinSource {
    fn flip(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
pub struct SeededCoinSource(std::sync::Mutex<rand::rngs::StdRng>);

#[cfg(test)]
impl SeededCoinSource {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self(std::sync::Mutex::new(rand::rngs::StdRng::seed_from_u64(
            seed,
        )))
    }
}

#[cfg(test)]
impl CoinSource for SeededCoinSource {
    fn flip(&self) -> bool {
        use rand::Rng;
        self.0.lock().expect("rng mutex poisoned").gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticky_variant_a_survives_any_flip() {
        assert_eq!(
            assign_variant(Some(Variant::A), &FixedCoinSource(false)),
            Variant::A
        );
        assert_eq!(
            assign_variant(Some(Variant::A), &FixedCoinSource(true)),
            Variant::A
        );
    }

    #[test]
    fn test_sticky_variant_b_survives_any_flip() {
        assert_eq!(
            assign_variant(Some(Variant::B), &FixedCoinSource(true)),
            Variant::B
        );
    }

    #[test]
    fn test_fresh_assignment_follows_coin() {
        assert_eq!(assign_variant(None, &FixedCoinSource(true)), Variant::A);
        assert_eq!(assign_variant(None, &FixedCoinSource(false)), Variant::B);
    }

    #[test]
    fn test_seeded_assignment_is_roughly_even() {
        let coins = SeededCoinSource::new(7);
        let a_count = (0..200)
            .filter(|_| assign_variant(None, &coins) == Variant::A)
            .count();
        assert!((70..=130).contains(&a_count), "a_count = {a_count}");
    }

    #[test]
    fn test_variant_a_never_discounted() {
        assert_eq!(discounted_price(Variant::A, 2500), 2500);
        assert_eq!(discounted_price(Variant::A, 2900), 2900);
        assert_eq!(discounted_price(Variant::A, 999), 999);
    }

    #[test]
    fn test_variant_b_fixed_table() {
        assert_eq!(discounted_price(Variant::B, 2500), 1500);
        assert_eq!(discounted_price(Variant::B, 2900), 1900);
    }

    #[test]
    fn test_variant_b_generic_fallback() {
        assert_eq!(discounted_price(Variant::B, 3500), 2500);
        assert_eq!(discounted_price(Variant::B, 1000), 0);
    }

    #[test]
    fn test_variant_b_floors_at_zero() {
        assert_eq!(discounted_price(Variant::B, 500), 0);
        assert_eq!(discounted_price(Variant::B, 0), 0);
    }
}
