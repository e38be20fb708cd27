//! # Test Data
//!
//! Synthetic field values for request bodies. The engine only sees the
//! [`DataGenerator`] trait; [`RandomData`] is a seedable implementation so a
//! failing run can be replayed with the same payloads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait DataGenerator: Send {
    fn company_name(&mut self) -> String;

    /// 14-digit numeric registration number.
    fn registration_number(&mut self) -> String;

    fn secondary_address(&mut self) -> String;

    fn fruit(&mut self) -> String;

    fn vegetable(&mut self) -> String;

    fn ingredient(&mut self) -> String;

    /// Positive price with two decimal places.
    fn price(&mut self) -> f64;

    /// Uniform integer in `min..=max`.
    fn int_between(&mut self, min: i64, max: i64) -> i64;
}

const COMPANY_PREFIXES: &[&str] = &[
    "Nova", "Prime", "Central", "Vale", "Sol", "Horizonte", "Bela", "Grande", "Real", "Verde",
];
const COMPANY_SUFFIXES: &[&str] = &[
    "Comercio", "Alimentos", "Distribuidora", "Mercantil", "Atacado", "Varejo", "e Filhos",
];
const ADDRESS_UNITS: &[&str] = &["Apt.", "Suite", "Sala", "Bloco", "Loja"];
const FRUITS: &[&str] = &[
    "apple", "banana", "mango", "papaya", "guava", "pineapple", "orange", "grape", "lime", "kiwi",
];
const VEGETABLES: &[&str] = &[
    "carrot", "zucchini", "eggplant", "pumpkin", "cabbage", "beetroot", "okra", "cucumber",
];
const INGREDIENTS: &[&str] = &[
    "flour", "sugar", "butter", "yeast", "cinnamon", "cocoa", "cheese", "coconut", "honey",
];

pub struct RandomData {
    rng: StdRng,
}

impl RandomData {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, words: &[&str]) -> String {
        words[self.rng.gen_range(0..words.len())].to_string()
    }
}

impl DataGenerator for RandomData {
    fn company_name(&mut self) -> String {
        let prefix = self.pick(COMPANY_PREFIXES);
        let suffix = self.pick(COMPANY_SUFFIXES);
        format!("{prefix} {suffix}")
    }

    fn registration_number(&mut self) -> String {
        self.rng
            .gen_range(10_000_000_000_000u64..=99_999_999_999_999)
            .to_string()
    }

    fn secondary_address(&mut self) -> String {
        let unit = self.pick(ADDRESS_UNITS);
        let number = self.rng.gen_range(1..=999);
        format!("{unit} {number}")
    }

    fn fruit(&mut self) -> String {
        self.pick(FRUITS)
    }

    fn vegetable(&mut self) -> String {
        self.pick(VEGETABLES)
    }

    fn ingredient(&mut self) -> String {
        self.pick(INGREDIENTS)
    }

    fn price(&mut self) -> f64 {
        let cents: u32 = self.rng.gen_range(1..=100_000);
        f64::from(cents) / 100.0
    }

    fn int_between(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}
