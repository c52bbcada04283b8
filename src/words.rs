use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

static WORD_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// How often each word-length bucket is drawn. Fractions are non-negative
/// and conventionally sum to at most 1; whatever is left over falls through
/// to the long bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeRatios {
    pub short: f64,
    pub medium: f64,
    pub long: f64,
}

impl Default for SizeRatios {
    fn default() -> Self {
        Self {
            short: 0.25,
            medium: 0.5,
            long: 0.25,
        }
    }
}

/// Three word lists bucketed by length, used to produce practice text.
#[derive(Clone, Debug)]
pub struct WordBank {
    short: Vec<String>,
    medium: Vec<String>,
    long: Vec<String>,
}

impl WordBank {
    pub fn new(short: Vec<String>, medium: Vec<String>, long: Vec<String>) -> Self {
        Self {
            short,
            medium,
            long,
        }
    }

    /// The word lists compiled into the binary.
    pub fn embedded() -> Self {
        Self::new(
            read_list("words_short.txt"),
            read_list("words_medium.txt"),
            read_list("words_long.txt"),
        )
    }

    /// Draws `length` words joined by single spaces. Each draw rolls once
    /// against the ratios to pick a bucket, then picks uniformly within it.
    pub fn random_text<R: Rng>(&self, length: usize, ratios: SizeRatios, rng: &mut R) -> String {
        let mut picked: Vec<&str> = Vec::with_capacity(length);

        for _ in 0..length {
            let roll: f64 = rng.gen();
            let bucket = if roll <= ratios.short {
                &self.short
            } else if roll <= ratios.short + ratios.medium {
                &self.medium
            } else {
                &self.long
            };

            if let Some(word) = bucket.choose(rng) {
                picked.push(word);
            }
        }

        picked.join(" ")
    }
}

fn read_list(name: &str) -> Vec<String> {
    WORD_DIR
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
