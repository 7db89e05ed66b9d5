//! The "nya" easter egg.
//!
//! A message whose words start with a trigger token always gets a kaomoji
//! reply; a message merely containing one somewhere gets it 10% of the time.
//! Checked before category matching, so even a category-matching message can
//! occasionally get a kaomoji instead of a picture.

use rand::Rng;

const TRIGGER_TOKENS: [&str; 2] = ["ня", "nya"];
const SUBSTRING_CHANCE: f64 = 0.1;

pub fn is_nya<R: Rng + ?Sized>(text: &str, rng: &mut R) -> bool {
    for token in TRIGGER_TOKENS {
        if text.split_whitespace().any(|word| word.starts_with(token)) {
            return true;
        }
        if text.contains(token) && rng.gen_range(0.0..1.0) < SUBSTRING_CHANCE {
            return true;
        }
    }
    false
}
