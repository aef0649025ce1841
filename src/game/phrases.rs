//! Spoken phrase templates, praise selection and the audio asset naming
//! convention shared with the offline pre-render job.

use crate::game::rng::Rng;

/// Letters are always spoken by their uppercase name, whatever the glyph
/// on the bubble shows.
pub fn spoken_name(letter: char) -> char {
    letter.to_ascii_uppercase()
}

pub fn prompt(target: char) -> String {
    format!("Can you pop the letter {}?", spoken_name(target))
}

pub fn correction(tapped: char) -> String {
    format!("That's the letter {}. Try again!", spoken_name(tapped))
}

pub fn reminder(target: char) -> String {
    format!("Let's find the letter {}!", spoken_name(target))
}

/// Uniform pick with replacement across rounds.
pub fn random_praise(rng: &mut Rng) -> &'static str {
    crate::PRAISE_PHRASES[rng.gen_range(crate::PRAISE_PHRASES.len())]
}

/// Normalizes phrase text to the shared `/audio/` file naming scheme:
/// lowercase, word characters and spaces kept, whitespace runs collapsed
/// to single hyphens. Must stay in sync with the pre-render job.
pub fn audio_asset_name(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

pub fn audio_asset_path(text: &str) -> String {
    format!("/audio/{}.mp3", audio_asset_name(text))
}

/// Every phrase the game can speak, in the order the pre-render job emits
/// them: letter prompts, praise, corrections, target reminders.
pub fn inventory() -> Vec<String> {
    let mut phrases = Vec::with_capacity(26 * 3 + crate::PRAISE_PHRASES.len());
    for letter in 'A'..='Z' {
        phrases.push(prompt(letter));
    }
    phrases.extend(crate::PRAISE_PHRASES.iter().map(|p| p.to_string()));
    for letter in 'A'..='Z' {
        phrases.push(correction(letter));
    }
    for letter in 'A'..='Z' {
        phrases.push(reminder(letter));
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_match_spoken_wording() {
        assert_eq!(prompt('M'), "Can you pop the letter M?");
        assert_eq!(correction('Q'), "That's the letter Q. Try again!");
        assert_eq!(reminder('M'), "Let's find the letter M!");
    }

    #[test]
    fn lowercase_glyphs_are_spoken_by_uppercase_name() {
        assert_eq!(prompt('m'), "Can you pop the letter M?");
        assert_eq!(correction('q'), "That's the letter Q. Try again!");
        assert_eq!(reminder('b'), "Let's find the letter B!");
    }

    #[test]
    fn praise_comes_from_the_fixed_set() {
        let mut rng = Rng::from_seed(4);
        for _ in 0..100 {
            let praise = random_praise(&mut rng);
            assert!(crate::PRAISE_PHRASES.contains(&praise));
        }
    }

    #[test]
    fn asset_names_drop_punctuation_and_hyphenate() {
        assert_eq!(
            audio_asset_name("Can you pop the letter A?"),
            "can-you-pop-the-letter-a"
        );
        assert_eq!(
            audio_asset_name("That's the letter Q. Try again!"),
            "thats-the-letter-q-try-again"
        );
        assert_eq!(audio_asset_name("You're a superstar!"), "youre-a-superstar");
        assert_eq!(
            audio_asset_path("Wonderful!"),
            "/audio/wonderful.mp3"
        );
    }

    #[test]
    fn asset_names_collapse_whitespace_runs() {
        assert_eq!(audio_asset_name("  Way   to go! "), "way-to-go");
    }

    #[test]
    fn inventory_covers_every_phrase_with_unique_assets() {
        let phrases = inventory();
        assert_eq!(phrases.len(), 26 * 3 + crate::PRAISE_PHRASES.len());
        assert!(phrases.contains(&"Can you pop the letter Z?".to_string()));
        assert!(phrases.contains(&"Let's find the letter A!".to_string()));

        let names: Vec<String> = phrases.iter().map(|p| audio_asset_name(p)).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len(), "asset names collide");
        for name in &names {
            assert!(!name.is_empty());
            assert!(!name.starts_with('-') && !name.ends_with('-'));
            assert!(!name.contains("--"));
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
            );
        }
    }
}
