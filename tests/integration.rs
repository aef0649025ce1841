// Integration tests (native) for the `alphabet-pop` crate.
// These tests avoid wasm-specific functionality and exercise the pure round
// logic so they can run under `cargo test` on the host.

use std::collections::HashSet;

use alphabet_pop::game::letters::{self, Mode, TapVerdict};
use alphabet_pop::game::rng::Rng;

#[test]
fn praise_phrases_nonempty_and_exclamatory() {
    assert!(!alphabet_pop::PRAISE_PHRASES.is_empty());
    for phrase in alphabet_pop::PRAISE_PHRASES {
        assert!(
            phrase.ends_with('!'),
            "praise '{}' should sound excited",
            phrase
        );
    }
}

// A planned round feeds judging end to end: popping the target succeeds,
// every distractor asks for another try, and a closed round ignores all taps.
#[test]
fn round_plans_feed_tap_judging() {
    let mut rng = Rng::from_seed(7);
    for mode in [Mode::Uppercase, Mode::Lowercase, Mode::Mixed] {
        for _ in 0..100 {
            let plan = letters::plan_round(&mut rng, mode);
            assert_eq!(
                letters::judge_tap(true, plan.target, plan.target),
                TapVerdict::Pop
            );
            for &letter in plan.letters.iter().filter(|&&l| l != plan.target) {
                assert_eq!(
                    letters::judge_tap(true, letter, plan.target),
                    TapVerdict::TryAgain,
                    "distractor '{}' must not pop target '{}'",
                    letter,
                    plan.target
                );
                assert_eq!(
                    letters::judge_tap(false, letter, plan.target),
                    TapVerdict::Ignored
                );
            }
            assert_eq!(
                letters::judge_tap(false, plan.target, plan.target),
                TapVerdict::Ignored,
                "taps between rounds are dead"
            );
        }
    }
}

// Every letter of the alphabet eventually shows up as the target.
#[test]
fn all_letters_reachable_as_targets() {
    let mut rng = Rng::from_seed(13);
    let mut seen: HashSet<char> = HashSet::new();
    for _ in 0..2000 {
        seen.insert(letters::plan_round(&mut rng, Mode::Uppercase).target);
    }
    for letter in 'A'..='Z' {
        assert!(seen.contains(&letter), "'{}' never drawn as target", letter);
    }
}

#[test]
fn uppercase_and_lowercase_modes_never_mix_cases() {
    let mut rng = Rng::from_seed(19);
    for _ in 0..200 {
        let upper = letters::plan_round(&mut rng, Mode::Uppercase);
        assert!(upper.letters.iter().all(|l| l.is_ascii_uppercase()));
        let lower = letters::plan_round(&mut rng, Mode::Lowercase);
        assert!(lower.letters.iter().all(|l| l.is_ascii_lowercase()));
    }
}

// Mixed mode treats 'a' and 'A' as distinct glyphs, so both may share a
// round; judging stays glyph-exact either way.
#[test]
fn mixed_rounds_can_offer_both_cases_of_one_identity() {
    let mut rng = Rng::from_seed(29);
    let mut saw_identity_twice = false;
    for _ in 0..500 {
        let plan = letters::plan_round(&mut rng, Mode::Mixed);
        let identities: HashSet<char> = plan
            .letters
            .iter()
            .map(|l| l.to_ascii_uppercase())
            .collect();
        if identities.len() < plan.letters.len() {
            saw_identity_twice = true;
            break;
        }
    }
    assert!(
        saw_identity_twice,
        "500 mixed rounds should pair some letter with its other case"
    );
    assert_eq!(letters::judge_tap(true, 'a', 'A'), TapVerdict::TryAgain);
}

// Host-page toggles mutate the config layer without touching the rest.
#[test]
fn sound_toggle_preserves_volume() {
    let before = alphabet_pop::game::sfx::config();
    alphabet_pop::set_sound_enabled(false);
    let after = alphabet_pop::game::sfx::config();
    assert!(!after.enabled);
    assert_eq!(after.volume, before.volume);
    alphabet_pop::set_sound_enabled(true);
    assert!(alphabet_pop::game::sfx::config().enabled);
}

#[test]
fn cloud_speech_is_opt_in() {
    assert!(!alphabet_pop::game::speech::config().cloud_enabled);
    alphabet_pop::set_cloud_speech(true);
    assert!(alphabet_pop::game::speech::config().cloud_enabled);
    alphabet_pop::set_cloud_speech(false);
}
