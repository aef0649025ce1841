//! Letter generator: target + distractor draws under a case mode, the
//! shuffled per-round letter set, and tap judging against the target.

use crate::game::rng::Rng;

pub const DISTRACTOR_COUNT: usize = 5;
pub const BUBBLE_COUNT: usize = DISTRACTOR_COUNT + 1;

/// Case policy for letter draws, chosen from the menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Uppercase,
    Lowercase,
    Mixed,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Uppercase, Mode::Lowercase, Mode::Mixed];

    /// Short label shown in the corner mode indicator.
    pub fn indicator(self) -> &'static str {
        match self {
            Mode::Uppercase => "ABC",
            Mode::Lowercase => "abc",
            Mode::Mixed => "Aa",
        }
    }

    /// Identifier used in menu button element ids.
    pub fn slug(self) -> &'static str {
        match self {
            Mode::Uppercase => "uppercase",
            Mode::Lowercase => "lowercase",
            Mode::Mixed => "mixed",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Mode> {
        match slug {
            "uppercase" => Some(Mode::Uppercase),
            "lowercase" => Some(Mode::Lowercase),
            "mixed" => Some(Mode::Mixed),
            _ => None,
        }
    }
}

/// One uniform draw from the 26-letter alphabet, cased per mode. Mixed
/// mode flips a fair coin per draw, so the same identity can appear in
/// both cases across draws.
pub fn random_letter(rng: &mut Rng, mode: Mode) -> char {
    let upper = (b'A' + rng.gen_range(26) as u8) as char;
    match mode {
        Mode::Uppercase => upper,
        Mode::Lowercase => upper.to_ascii_lowercase(),
        Mode::Mixed => {
            if rng.gen_bool() {
                upper.to_ascii_lowercase()
            } else {
                upper
            }
        }
    }
}

pub fn pick_target(rng: &mut Rng, mode: Mode) -> char {
    random_letter(rng, mode)
}

/// Draws `count` letters under the mode's case policy, rejecting any draw
/// equal to the target or to an already accepted distractor. Equality is
/// on the drawn glyph, so mixed mode may show both cases of one identity.
/// Terminates for any count below the mode's glyph universe.
pub fn pick_distractors(rng: &mut Rng, target: char, mode: Mode, count: usize) -> Vec<char> {
    let mut distractors: Vec<char> = Vec::with_capacity(count);
    while distractors.len() < count {
        let letter = random_letter(rng, mode);
        if letter == target || distractors.contains(&letter) {
            continue;
        }
        distractors.push(letter);
    }
    distractors
}

/// Pure output of the generator for one round: the target plus the full
/// shuffled letter set the bubbles render in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPlan {
    pub target: char,
    pub letters: Vec<char>,
}

pub fn plan_round(rng: &mut Rng, mode: Mode) -> RoundPlan {
    let target = pick_target(rng, mode);
    let mut letters = Vec::with_capacity(BUBBLE_COUNT);
    letters.push(target);
    letters.extend(pick_distractors(rng, target, mode, DISTRACTOR_COUNT));
    rng.shuffle(&mut letters);
    RoundPlan { target, letters }
}

/// Outcome of one tap against the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapVerdict {
    /// Input arrived while the round was closed; no state change, no feedback.
    Ignored,
    Pop,
    TryAgain,
}

/// The `is_playing` guard is checked before the letters are compared, so a
/// tap between round resolution and the next round is a strict no-op.
pub fn judge_tap(is_playing: bool, tapped: char, target: char) -> TapVerdict {
    if !is_playing {
        return TapVerdict::Ignored;
    }
    if tapped == target {
        TapVerdict::Pop
    } else {
        TapVerdict::TryAgain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels() {
        assert_eq!(Mode::Uppercase.indicator(), "ABC");
        assert_eq!(Mode::Lowercase.indicator(), "abc");
        assert_eq!(Mode::Mixed.indicator(), "Aa");
        for mode in Mode::ALL {
            assert_eq!(Mode::from_slug(mode.slug()), Some(mode));
        }
        assert_eq!(Mode::from_slug("cursive"), None);
    }

    #[test]
    fn draws_respect_case_policy() {
        let mut rng = Rng::from_seed(1);
        let mut saw_upper = false;
        let mut saw_lower = false;
        for _ in 0..200 {
            assert!(random_letter(&mut rng, Mode::Uppercase).is_ascii_uppercase());
            assert!(random_letter(&mut rng, Mode::Lowercase).is_ascii_lowercase());
            let mixed = random_letter(&mut rng, Mode::Mixed);
            assert!(mixed.is_ascii_alphabetic());
            saw_upper |= mixed.is_ascii_uppercase();
            saw_lower |= mixed.is_ascii_lowercase();
        }
        assert!(saw_upper && saw_lower, "mixed mode produces both cases");
    }

    #[test]
    fn distractors_are_unique_and_exclude_target() {
        let mut rng = Rng::from_seed(3);
        for mode in Mode::ALL {
            for _ in 0..50 {
                let target = pick_target(&mut rng, mode);
                let distractors = pick_distractors(&mut rng, target, mode, DISTRACTOR_COUNT);
                assert_eq!(distractors.len(), DISTRACTOR_COUNT);
                assert!(!distractors.contains(&target));
                for (i, a) in distractors.iter().enumerate() {
                    assert!(!distractors[i + 1..].contains(a), "duplicate distractor");
                }
            }
        }
    }

    #[test]
    fn round_plan_contains_target_exactly_once() {
        let mut rng = Rng::from_seed(9);
        for mode in Mode::ALL {
            for _ in 0..50 {
                let plan = plan_round(&mut rng, mode);
                assert_eq!(plan.letters.len(), BUBBLE_COUNT);
                let hits = plan.letters.iter().filter(|&&l| l == plan.target).count();
                assert_eq!(hits, 1, "target appears exactly once");
                for (i, a) in plan.letters.iter().enumerate() {
                    assert!(!plan.letters[i + 1..].contains(a), "duplicate letter");
                }
            }
        }
    }

    #[test]
    fn consecutive_plans_are_freshly_drawn() {
        let mut rng = Rng::from_seed(21);
        let targets: Vec<char> = (0..20)
            .map(|_| plan_round(&mut rng, Mode::Uppercase).target)
            .collect();
        assert!(
            targets.iter().any(|&t| t != targets[0]),
            "targets vary across rounds"
        );
    }

    #[test]
    fn tap_judgement() {
        assert_eq!(judge_tap(false, 'M', 'M'), TapVerdict::Ignored);
        assert_eq!(judge_tap(false, 'Q', 'M'), TapVerdict::Ignored);
        assert_eq!(judge_tap(true, 'M', 'M'), TapVerdict::Pop);
        assert_eq!(judge_tap(true, 'Q', 'M'), TapVerdict::TryAgain);
        // Matching is on the drawn glyph, not the letter identity.
        assert_eq!(judge_tap(true, 'm', 'M'), TapVerdict::TryAgain);
    }
}
