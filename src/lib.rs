//! Alphabet Pop core crate.
//!
//! Letter-recognition game for toddlers: a target letter is shown and
//! spoken, six floating bubbles are offered, and every tap answers with
//! layered feedback (sound cue, speech, confetti). `start_game()` boots
//! the whole session against the host page; the praise dataset below is
//! shared by the speech layer.

use wasm_bindgen::prelude::*;

pub mod game;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// Shared phrase dataset (spoken on correct pops, one picked at random)
// -----------------------------------------------------------------------------

pub const PRAISE_PHRASES: &[&str] = &[
    "You're a superstar!",
    "Amazing job!",
    "You're awesome!",
    "Fantastic!",
    "Way to go!",
    "You're incredible!",
    "Perfect!",
    "Excellent work!",
    "You're doing great!",
    "Wonderful!",
];

// -----------------------------------------------------------------------------
// Unified entrypoint
// -----------------------------------------------------------------------------

#[wasm_bindgen]
pub fn start_game() -> Result<(), JsValue> {
    game::start_session()
}

/// Host-page toggle for the effect channel; speech is unaffected.
#[wasm_bindgen]
pub fn set_sound_enabled(enabled: bool) {
    let mut cfg = game::sfx::config();
    cfg.enabled = enabled;
    game::sfx::set_config(cfg);
}

/// Host-page toggle for the hosted synthesis tier. Off by default; local
/// synthesis keeps working either way.
#[wasm_bindgen]
pub fn set_cloud_speech(enabled: bool) {
    let mut cfg = game::speech::config();
    cfg.cloud_enabled = enabled;
    game::speech::set_config(cfg);
}
