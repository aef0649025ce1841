//! Round controller for the bubble-popping game. Owns the per-session
//! state, builds any missing DOM scaffold, wires delegated input and the
//! menu, and sequences the success / incorrect feedback paths across the
//! sound, speech and confetti channels.
//!
//! State lives in a `thread_local!` cell and is only touched between
//! await points, so every update is effectively atomic; the
//! `is_playing` flag is the sole re-entrancy guard the round needs.

pub mod confetti;
pub mod letters;
pub mod phrases;
pub mod rng;
pub mod sfx;
pub mod speech;

use std::cell::{Cell, RefCell};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, HtmlCanvasElement, MouseEvent, TouchEvent,
    window,
};

use letters::{Mode, TapVerdict};
use speech::FeedbackRequest;

// --- Feedback pacing (ms) ----------------------------------------------------

const PROMPT_DELAY_MS: i32 = 300;
const CELEBRATE_CUE_DELAY_MS: i32 = 200;
const NEXT_ROUND_DELAY_MS: i32 = 2000;
const SHAKE_RESET_MS: i32 = 500;
const REMINDER_GAP_MS: i32 = 600;
const DOUBLE_TAP_WINDOW_MS: f64 = 300.0;

/// Whole-session state; one instance per page load.
struct GameState {
    mode: Option<Mode>,
    current_target: Option<char>,
    bubbles: Vec<Element>,
    is_playing: bool,
}

thread_local! {
    static GAME_STATE: RefCell<Option<GameState>> = RefCell::new(None);
    // Where the current touch began; drives the drag-distance shield.
    static TOUCH_START: Cell<(f64, f64)> = Cell::new((0.0, 0.0));
    static LAST_TOUCH_END_MS: Cell<f64> = Cell::new(0.0);
}

// --- Session start & scaffold ------------------------------------------------

/// Boots one game session: scaffold, listeners, voice warm-up. The menu
/// overlay starts open; the first round begins when a mode is chosen.
pub fn start_session() -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    ensure_scaffold(&doc)?;

    GAME_STATE.with(|cell| {
        *cell.borrow_mut() = Some(GameState {
            mode: None,
            current_target: None,
            bubbles: Vec::new(),
            is_playing: false,
        });
    });

    install_input_listeners(&doc)?;
    install_touch_shielding(&doc)?;
    install_resize_listener(&win)?;
    speech::init_voices();
    Ok(())
}

// Injected once as <style id="ap-style">; keyframes cannot live in inline
// style attributes.
const GAME_CSS: &str = r#"
html, body {
  margin: 0; height: 100%; overflow: hidden;
  background: linear-gradient(160deg, #a18cd1, #fbc2eb);
  font-family: 'Comic Sans MS', 'Chalkboard SE', 'Segoe UI', sans-serif;
  -webkit-user-select: none; user-select: none; touch-action: manipulation;
}
#mode-indicator {
  position: fixed; top: 18px; left: 18px; z-index: 10;
  font-size: 28px; color: #fff; background: rgba(255,255,255,0.25);
  padding: 8px 14px; border-radius: 14px; min-width: 48px; text-align: center;
}
#menu-btn {
  position: fixed; top: 18px; right: 18px; z-index: 10;
  font-size: 28px; color: #fff; background: rgba(255,255,255,0.25);
  border: none; padding: 8px 16px; border-radius: 14px; cursor: pointer;
}
#target-letter {
  position: fixed; top: 10px; left: 50%; transform: translateX(-50%); z-index: 5;
  font-size: 84px; color: #fff; text-shadow: 0 4px 12px rgba(0,0,0,0.25);
}
#bubbles-container {
  position: fixed; top: 130px; right: 0; bottom: 0; left: 0; z-index: 4;
  display: flex; flex-wrap: wrap; gap: 26px;
  justify-content: center; align-content: center; padding: 20px;
}
.bubble {
  width: 110px; height: 110px; border-radius: 50%;
  display: flex; align-items: center; justify-content: center;
  font-size: 52px; color: #fff; cursor: pointer;
  text-shadow: 0 2px 6px rgba(0,0,0,0.3);
  box-shadow: inset -8px -8px 16px rgba(0,0,0,0.12), 0 6px 14px rgba(0,0,0,0.18);
}
.bubble-color-1 { background: #ff6b9d; }
.bubble-color-2 { background: #4ecdc4; }
.bubble-color-3 { background: #ffe66d; }
.bubble-color-4 { background: #a8e6cf; }
.bubble-color-5 { background: #ffd3a5; }
.bubble-color-6 { background: #c7ceea; }
.float { animation: ap-float 3s ease-in-out infinite; }
.pop { animation: ap-pop 0.4s ease-out forwards; }
.shake { animation: ap-shake 0.5s ease-in-out; }
.hidden { display: none !important; }
#confetti-canvas {
  position: fixed; top: 0; left: 0; z-index: 50; pointer-events: none;
}
#menu-overlay {
  position: fixed; top: 0; right: 0; bottom: 0; left: 0; z-index: 100;
  display: flex; flex-direction: column; align-items: center; justify-content: center;
  gap: 18px; background: rgba(60, 40, 90, 0.92); color: #fff; text-align: center;
}
#menu-overlay h1 { font-size: 44px; margin: 0; }
#menu-overlay p { font-size: 20px; margin: 0 0 10px; opacity: 0.85; }
.mode-btn {
  font-size: 26px; font-family: inherit; color: #5a3d8a;
  background: #ffe66d; border: none; border-radius: 18px;
  padding: 14px 30px; min-width: 280px; cursor: pointer;
}
#close-menu {
  margin-top: 14px; font-size: 22px; color: #fff;
  background: rgba(255,255,255,0.2); border: none; border-radius: 50%;
  width: 52px; height: 52px; cursor: pointer;
}
@keyframes ap-float {
  0%, 100% { transform: translateY(0); }
  50% { transform: translateY(-14px); }
}
@keyframes ap-pop {
  60% { transform: scale(1.3); opacity: 0.7; }
  100% { transform: scale(0); opacity: 0; }
}
@keyframes ap-shake {
  0%, 100% { transform: translateX(0); }
  20%, 60% { transform: translateX(-10px); }
  40%, 80% { transform: translateX(10px); }
}
"#;

/// Creates any game element the host page did not ship. Every piece uses
/// the same create-if-missing pattern, so a page that brings its own
/// markup keeps it.
fn ensure_scaffold(doc: &Document) -> Result<(), JsValue> {
    if doc.get_element_by_id("ap-style").is_none() {
        let style = doc.create_element("style")?;
        style.set_id("ap-style");
        style.set_text_content(Some(GAME_CSS));
        let head = doc.head().ok_or_else(|| JsValue::from_str("no head"))?;
        head.append_child(&style)?;
    }
    let body = doc.body().ok_or_else(|| JsValue::from_str("no body"))?;

    if doc.get_element_by_id("mode-indicator").is_none() {
        let el = doc.create_element("div")?;
        el.set_id("mode-indicator");
        body.append_child(&el)?;
    }
    if doc.get_element_by_id("menu-btn").is_none() {
        let el = doc.create_element("button")?;
        el.set_id("menu-btn");
        el.set_text_content(Some("☰"));
        body.append_child(&el)?;
    }
    if doc.get_element_by_id("target-letter").is_none() {
        let el = doc.create_element("div")?;
        el.set_id("target-letter");
        body.append_child(&el)?;
    }
    if doc.get_element_by_id("bubbles-container").is_none() {
        let el = doc.create_element("div")?;
        el.set_id("bubbles-container");
        body.append_child(&el)?;
    }
    if doc.get_element_by_id("confetti-canvas").is_none() {
        let el = doc.create_element("canvas")?;
        el.set_id("confetti-canvas");
        body.append_child(&el)?;
    }
    if doc.get_element_by_id("menu-overlay").is_none() {
        let overlay = doc.create_element("div")?;
        overlay.set_id("menu-overlay");
        let title = doc.create_element("h1")?;
        title.set_text_content(Some("Alphabet Pop"));
        overlay.append_child(&title)?;
        let subtitle = doc.create_element("p")?;
        subtitle.set_text_content(Some("Which letters do you want to pop?"));
        overlay.append_child(&subtitle)?;
        for mode in Mode::ALL {
            let btn = doc.create_element("button")?;
            btn.set_id(&format!("mode-{}", mode.slug()));
            btn.set_class_name("mode-btn");
            btn.set_text_content(Some(mode_button_label(mode)));
            overlay.append_child(&btn)?;
        }
        let close = doc.create_element("button")?;
        close.set_id("close-menu");
        close.set_text_content(Some("✕"));
        overlay.append_child(&close)?;
        body.append_child(&overlay)?;
    }
    Ok(())
}

fn mode_button_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Uppercase => "ABC · Big Letters",
        Mode::Lowercase => "abc · Small Letters",
        Mode::Mixed => "Aa · Big and Small",
    }
}

// --- Input wiring ------------------------------------------------------------

fn install_input_listeners(doc: &Document) -> Result<(), JsValue> {
    let container = doc
        .get_element_by_id("bubbles-container")
        .ok_or_else(|| JsValue::from_str("no bubbles container"))?;

    // One delegated handler outlives every round; bubbles come and go
    // without any per-round listener churn.
    let tap = Closure::wrap(Box::new(move |evt: Event| {
        on_container_tap(&evt);
    }) as Box<dyn FnMut(_)>);
    container.add_event_listener_with_callback("click", tap.as_ref().unchecked_ref())?;
    container.add_event_listener_with_callback("touchend", tap.as_ref().unchecked_ref())?;
    tap.forget();

    // The mode buttons share one delegated handler on the overlay; their
    // ids carry the mode slug it dispatches on.
    let overlay = doc
        .get_element_by_id("menu-overlay")
        .ok_or_else(|| JsValue::from_str("no menu overlay"))?;
    let pick = Closure::wrap(Box::new(move |evt: Event| {
        on_mode_pick(&evt);
    }) as Box<dyn FnMut(_)>);
    overlay.add_event_listener_with_callback("click", pick.as_ref().unchecked_ref())?;
    pick.forget();

    wire_button(doc, "menu-btn", open_menu)?;
    wire_button(doc, "close-menu", close_menu)?;
    Ok(())
}

fn on_mode_pick(evt: &Event) {
    let Some(target) = evt.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return;
    };
    let Ok(Some(btn)) = target.closest(".mode-btn") else {
        return;
    };
    if let Some(mode) = mode_from_button_id(&btn.id()) {
        choose_mode(mode);
    }
}

fn mode_from_button_id(id: &str) -> Option<Mode> {
    id.strip_prefix("mode-").and_then(Mode::from_slug)
}

fn wire_button(doc: &Document, id: &str, action: fn()) -> Result<(), JsValue> {
    let el = doc
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str("missing menu control"))?;
    let closure = Closure::wrap(Box::new(move |_evt: MouseEvent| {
        action();
    }) as Box<dyn FnMut(_)>);
    el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Delegated bubble tap handler. Resolves the bubble via
/// `closest(".bubble")`, judges the letter, and dispatches. Only handles
/// owned by the current round are answered; taps while the round is
/// closed pass through untouched (no preventDefault).
fn on_container_tap(evt: &Event) {
    let Some(target) = evt.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return;
    };
    let Ok(Some(bubble)) = target.closest(".bubble") else {
        return;
    };
    let Some(letter) = bubble
        .get_attribute("data-letter")
        .and_then(|s| s.chars().next())
    else {
        return;
    };

    let verdict = GAME_STATE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let Some(state) = slot.as_mut() else {
            return TapVerdict::Ignored;
        };
        let Some(target_letter) = state.current_target else {
            return TapVerdict::Ignored;
        };
        if !state.bubbles.contains(&bubble) {
            return TapVerdict::Ignored;
        }
        let verdict = letters::judge_tap(state.is_playing, letter, target_letter);
        if verdict == TapVerdict::Pop {
            // Close the round before any feedback runs; this is the
            // guard against a rapid second tap double-resolving.
            state.is_playing = false;
        }
        verdict
    });

    match verdict {
        TapVerdict::Ignored => {}
        TapVerdict::Pop => {
            evt.prevent_default();
            evt.stop_propagation();
            on_success(&bubble);
        }
        TapVerdict::TryAgain => {
            evt.prevent_default();
            evt.stop_propagation();
            on_incorrect(&bubble, letter);
        }
    }
}

// --- Round resolution --------------------------------------------------------

/// Success path. The round is already closed; everything below is
/// feedback, ending with the next round after the celebration window.
fn on_success(bubble: &Element) {
    sfx::play(sfx::Cue::Pop, Some(0.8));
    set_bubble_animation(bubble, "pop");
    confetti::burst(bubble);

    spawn_local(async {
        sleep_ms(CELEBRATE_CUE_DELAY_MS).await;
        sfx::play(sfx::Cue::Success, Some(0.5));
    });

    let praise = rng::with(phrases::random_praise);
    speech::say(praise, 1.2, 1.3);

    spawn_local(async {
        sleep_ms(NEXT_ROUND_DELAY_MS).await;
        start_new_round();
    });
}

/// Incorrect path. The round stays open and the learner keeps guessing:
/// correction naming the tapped letter first, then the target reminder
/// after a fixed pause once the correction call settles.
fn on_incorrect(bubble: &Element, tapped: char) {
    sfx::play(sfx::Cue::Shake, Some(0.5));
    set_bubble_animation(bubble, "shake");

    let target = GAME_STATE.with(|cell| cell.borrow().as_ref().and_then(|s| s.current_target));
    let Some(target) = target else { return };

    let bubble = bubble.clone();
    spawn_local(async move {
        let correction = FeedbackRequest::new(phrases::correction(tapped), 1.0, 1.1);
        speech::speak_request(correction).await;

        spawn_local(async move {
            sleep_ms(REMINDER_GAP_MS).await;
            speech::say(&phrases::reminder(target), 1.0, 1.2);
        });
        sleep_ms(SHAKE_RESET_MS).await;
        set_bubble_animation(&bubble, "float");
    });
}

/// Replaces the bubble set wholesale and re-opens the round. The prompt
/// is spoken shortly after render so the new letters are on screen first.
fn start_new_round() {
    let Some(doc) = window().and_then(|w| w.document()) else {
        return;
    };
    let Some(container) = doc.get_element_by_id("bubbles-container") else {
        return;
    };
    let mode = GAME_STATE.with(|cell| cell.borrow().as_ref().and_then(|s| s.mode));
    let Some(mode) = mode else { return };

    let plan = rng::with(|rng| letters::plan_round(rng, mode));

    container.set_inner_html("");
    let mut bubbles = Vec::with_capacity(plan.letters.len());
    for (slot, &letter) in plan.letters.iter().enumerate() {
        if let Ok(bubble) = make_bubble(&doc, letter, slot) {
            if container.append_child(&bubble).is_ok() {
                bubbles.push(bubble);
            }
        }
    }

    if let Some(display) = doc.get_element_by_id("target-letter") {
        display.set_text_content(Some(&plan.target.to_string()));
    }

    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            state.current_target = Some(plan.target);
            state.bubbles = bubbles;
            state.is_playing = true;
        }
    });

    let prompt = phrases::prompt(plan.target);
    spawn_local(async move {
        sleep_ms(PROMPT_DELAY_MS).await;
        speech::say(&prompt, 1.0, 1.2);
    });
}

fn make_bubble(doc: &Document, letter: char, slot: usize) -> Result<Element, JsValue> {
    let bubble = doc.create_element("div")?;
    bubble.set_class_name(&format!("bubble bubble-color-{} float", slot % 6 + 1));
    bubble.set_text_content(Some(&letter.to_string()));
    bubble.set_attribute("data-letter", &letter.to_string())?;
    Ok(bubble)
}

fn set_bubble_animation(bubble: &Element, class: &str) {
    let classes = bubble.class_list();
    for anim in ["float", "pop", "shake"] {
        let _ = classes.remove_1(anim);
    }
    let _ = classes.add_1(class);
}

// --- Menu --------------------------------------------------------------------

fn choose_mode(mode: Mode) {
    sfx::play(sfx::Cue::Click, Some(0.4));
    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            state.mode = Some(mode);
        }
    });
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(indicator) = doc.get_element_by_id("mode-indicator") {
            indicator.set_text_content(Some(mode.indicator()));
        }
        if let Some(overlay) = doc.get_element_by_id("menu-overlay") {
            let _ = overlay.class_list().add_1("hidden");
        }
    }
    start_new_round();
}

/// Opening the menu pauses play and silences speech; the round itself is
/// kept for resume.
fn open_menu() {
    sfx::play(sfx::Cue::Whoosh, Some(0.5));
    if let Some(overlay) = window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("menu-overlay"))
    {
        let _ = overlay.class_list().remove_1("hidden");
    }
    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            state.is_playing = false;
        }
    });
    speech::cancel_current();
}

/// Closing resumes the existing round only if a mode was ever chosen;
/// target and bubbles are untouched.
fn close_menu() {
    sfx::play(sfx::Cue::Whoosh, Some(0.5));
    if let Some(overlay) = window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("menu-overlay"))
    {
        let _ = overlay.class_list().add_1("hidden");
    }
    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            if state.mode.is_some() {
                state.is_playing = true;
            }
        }
    });
}

// --- Touch shielding & resize ------------------------------------------------

/// Kiosk-style touch hardening for small fingers: no pinch zoom, no
/// scroll rubber-banding, no context menu, no double-tap zoom. Bubble and
/// button touches are exempt from the drag shield.
fn install_touch_shielding(doc: &Document) -> Result<(), JsValue> {
    {
        let closure = Closure::wrap(Box::new(move |evt: TouchEvent| {
            if let Some(touch) = evt.touches().item(0) {
                TOUCH_START
                    .with(|cell| cell.set((touch.client_x() as f64, touch.client_y() as f64)));
            }
        }) as Box<dyn FnMut(_)>);
        let opts = AddEventListenerOptions::new();
        opts.set_passive(true);
        doc.add_event_listener_with_callback_and_add_event_listener_options(
            "touchstart",
            closure.as_ref().unchecked_ref(),
            &opts,
        )?;
        closure.forget();
    }
    {
        let closure = Closure::wrap(Box::new(move |evt: TouchEvent| {
            if evt.touches().length() > 1 {
                evt.prevent_default();
                return;
            }
            let Some(touch) = evt.touches().item(0) else { return };
            let (start_x, start_y) = TOUCH_START.with(|cell| cell.get());
            let dx = (touch.client_x() as f64 - start_x).abs();
            let dy = (touch.client_y() as f64 - start_y).abs();
            if dx <= 10.0 && dy <= 10.0 {
                return;
            }
            let on_interactive = evt
                .target()
                .and_then(|t| t.dyn_into::<Element>().ok())
                .is_some_and(|el| {
                    matches!(el.closest(".bubble"), Ok(Some(_)))
                        || matches!(el.closest("button"), Ok(Some(_)))
                });
            if !on_interactive {
                evt.prevent_default();
            }
        }) as Box<dyn FnMut(_)>);
        let opts = AddEventListenerOptions::new();
        opts.set_passive(false);
        doc.add_event_listener_with_callback_and_add_event_listener_options(
            "touchmove",
            closure.as_ref().unchecked_ref(),
            &opts,
        )?;
        closure.forget();
    }
    {
        let closure = Closure::wrap(Box::new(move |evt: Event| {
            evt.prevent_default();
        }) as Box<dyn FnMut(_)>);
        let opts = AddEventListenerOptions::new();
        opts.set_passive(false);
        doc.add_event_listener_with_callback_and_add_event_listener_options(
            "touchcancel",
            closure.as_ref().unchecked_ref(),
            &opts,
        )?;
        doc.add_event_listener_with_callback("contextmenu", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    {
        let closure = Closure::wrap(Box::new(move |evt: TouchEvent| {
            let now = window()
                .and_then(|w| w.performance())
                .map(|p| p.now())
                .unwrap_or(0.0);
            let last = LAST_TOUCH_END_MS.with(|cell| cell.replace(now));
            if now - last <= DOUBLE_TAP_WINDOW_MS {
                evt.prevent_default();
            }
        }) as Box<dyn FnMut(_)>);
        let opts = AddEventListenerOptions::new();
        opts.set_passive(false);
        doc.add_event_listener_with_callback_and_add_event_listener_options(
            "touchend",
            closure.as_ref().unchecked_ref(),
            &opts,
        )?;
        closure.forget();
    }
    Ok(())
}

/// Keeps the confetti canvas matched to the viewport across rotations
/// and window resizes.
fn install_resize_listener(win: &web_sys::Window) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(move || {
        let Some(win) = window() else { return };
        let Some(canvas) = win
            .document()
            .and_then(|d| d.get_element_by_id("confetti-canvas"))
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        else {
            return;
        };
        let w = win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let h = win
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        canvas.set_width(w as u32);
        canvas.set_height(h as u32);
    }) as Box<dyn FnMut()>);
    win.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

// --- Timers ------------------------------------------------------------------

/// setTimeout-backed pause; the pacing primitive for every feedback delay.
pub(crate) async fn sleep_ms(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(win) = window() {
            let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
        }
    });
    let _ = JsFuture::from(promise).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_covers_every_class_the_controller_toggles() {
        for needle in [
            "@keyframes ap-float",
            "@keyframes ap-pop",
            "@keyframes ap-shake",
            ".float",
            ".pop",
            ".shake",
            ".hidden",
            ".bubble",
            "#bubbles-container",
            "#target-letter",
            "#mode-indicator",
            "#menu-overlay",
            "#confetti-canvas",
        ] {
            assert!(GAME_CSS.contains(needle), "stylesheet misses {needle}");
        }
        for slot in 1..=6 {
            let class = format!(".bubble-color-{slot}");
            assert!(GAME_CSS.contains(&class), "stylesheet misses {class}");
        }
    }

    #[test]
    fn pacing_keeps_the_celebration_inside_the_round_gap() {
        assert!(CELEBRATE_CUE_DELAY_MS < NEXT_ROUND_DELAY_MS);
        assert!(SHAKE_RESET_MS < REMINDER_GAP_MS);
    }

    #[test]
    fn mode_buttons_resolve_back_to_their_mode() {
        // The scaffold mints ids from the slug; the picker must parse
        // every one of them back.
        for mode in Mode::ALL {
            let id = format!("mode-{}", mode.slug());
            assert_eq!(mode_from_button_id(&id), Some(mode));
            assert!(!mode_button_label(mode).is_empty());
        }
        assert_eq!(mode_from_button_id("close-menu"), None);
        assert_eq!(mode_from_button_id("mode-cursive"), None);
    }
}
