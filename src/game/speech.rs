//! Speech channel: the spoken-phrase fallback chain.
//!
//! Each request walks an ordered provider chain: pre-recorded `/audio/`
//! asset, optional cloud synthesis through the server's TTS proxy, then
//! on-device `SpeechSynthesis` as the guaranteed last resort. The first
//! tier that produces sound wins. At most one utterance is active at a
//! time: starting a new request cancels whatever is still playing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Blob, Headers, HtmlAudioElement, RequestInit, Response, SpeechSynthesis,
    SpeechSynthesisUtterance, SpeechSynthesisVoice, Url, window,
};

use crate::game::phrases;
use crate::game::sleep_ms;

/// How long the asset tier waits for a file to become playable.
const ASSET_WAIT_MS: i32 = 1500;
/// Pause between sequential clauses on the local tier.
const CLAUSE_GAP_MS: i32 = 100;

// --- Requests & configuration ------------------------------------------------

/// One spoken phrase moving through the chain. Only the text crosses the
/// wire to the cloud tier; rate and pitch apply to local synthesis.
#[derive(Clone, Debug, Serialize)]
pub struct FeedbackRequest {
    pub text: String,
    #[serde(skip)]
    pub rate: f32,
    #[serde(skip)]
    pub pitch: f32,
}

impl FeedbackRequest {
    pub fn new(text: impl Into<String>, rate: f32, pitch: f32) -> Self {
        Self {
            text: text.into(),
            rate,
            pitch,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VoiceConfig {
    /// Try pre-recorded `/audio/` assets before synthesizing.
    pub audio_enabled: bool,
    /// Try the `/api/tts` proxy before the local synthesizer.
    pub cloud_enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            cloud_enabled: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    RecordedAsset,
    CloudSynthesis,
    LocalSynthesis,
}

/// Ordered provider chain for one request. The local synthesizer is
/// always present and always last.
pub fn tier_plan(cfg: &VoiceConfig) -> Vec<Tier> {
    let mut plan = Vec::with_capacity(3);
    if cfg.audio_enabled {
        plan.push(Tier::RecordedAsset);
    }
    if cfg.cloud_enabled {
        plan.push(Tier::CloudSynthesis);
    }
    plan.push(Tier::LocalSynthesis);
    plan
}

thread_local! {
    static VOICE_CONFIG: Cell<VoiceConfig> = Cell::new(VoiceConfig::default());
    // Monotonic id per speak call; suspended chains abort when superseded.
    static EPOCH: Cell<u64> = Cell::new(0);
    static CURRENT_AUDIO: RefCell<Option<HtmlAudioElement>> = RefCell::new(None);
    static CHOSEN_VOICE: RefCell<Option<SpeechSynthesisVoice>> = RefCell::new(None);
    static VOICES_HOOKED: Cell<bool> = Cell::new(false);
}

pub fn config() -> VoiceConfig {
    VOICE_CONFIG.with(|cell| cell.get())
}

pub fn set_config(cfg: VoiceConfig) {
    VOICE_CONFIG.with(|cell| cell.set(cfg));
}

fn current_epoch() -> u64 {
    EPOCH.with(|cell| cell.get())
}

// --- Public speak API --------------------------------------------------------

/// Fire-and-forget speak, used wherever nothing sequences after the phrase.
pub fn say(text: &str, rate: f32, pitch: f32) {
    let req = FeedbackRequest::new(text, rate, pitch);
    spawn_local(async move {
        speak_request(req).await;
    });
}

/// Runs the chain for one request. Resolves when the winning tier
/// settles: playback end for the asset and cloud tiers, enqueue for the
/// local tier (local utterances keep playing in the background).
pub async fn speak_request(req: FeedbackRequest) {
    cancel_current();
    let epoch = current_epoch();
    for tier in tier_plan(&config()) {
        if current_epoch() != epoch {
            return;
        }
        match tier {
            Tier::RecordedAsset => {
                if try_asset(&req.text, epoch).await {
                    return;
                }
            }
            Tier::CloudSynthesis => {
                if try_cloud(&req, epoch).await {
                    return;
                }
            }
            Tier::LocalSynthesis => {
                speak_local(&req, epoch);
                return;
            }
        }
    }
}

/// Cancels whatever is currently speaking: pending local utterances and
/// any playing phrase audio element. Bumping the epoch aborts chains that
/// are suspended at an await point.
pub fn cancel_current() {
    EPOCH.with(|cell| cell.set(cell.get() + 1));
    if let Some(win) = window() {
        if let Ok(synth) = win.speech_synthesis() {
            synth.cancel();
        }
    }
    CURRENT_AUDIO.with(|cell| {
        if let Some(audio) = cell.borrow_mut().take() {
            let _ = audio.pause();
        }
    });
}

fn set_current(audio: &HtmlAudioElement) {
    CURRENT_AUDIO.with(|cell| *cell.borrow_mut() = Some(audio.clone()));
}

fn clear_current(audio: &HtmlAudioElement) {
    CURRENT_AUDIO.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.as_ref() == Some(audio) {
            *slot = None;
        }
    });
}

// --- Tier (a): pre-recorded asset --------------------------------------------

/// Plays the `/audio/` file named after the text, if it loads within the
/// bounded wait. A miss (404, decode error, slow network) falls through.
async fn try_asset(text: &str, epoch: u64) -> bool {
    let path = phrases::audio_asset_path(text);
    let Ok(audio) = HtmlAudioElement::new_with_src(&path) else {
        return false;
    };
    audio.set_preload("auto");
    audio.load();
    if !wait_until_playable(&audio, ASSET_WAIT_MS).await {
        return false;
    }
    if current_epoch() != epoch {
        // Superseded while loading; report consumed so the stale chain stops.
        return true;
    }
    set_current(&audio);
    let started = match audio.play() {
        Ok(promise) => JsFuture::from(promise).await.is_ok(),
        Err(_) => false,
    };
    if !started {
        clear_current(&audio);
        return false;
    }
    wait_ended(&audio).await;
    clear_current(&audio);
    true
}

// --- Tier (b): cloud synthesis -----------------------------------------------

/// POSTs `{"text": …}` to the TTS proxy and plays the returned bytes as a
/// blob URL. Any network or HTTP failure is a tier miss, never an error
/// surfaced to the learner.
async fn try_cloud(req: &FeedbackRequest, epoch: u64) -> bool {
    let Some(win) = window() else {
        return false;
    };
    let Ok(body) = serde_json::to_string(req) else {
        return false;
    };
    let Ok(headers) = Headers::new() else {
        return false;
    };
    if headers.set("Content-Type", "application/json").is_err() {
        return false;
    }
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&JsValue::from(headers));
    init.set_body(&JsValue::from_str(&body));
    let Ok(resp_value) = JsFuture::from(win.fetch_with_str_and_init("/api/tts", &init)).await
    else {
        return false;
    };
    let Ok(resp) = resp_value.dyn_into::<Response>() else {
        return false;
    };
    if !resp.ok() {
        return false;
    }
    let Ok(blob_promise) = resp.blob() else {
        return false;
    };
    let Ok(blob_value) = JsFuture::from(blob_promise).await else {
        return false;
    };
    let Ok(blob) = blob_value.dyn_into::<Blob>() else {
        return false;
    };
    let Ok(url) = Url::create_object_url_with_blob(&blob) else {
        return false;
    };
    if current_epoch() != epoch {
        let _ = Url::revoke_object_url(&url);
        return true;
    }
    let played = match HtmlAudioElement::new_with_src(&url) {
        Ok(audio) => {
            set_current(&audio);
            let started = match audio.play() {
                Ok(promise) => JsFuture::from(promise).await.is_ok(),
                Err(_) => false,
            };
            if started {
                wait_ended(&audio).await;
            }
            clear_current(&audio);
            started
        }
        Err(_) => false,
    };
    let _ = Url::revoke_object_url(&url);
    played
}

// --- Tier (c): local synthesis -----------------------------------------------

/// On-device synthesis, the guaranteed last resort. Phrases without
/// sentence punctuation go out as one utterance; longer text is split
/// into clauses spoken in order, each after the previous clause's end
/// event plus a short gap. Returns at enqueue time.
fn speak_local(req: &FeedbackRequest, epoch: u64) {
    let Some(win) = window() else { return };
    let Ok(synth) = win.speech_synthesis() else { return };
    if CHOSEN_VOICE.with(|cell| cell.borrow().is_none()) {
        init_voices();
    }
    if !req.text.contains(['.', '!', '?']) {
        enqueue_utterance(&synth, &req.text, req);
        return;
    }
    let clauses = split_clauses(&req.text);
    match clauses.len() {
        0 => {
            enqueue_utterance(&synth, &req.text, req);
        }
        1 => {
            enqueue_utterance(&synth, &clauses[0], req);
        }
        _ => {
            let req = req.clone();
            spawn_local(async move {
                for (i, clause) in clauses.iter().enumerate() {
                    if current_epoch() != epoch {
                        return;
                    }
                    if i > 0 {
                        sleep_ms(CLAUSE_GAP_MS).await;
                        if current_epoch() != epoch {
                            return;
                        }
                    }
                    if let Some(utt) = enqueue_utterance(&synth, clause, &req) {
                        wait_utterance_end(&utt).await;
                    }
                }
            });
        }
    }
}

fn enqueue_utterance(
    synth: &SpeechSynthesis,
    text: &str,
    req: &FeedbackRequest,
) -> Option<SpeechSynthesisUtterance> {
    let utt = SpeechSynthesisUtterance::new_with_text(text).ok()?;
    utt.set_rate(req.rate);
    utt.set_pitch(req.pitch);
    utt.set_volume(1.0);
    CHOSEN_VOICE.with(|cell| {
        if let Some(voice) = cell.borrow().as_ref() {
            utt.set_voice(Some(voice));
        }
    });
    synth.speak(&utt);
    Some(utt)
}

/// Splits on sentence punctuation for sequential voicing; terminators are
/// dropped, empty fragments filtered.
pub fn split_clauses(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(str::to_string)
        .collect()
}

// --- Voice selection ---------------------------------------------------------

// Ordered name patterns, best first; each entry lists fragments that must
// appear in order within the lowercased voice name. All but the trailing
// fallbacks additionally require an English locale.
const VOICE_PRIORITY: &[&[&str]] = &[
    &["google", "us english", "female"],
    &["en-us", "wavenet", "f"],
    &["en-us", "neural", "f"],
    &["samantha"],
    &["karen"],
    &["zira"],
    &["female"],
    &["en", "female"],
    &["en-us"],
    &["en-gb"],
    &["english"],
];

fn matches_in_order(haystack: &str, fragments: &[&str]) -> bool {
    let mut rest = haystack;
    for fragment in fragments {
        match rest.find(fragment) {
            Some(at) => rest = &rest[at + fragment.len()..],
            None => return false,
        }
    }
    true
}

/// Picks the friendliest voice from `(name, lang)` pairs: the priority
/// list over English-locale voices, then any English voice, then anything.
pub fn best_voice_index(voices: &[(String, String)]) -> Option<usize> {
    for pattern in VOICE_PRIORITY {
        let hit = voices.iter().position(|(name, lang)| {
            lang.to_lowercase().contains("en") && matches_in_order(&name.to_lowercase(), pattern)
        });
        if hit.is_some() {
            return hit;
        }
    }
    voices
        .iter()
        .position(|(_, lang)| lang.to_lowercase().contains("en"))
        .or(if voices.is_empty() { None } else { Some(0) })
}

/// Resolves the preferred synthesis voice. Voice lists load lazily in
/// most browsers, so selection re-runs once `voiceschanged` fires; safe
/// to call repeatedly.
pub fn init_voices() {
    let Some(win) = window() else { return };
    let Ok(synth) = win.speech_synthesis() else { return };
    refresh_voice(&synth);
    if VOICES_HOOKED.with(|flag| flag.replace(true)) {
        return;
    }
    let synth_for_hook = synth.clone();
    let hook = Closure::wrap(Box::new(move || {
        refresh_voice(&synth_for_hook);
    }) as Box<dyn FnMut()>);
    synth.set_onvoiceschanged(Some(hook.as_ref().unchecked_ref()));
    hook.forget();
}

fn refresh_voice(synth: &SpeechSynthesis) {
    let raw = synth.get_voices();
    let voices: Vec<SpeechSynthesisVoice> = raw
        .iter()
        .filter_map(|v| v.dyn_into::<SpeechSynthesisVoice>().ok())
        .collect();
    let pairs: Vec<(String, String)> = voices.iter().map(|v| (v.name(), v.lang())).collect();
    let chosen = best_voice_index(&pairs).map(|i| voices[i].clone());
    CHOSEN_VOICE.with(|cell| *cell.borrow_mut() = chosen);
}

// --- Media event waits -------------------------------------------------------

/// Resolves `true` once the element can start playback, `false` on error
/// or when the bounded wait elapses first. The settle closures and the
/// pending timeout are reclaimed by whichever settle runs first.
async fn wait_until_playable(audio: &HtmlAudioElement, timeout_ms: i32) -> bool {
    // HAVE_CURRENT_DATA or better can play immediately.
    if audio.ready_state() >= 2 {
        return true;
    }
    type Slot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;
    let ready_slot: Slot = Rc::new(RefCell::new(None));
    let failed_slot: Slot = Rc::new(RefCell::new(None));
    let timer = Rc::new(Cell::new(None::<i32>));
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let element = audio.clone();
        let settle = |ok: bool| -> Closure<dyn FnMut()> {
            let element = element.clone();
            let resolve = resolve.clone();
            let ready_slot = ready_slot.clone();
            let failed_slot = failed_slot.clone();
            let timer = timer.clone();
            Closure::wrap(Box::new(move || {
                element.set_oncanplay(None);
                element.set_oncanplaythrough(None);
                element.set_onloadeddata(None);
                element.set_onerror(None);
                if let (Some(win), Some(id)) = (window(), timer.take()) {
                    win.clear_timeout_with_handle(id);
                }
                // Hooks and timer are gone, so nothing can call back in;
                // the closure running now is freed once this call returns.
                let _ = ready_slot.borrow_mut().take();
                let _ = failed_slot.borrow_mut().take();
                let _ = resolve.call1(&JsValue::NULL, &JsValue::from_bool(ok));
            }) as Box<dyn FnMut()>)
        };
        let ready = settle(true);
        let failed = settle(false);
        element.set_oncanplay(Some(ready.as_ref().unchecked_ref()));
        element.set_oncanplaythrough(Some(ready.as_ref().unchecked_ref()));
        element.set_onloadeddata(Some(ready.as_ref().unchecked_ref()));
        element.set_onerror(Some(failed.as_ref().unchecked_ref()));
        if let Some(win) = window() {
            if let Ok(id) = win.set_timeout_with_callback_and_timeout_and_arguments_0(
                failed.as_ref().unchecked_ref(),
                timeout_ms,
            ) {
                timer.set(Some(id));
            }
        }
        *ready_slot.borrow_mut() = Some(ready);
        *failed_slot.borrow_mut() = Some(failed);
    });
    match JsFuture::from(promise).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(_) => false,
    }
}

/// Resolves when the element stops playing for any reason: natural end,
/// cancellation pause, or error.
async fn wait_ended(audio: &HtmlAudioElement) {
    let slot: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let element = audio.clone();
        let settle_slot = slot.clone();
        let settle = Closure::wrap(Box::new(move || {
            element.set_onended(None);
            element.set_onpause(None);
            element.set_onerror(None);
            let _ = settle_slot.borrow_mut().take();
            let _ = resolve.call0(&JsValue::NULL);
        }) as Box<dyn FnMut()>);
        audio.set_onended(Some(settle.as_ref().unchecked_ref()));
        audio.set_onpause(Some(settle.as_ref().unchecked_ref()));
        audio.set_onerror(Some(settle.as_ref().unchecked_ref()));
        *slot.borrow_mut() = Some(settle);
    });
    let _ = JsFuture::from(promise).await;
}

async fn wait_utterance_end(utterance: &SpeechSynthesisUtterance) {
    let slot: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let utt = utterance.clone();
        let settle_slot = slot.clone();
        let settle = Closure::wrap(Box::new(move || {
            utt.set_onend(None);
            utt.set_onerror(None);
            let _ = settle_slot.borrow_mut().take();
            let _ = resolve.call0(&JsValue::NULL);
        }) as Box<dyn FnMut()>);
        utterance.set_onend(Some(settle.as_ref().unchecked_ref()));
        utterance.set_onerror(Some(settle.as_ref().unchecked_ref()));
        *slot.borrow_mut() = Some(settle);
    });
    let _ = JsFuture::from(promise).await;
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    wasm_bindgen_test_configure!(run_in_browser);

    // 44-byte PCM header plus eight silent samples; loads instantly.
    const SILENT_WAV: &str = "data:audio/wav;base64,\
        UklGRjQAAABXQVZFZm10IBAAAAABAAEAQB8AAIA+AAACABAAZGF0YRAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[wasm_bindgen_test]
    async fn playable_media_settles_true_and_releases_hooks() {
        let audio = HtmlAudioElement::new_with_src(SILENT_WAV).unwrap();
        assert!(wait_until_playable(&audio, 1_500).await);
        assert!(audio.oncanplay().is_none());
        assert!(audio.onloadeddata().is_none());
    }

    #[wasm_bindgen_test]
    async fn missing_media_settles_false_and_releases_hooks() {
        let audio = HtmlAudioElement::new_with_src("/audio/no-such-phrase.mp3").unwrap();
        assert!(!wait_until_playable(&audio, 1_500).await);
        assert!(audio.oncanplay().is_none());
        assert!(audio.oncanplaythrough().is_none());
    }
}
