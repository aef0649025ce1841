//! Sound-effect channel. Named cues are synthesized from fixed presets
//! into an `AudioBuffer` and played through a shared `AudioContext`; a
//! pre-recorded `/sounds/{name}.mp3` file is the fallback when synthesis
//! is unavailable or disabled. Every failure here is silent: a missing
//! sound must never interrupt gameplay.

use std::cell::{Cell, RefCell};

use wasm_bindgen::prelude::*;
use web_sys::{AudioContext, HtmlAudioElement};

use crate::game::rng::{self, Rng};

// --- Cues & presets ----------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Pop,
    Shake,
    Click,
    Whoosh,
    Success,
}

impl Cue {
    pub const ALL: [Cue; 5] = [Cue::Pop, Cue::Shake, Cue::Click, Cue::Whoosh, Cue::Success];

    pub fn name(self) -> &'static str {
        match self {
            Cue::Pop => "pop",
            Cue::Shake => "shake",
            Cue::Click => "click",
            Cue::Whoosh => "whoosh",
            Cue::Success => "success",
        }
    }

    pub fn file_path(self) -> String {
        format!("/sounds/{}.mp3", self.name())
    }

    /// Fixed synthesis preset per cue, tuned for small ears: short, soft,
    /// more chirp than buzz.
    pub fn preset(self) -> CuePreset {
        match self {
            // Quick upward blip for a popped bubble.
            Cue::Pop => CuePreset {
                wave: Wave::Sine,
                base_freq: 500.0,
                freq_slide: 700.0,
                attack: 0.005,
                sustain: 0.03,
                release: 0.12,
                noise_mix: 0.05,
                gain: 0.9,
            },
            // Low wobble for a wrong guess; gentle, not punishing.
            Cue::Shake => CuePreset {
                wave: Wave::Triangle,
                base_freq: 180.0,
                freq_slide: -60.0,
                attack: 0.005,
                sustain: 0.1,
                release: 0.18,
                noise_mix: 0.2,
                gain: 0.7,
            },
            Cue::Click => CuePreset {
                wave: Wave::Square,
                base_freq: 1000.0,
                freq_slide: 0.0,
                attack: 0.002,
                sustain: 0.015,
                release: 0.04,
                noise_mix: 0.0,
                gain: 0.5,
            },
            // Noise-heavy downward sweep for menu transitions.
            Cue::Whoosh => CuePreset {
                wave: Wave::Saw,
                base_freq: 400.0,
                freq_slide: -250.0,
                attack: 0.04,
                sustain: 0.12,
                release: 0.2,
                noise_mix: 0.8,
                gain: 0.6,
            },
            // Rising C5 to C6 chime for the celebration.
            Cue::Success => CuePreset {
                wave: Wave::Sine,
                base_freq: 523.25,
                freq_slide: 523.25,
                attack: 0.01,
                sustain: 0.25,
                release: 0.3,
                noise_mix: 0.0,
                gain: 0.8,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Square,
    Triangle,
    Saw,
}

#[derive(Clone, Copy, Debug)]
pub struct CuePreset {
    pub wave: Wave,
    /// Oscillator frequency at cue start, Hz.
    pub base_freq: f32,
    /// Linear frequency drift across the whole cue, Hz.
    pub freq_slide: f32,
    pub attack: f32,
    pub sustain: f32,
    pub release: f32,
    /// Share of lowpass-filtered white noise blended over the tone, 0..1.
    pub noise_mix: f32,
    pub gain: f32,
}

impl CuePreset {
    pub fn duration(&self) -> f32 {
        self.attack + self.sustain + self.release
    }
}

/// Renders one cue to mono samples. Pure apart from the noise draws, so
/// the shape and bounds are testable off-browser.
pub fn render_cue(rng: &mut Rng, preset: CuePreset, volume: f32, sample_rate: f32) -> Vec<f32> {
    let duration = preset.duration();
    let len = (duration * sample_rate).ceil() as usize;
    let mut samples = Vec::with_capacity(len);
    let mut phase: f32 = 0.0;
    let mut noise_state: f32 = 0.0;
    for i in 0..len {
        let t = i as f32 / sample_rate;
        let freq = preset.base_freq + preset.freq_slide * (t / duration);
        phase += std::f32::consts::TAU * freq / sample_rate;
        let cycles = phase / std::f32::consts::TAU;
        let tone = match preset.wave {
            Wave::Sine => phase.sin(),
            Wave::Square => {
                if phase.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Wave::Triangle => (2.0 / std::f32::consts::PI) * phase.sin().asin(),
            Wave::Saw => 2.0 * (cycles - cycles.floor()) - 1.0,
        };
        let white = rng.gen_f64() as f32 * 2.0 - 1.0;
        noise_state += 0.2 * (white - noise_state);
        let mixed = tone * (1.0 - preset.noise_mix) + noise_state * preset.noise_mix;
        let sample = mixed * envelope(t, &preset) * preset.gain * volume;
        samples.push(sample.clamp(-1.0, 1.0));
    }
    samples
}

fn envelope(t: f32, preset: &CuePreset) -> f32 {
    if t < preset.attack {
        t / preset.attack.max(1e-6)
    } else if t < preset.attack + preset.sustain {
        1.0
    } else {
        let rel = t - preset.attack - preset.sustain;
        (1.0 - rel / preset.release.max(1e-6)).max(0.0)
    }
}

// --- Config & playback -------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct SoundConfig {
    pub enabled: bool,
    /// Default cue volume; generated waveforms read louder than files.
    pub volume: f32,
    /// Skip synthesis and go straight to the `/sounds/` files.
    pub use_files: bool,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.3,
            use_files: false,
        }
    }
}

thread_local! {
    static SOUND_CONFIG: Cell<SoundConfig> = Cell::new(SoundConfig::default());
    static AUDIO_CTX: RefCell<Option<AudioContext>> = RefCell::new(None);
    // Shared catch handler for play() promises; an unplayable cue is just
    // silence, never an unhandled rejection in the console.
    static REJECTION_SINK: Closure<dyn FnMut(JsValue)> =
        Closure::wrap(Box::new(|_| {}) as Box<dyn FnMut(JsValue)>);
}

pub fn config() -> SoundConfig {
    SOUND_CONFIG.with(|cell| cell.get())
}

pub fn set_config(cfg: SoundConfig) {
    SOUND_CONFIG.with(|cell| cell.set(cfg));
}

/// Plays a named cue, fire-and-forget. A per-call volume replaces the
/// config default for this cue only.
pub fn play(cue: Cue, volume: Option<f32>) {
    let cfg = config();
    if !cfg.enabled {
        return;
    }
    let volume = volume.unwrap_or(cfg.volume);
    if !cfg.use_files && play_synth(cue, volume) {
        return;
    }
    play_file(cue, volume);
}

fn audio_context() -> Option<AudioContext> {
    AUDIO_CTX.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = AudioContext::new().ok();
        }
        slot.clone()
    })
}

fn play_synth(cue: Cue, volume: f32) -> bool {
    let Some(ctx) = audio_context() else {
        return false;
    };
    // The context starts suspended until a user gesture; every cue here
    // follows a tap, so resume settles before the buffer is audible.
    let _ = ctx.resume();
    let sample_rate = ctx.sample_rate();
    let mut samples = rng::with(|rng| render_cue(rng, cue.preset(), volume, sample_rate));
    if samples.is_empty() {
        return false;
    }
    let Ok(buffer) = ctx.create_buffer(1, samples.len() as u32, sample_rate) else {
        return false;
    };
    if buffer.copy_to_channel(&mut samples, 0).is_err() {
        return false;
    }
    let Ok(source) = ctx.create_buffer_source() else {
        return false;
    };
    source.set_buffer(Some(&buffer));
    if source.connect_with_audio_node(&ctx.destination()).is_err() {
        return false;
    }
    source.start().is_ok()
}

fn play_file(cue: Cue, volume: f32) {
    if let Ok(audio) = HtmlAudioElement::new_with_src(&cue.file_path()) {
        audio.set_volume(volume as f64);
        if let Ok(promise) = audio.play() {
            REJECTION_SINK.with(|sink| {
                let _ = promise.catch(sink);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::Rng;

    const SAMPLE_RATE: f32 = 44_100.0;

    #[test]
    fn cue_names_and_paths() {
        let names: Vec<&str> = Cue::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["pop", "shake", "click", "whoosh", "success"]);
        assert_eq!(Cue::Pop.file_path(), "/sounds/pop.mp3");
    }

    #[test]
    fn every_cue_renders_bounded_samples() {
        let mut rng = Rng::from_seed(8);
        for cue in Cue::ALL {
            let preset = cue.preset();
            let samples = render_cue(&mut rng, preset, 0.8, SAMPLE_RATE);
            let expected_len = (preset.duration() * SAMPLE_RATE).ceil() as usize;
            assert_eq!(samples.len(), expected_len);
            assert!(!samples.is_empty());
            let bound = preset.gain * 0.8 + 1e-4;
            assert!(samples.iter().all(|s| s.abs() <= bound), "{} clips", cue.name());
        }
    }

    #[test]
    fn release_tail_fades_to_silence() {
        let mut rng = Rng::from_seed(8);
        for cue in Cue::ALL {
            let samples = render_cue(&mut rng, cue.preset(), 0.8, SAMPLE_RATE);
            let last = samples.last().copied().unwrap_or(1.0);
            assert!(last.abs() < 0.01, "{} ends at {}", cue.name(), last);
        }
    }

    #[test]
    fn zero_volume_renders_silence() {
        let mut rng = Rng::from_seed(8);
        let samples = render_cue(&mut rng, Cue::Pop.preset(), 0.0, SAMPLE_RATE);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn default_config_matches_shipping_values() {
        let cfg = SoundConfig::default();
        assert!(cfg.enabled);
        assert!((cfg.volume - 0.3).abs() < f32::EPSILON);
        assert!(!cfg.use_files);
    }
}
