//! Confetti burst behind a successful pop: a fixed particle count under
//! constant gravity, drawn on the fullscreen overlay canvas until the
//! last particle's life runs out. Purely visual; gameplay never waits on
//! it and round transitions may overlap a running burst.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Element, HtmlCanvasElement, window};

use crate::game::rng::{self, Rng};

/// Celebration palette; the trailing white reads as sparkle.
pub const PALETTE: [&str; 7] = [
    "#ff6b9d", "#4ecdc4", "#ffe66d", "#a8e6cf", "#ffd3a5", "#c7ceea", "#ffffff",
];

pub const BURST_COUNT: usize = 50;
const GRAVITY: f64 = 0.3;
const LIFE_DECAY: f64 = 0.02;

#[derive(Clone, Debug)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: &'static str,
    pub size: f64,
    pub rotation: f64,
    pub spin: f64,
    /// 1.0 at spawn, decremented per frame; doubles as draw alpha.
    pub life: f64,
}

/// Spawns one burst centered on `(cx, cy)`: random scatter with a slight
/// upward bias, palette color, size 4..12 px, random rotation and spin.
pub fn spawn_burst(rng: &mut Rng, cx: f64, cy: f64) -> Vec<Particle> {
    (0..BURST_COUNT)
        .map(|_| Particle {
            x: cx,
            y: cy,
            vx: (rng.gen_f64() - 0.5) * 10.0,
            vy: (rng.gen_f64() - 0.5) * 10.0 - 2.0,
            color: PALETTE[rng.gen_range(PALETTE.len())],
            size: rng.gen_f64() * 8.0 + 4.0,
            rotation: rng.gen_f64() * std::f64::consts::TAU,
            spin: (rng.gen_f64() - 0.5) * 0.2,
            life: 1.0,
        })
        .collect()
}

/// Advances every live particle one frame: position under velocity,
/// gravity into vertical velocity, rotation under spin, life decay.
/// Returns whether any particle is still alive afterwards.
pub fn step_particles(particles: &mut [Particle]) -> bool {
    let mut alive = false;
    for p in particles.iter_mut() {
        if p.life <= 0.0 {
            continue;
        }
        p.x += p.vx;
        p.y += p.vy;
        p.vy += GRAVITY;
        p.rotation += p.spin;
        p.life -= LIFE_DECAY;
        if p.life > 0.0 {
            alive = true;
        }
    }
    alive
}

/// Fires a burst at the element's on-screen center. The render loop owns
/// itself via the animation-frame callback and drops its own closure once
/// every particle is dead, leaving the canvas cleared.
pub fn burst(anchor: &Element) {
    let Some(win) = window() else { return };
    let Some(doc) = win.document() else { return };
    let Some(canvas) = doc
        .get_element_by_id("confetti-canvas")
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
    else {
        return;
    };
    // Size the canvas to the viewport so particle coordinates line up
    // with getBoundingClientRect positions.
    let width = win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = win.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    canvas.set_width(width as u32);
    canvas.set_height(height as u32);
    let Ok(Some(ctx_obj)) = canvas.get_context("2d") else {
        return;
    };
    let Ok(ctx) = ctx_obj.dyn_into::<CanvasRenderingContext2d>() else {
        return;
    };

    let rect = anchor.get_bounding_client_rect();
    let cx = rect.left() + rect.width() / 2.0;
    let cy = rect.top() + rect.height() / 2.0;
    let mut particles = rng::with(|rng| spawn_burst(rng, cx, cy));

    type FrameCallback = std::rc::Rc<std::cell::RefCell<Option<Closure<dyn FnMut()>>>>;
    let f: FrameCallback = std::rc::Rc::new(std::cell::RefCell::new(None));
    let g = f.clone();
    let loop_canvas = canvas.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let w = loop_canvas.width() as f64;
        let h = loop_canvas.height() as f64;
        ctx.clear_rect(0.0, 0.0, w, h);
        let alive = step_particles(&mut particles);
        for p in particles.iter().filter(|p| p.life > 0.0) {
            ctx.save();
            ctx.set_global_alpha(p.life);
            let _ = ctx.translate(p.x, p.y);
            let _ = ctx.rotate(p.rotation);
            ctx.set_fill_style_str(p.color);
            ctx.fill_rect(-p.size / 2.0, -p.size / 2.0, p.size, p.size);
            ctx.restore();
        }
        if alive {
            if let (Some(win), Some(cb)) = (window(), f.borrow().as_ref()) {
                let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
            }
        } else {
            ctx.clear_rect(0.0, 0.0, w, h);
            // Drop our own closure; cleanup happens once this call returns.
            let _ = f.borrow_mut().take();
        }
    }) as Box<dyn FnMut()>));
    if let (Some(win), Some(cb)) = (window(), g.borrow().as_ref()) {
        let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::Rng;

    #[test]
    fn burst_spawns_fixed_count_at_anchor() {
        let mut rng = Rng::from_seed(13);
        let particles = spawn_burst(&mut rng, 120.0, 80.0);
        assert_eq!(particles.len(), BURST_COUNT);
        for p in &particles {
            assert_eq!((p.x, p.y), (120.0, 80.0));
            assert!(PALETTE.contains(&p.color));
            assert!((4.0..12.0).contains(&p.size));
            assert!((0.0..std::f64::consts::TAU).contains(&p.rotation));
            assert!(p.vx.abs() <= 5.0);
            assert!((-7.0..=3.0).contains(&p.vy));
            assert_eq!(p.life, 1.0);
        }
    }

    #[test]
    fn gravity_pulls_velocity_down() {
        let mut rng = Rng::from_seed(13);
        let mut particles = spawn_burst(&mut rng, 0.0, 0.0);
        let before: Vec<f64> = particles.iter().map(|p| p.vy).collect();
        step_particles(&mut particles);
        for (p, vy0) in particles.iter().zip(before) {
            assert!((p.vy - (vy0 + 0.3)).abs() < 1e-9);
        }
    }

    #[test]
    fn life_decays_monotonically_until_dead() {
        let mut rng = Rng::from_seed(13);
        let mut particles = spawn_burst(&mut rng, 0.0, 0.0);
        let mut steps = 0;
        let mut last_life = particles[0].life;
        while step_particles(&mut particles) {
            steps += 1;
            assert!(particles[0].life < last_life || particles[0].life <= 0.0);
            last_life = particles[0].life;
            assert!(steps <= 60, "burst never dies");
        }
        // life 1.0 at 0.02 per frame is gone within ~50 frames
        assert!((45..=55).contains(&steps), "died after {steps} steps");
        assert!(particles.iter().all(|p| p.life <= 0.0));
    }

    #[test]
    fn dead_particles_stop_moving() {
        let mut rng = Rng::from_seed(13);
        let mut particles = spawn_burst(&mut rng, 0.0, 0.0);
        while step_particles(&mut particles) {}
        let frozen: Vec<(f64, f64)> = particles.iter().map(|p| (p.x, p.y)).collect();
        step_particles(&mut particles);
        let after: Vec<(f64, f64)> = particles.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(frozen, after);
    }
}
