//! Timed tasks driven by the scene tick.
//!
//! A scene that wants a multi-frame effect (a one-second collapse, a fade)
//! registers a tween with its [`TaskScheduler`] and feeds the scheduler the
//! same `dt` it receives every frame. Nothing runs on its own: when the scene
//! stops ticking, its tasks stop too.
//!
//! Every task carries a [`CancellationToken`]. Tearing a scene down cancels
//! all of them, and anyone still holding a token can see that it is dead.
//!
//! ```ignore
//! let token = tasks.schedule("energy", 1.0, 2.0, 1.0, Easing::CubicOut);
//!
//! // every frame
//! tasks.advance(dt, |key, value| match key {
//!     "energy" => self.energy = value,
//!     _ => {}
//! });
//! ```

use std::cell::Cell;
use std::rc::Rc;

/// Interpolation curve for a tween.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    /// `1 - (1 - t)^3`: fast start, gentle landing.
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Map linear progress `t` in `0..=1` onto the curve.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Shared flag telling a task it must not run again.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug)]
struct Tween {
    key: &'static str,
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    easing: Easing,
    token: CancellationToken,
}

impl Tween {
    fn value(&self) -> f32 {
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed / self.duration
        };
        self.from + (self.to - self.from) * self.easing.apply(t)
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Tweens owned by one scene.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    tasks: Vec<Tween>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tween `key` from `from` to `to` over `duration` seconds.
    ///
    /// A task already running under `key` is cancelled.
    pub fn schedule(
        &mut self,
        key: &'static str,
        from: f32,
        to: f32,
        duration: f32,
        easing: Easing,
    ) -> CancellationToken {
        self.cancel(key);
        let token = CancellationToken::new();
        self.tasks.push(Tween {
            key,
            from,
            to,
            duration,
            elapsed: 0.0,
            easing,
            token: token.clone(),
        });
        token
    }

    /// Step every live task by `dt` and hand its current value to `apply`.
    ///
    /// A finishing task reports its exact end value once, then is dropped.
    /// Cancelled tasks are dropped without being applied.
    pub fn advance<F>(&mut self, dt: f32, mut apply: F)
    where
        F: FnMut(&'static str, f32),
    {
        for task in &mut self.tasks {
            if task.token.is_cancelled() {
                continue;
            }
            task.elapsed += dt;
            apply(task.key, task.value());
        }
        self.tasks
            .retain(|task| !task.token.is_cancelled() && !task.is_finished());
    }

    /// Cancel the task running under `key`, if any.
    pub fn cancel(&mut self, key: &str) {
        for task in self.tasks.iter().filter(|t| t.key == key) {
            task.token.cancel();
        }
        self.tasks.retain(|t| t.key != key);
    }

    /// Cancel everything. Called when the owning scene is torn down.
    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.token.cancel();
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.key == key && !t.token.is_cancelled())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
