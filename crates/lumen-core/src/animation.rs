//! Property animations as run by the render authority.

use crate::error::AnimationError;
use crate::props::{NodeProps, Prop};
use serde::{Deserialize, Serialize};

/// Easing curve applied to animation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t * t,
            Self::EaseOut => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
            Self::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
        }
    }
}

/// Timing of one animation. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationSettings {
    pub duration: f64,
    pub delay: f64,
    pub easing: Easing,
    /// Extra plays after the first
    pub repeat: u32,
    /// Play forever; overrides `repeat`
    pub looping: bool,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            duration: 0.0,
            delay: 0.0,
            easing: Easing::Linear,
            repeat: 0,
            looping: false,
        }
    }
}

impl AnimationSettings {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Reject negative or non-finite timings.
    pub fn validate(&self) -> Result<(), AnimationError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(AnimationError::InvalidSettings(format!(
                "duration must be a non-negative number of milliseconds, got {}",
                self.duration
            )));
        }
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(AnimationError::InvalidSettings(format!(
                "delay must be a non-negative number of milliseconds, got {}",
                self.delay
            )));
        }
        Ok(())
    }
}

/// Target values of an animation, applied in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimatableProps(pub Vec<(Prop, f64)>);

impl AnimatableProps {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, prop: Prop, value: f64) -> Self {
        self.0.push((prop, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Prop, f64)> {
        self.0.iter()
    }
}

/// Playback state of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnimationState {
    #[default]
    Stopped,
    Running,
    Paused,
    Finished,
}

/// One property animation bound to a node's property store.
#[derive(Debug, Clone)]
pub struct CoreAnimation {
    targets: AnimatableProps,
    settings: AnimationSettings,
    from: Vec<f64>,
    elapsed: f64,
    plays_left: u32,
    state: AnimationState,
}

impl CoreAnimation {
    pub fn new(targets: AnimatableProps, settings: AnimationSettings) -> Result<Self, AnimationError> {
        settings.validate()?;
        if targets.is_empty() {
            return Err(AnimationError::NoTargets);
        }
        Ok(Self {
            targets,
            settings,
            from: Vec::new(),
            elapsed: 0.0,
            plays_left: 0,
            state: AnimationState::Stopped,
        })
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn targets(&self) -> &AnimatableProps {
        &self.targets
    }

    /// Start from the node's current values, or resume when paused.
    pub fn start(&mut self, props: &NodeProps) {
        if self.state == AnimationState::Paused {
            self.state = AnimationState::Running;
            return;
        }
        if self.state == AnimationState::Running {
            return;
        }
        self.from = self.targets.iter().map(|(p, _)| props.get(*p)).collect();
        self.elapsed = 0.0;
        self.plays_left = self.settings.repeat;
        self.state = AnimationState::Running;
    }

    pub fn pause(&mut self) {
        if self.state == AnimationState::Running {
            self.state = AnimationState::Paused;
        }
    }

    /// Halt playback and restore the values captured at start.
    pub fn stop(&mut self, props: &mut NodeProps) {
        if matches!(self.state, AnimationState::Running | AnimationState::Paused) {
            for ((prop, _), from) in self.targets.iter().zip(&self.from) {
                props.set(*prop, *from);
            }
        }
        self.state = AnimationState::Stopped;
    }

    /// Advance by `dt_ms`. Returns `true` on the tick the animation finishes.
    pub fn tick(&mut self, dt_ms: f64, props: &mut NodeProps) -> bool {
        if self.state != AnimationState::Running {
            return false;
        }
        self.elapsed += dt_ms;
        if self.elapsed < self.settings.delay {
            return false;
        }

        let t = if self.settings.duration <= 0.0 {
            1.0
        } else {
            ((self.elapsed - self.settings.delay) / self.settings.duration).min(1.0)
        };
        self.apply(t, props);

        if t < 1.0 {
            return false;
        }
        if self.settings.looping {
            self.elapsed = self.settings.delay;
            return false;
        }
        if self.plays_left > 0 {
            self.plays_left -= 1;
            self.elapsed = self.settings.delay;
            return false;
        }
        self.state = AnimationState::Finished;
        true
    }

    fn apply(&self, t: f64, props: &mut NodeProps) {
        let eased = self.settings.easing.apply(t);
        for ((prop, to), from) in self.targets.iter().zip(&self.from) {
            props.set(*prop, from + (to - from) * eased);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(duration: f64) -> CoreAnimation {
        CoreAnimation::new(
            AnimatableProps::new().with(Prop::X, 100.0),
            AnimationSettings::with_duration(duration),
        )
        .unwrap()
    }

    #[test]
    fn test_linear_progress() {
        let mut props = NodeProps::new();
        let mut anim = slide(500.0);
        anim.start(&props);

        assert!(!anim.tick(250.0, &mut props));
        assert_eq!(props.get(Prop::X), 50.0);

        assert!(anim.tick(250.0, &mut props));
        assert_eq!(props.get(Prop::X), 100.0);
        assert_eq!(anim.state(), AnimationState::Finished);
    }

    #[test]
    fn test_delay_holds_values() {
        let mut props = NodeProps::new();
        let mut anim = CoreAnimation::new(
            AnimatableProps::new().with(Prop::Alpha, 0.0),
            AnimationSettings {
                duration: 100.0,
                delay: 50.0,
                ..Default::default()
            },
        )
        .unwrap();
        anim.start(&props);
        anim.tick(40.0, &mut props);
        assert_eq!(props.get(Prop::Alpha), 1.0);
        anim.tick(60.0, &mut props);
        assert_eq!(props.get(Prop::Alpha), 0.5);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut props = NodeProps::new();
        let mut anim = slide(100.0);
        anim.start(&props);
        anim.tick(50.0, &mut props);
        anim.pause();
        anim.tick(50.0, &mut props);
        assert_eq!(props.get(Prop::X), 50.0);

        anim.start(&props);
        assert!(anim.tick(50.0, &mut props));
        assert_eq!(props.get(Prop::X), 100.0);
    }

    #[test]
    fn test_stop_restores_start_values() {
        let mut props = NodeProps::new().with(Prop::X, 10.0);
        let mut anim = slide(100.0);
        anim.start(&props);
        anim.tick(50.0, &mut props);
        anim.stop(&mut props);
        assert_eq!(props.get(Prop::X), 10.0);
        assert_eq!(anim.state(), AnimationState::Stopped);
    }

    #[test]
    fn test_repeat_plays_again() {
        let mut props = NodeProps::new();
        let mut anim = CoreAnimation::new(
            AnimatableProps::new().with(Prop::X, 10.0),
            AnimationSettings {
                duration: 10.0,
                repeat: 1,
                ..Default::default()
            },
        )
        .unwrap();
        anim.start(&props);
        assert!(!anim.tick(10.0, &mut props));
        assert_eq!(anim.state(), AnimationState::Running);
        assert!(anim.tick(10.0, &mut props));
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let err = CoreAnimation::new(
            AnimatableProps::new().with(Prop::X, 1.0),
            AnimationSettings::with_duration(-5.0),
        )
        .unwrap_err();
        assert!(matches!(err, AnimationError::InvalidSettings(_)));

        let err = CoreAnimation::new(AnimatableProps::new(), AnimationSettings::default()).unwrap_err();
        assert_eq!(err, AnimationError::NoTargets);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
    }
}
