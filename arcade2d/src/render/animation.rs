use std::collections::HashMap;

/// How many times a clip plays after its first run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    Times(u32),
}

/// A named sequence of spritesheet frames played at a fixed rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub key: String,
    /// Spritesheet the frame indices refer to.
    pub texture_key: String,
    pub frames: Vec<u32>,
    /// Frames per second.
    pub frame_rate: f32,
    pub repeat: Repeat,
}

impl AnimationClip {
    /// A clip that plays once and holds its last frame.
    pub fn new(
        key: impl Into<String>,
        texture_key: impl Into<String>,
        frames: Vec<u32>,
        frame_rate: f32,
    ) -> Self {
        Self {
            key: key.into(),
            texture_key: texture_key.into(),
            frames,
            frame_rate,
            repeat: Repeat::Times(0),
        }
    }

    pub fn looping(mut self) -> Self {
        self.repeat = Repeat::Forever;
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Seconds each frame stays on screen.
    pub fn frame_duration(&self) -> f32 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            f32::INFINITY
        }
    }
}

/// Inclusive range of spritesheet frame indices, `start..=end`.
pub fn generate_frame_numbers(start: u32, end: u32) -> Vec<u32> {
    if start <= end {
        (start..=end).collect()
    } else {
        (end..=start).rev().collect()
    }
}

/// Global table of animation clips, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct AnimationRegistry {
    clips: HashMap<String, AnimationClip>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip. Keys are first-come: returns false (and keeps the existing
    /// clip) if the key is already taken.
    pub fn create(&mut self, clip: AnimationClip) -> bool {
        if self.clips.contains_key(&clip.key) {
            log::debug!("animation '{}' already exists; keeping the original", clip.key);
            return false;
        }
        self.clips.insert(clip.key.clone(), clip);
        true
    }

    pub fn get(&self, key: &str) -> Option<&AnimationClip> {
        self.clips.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.clips.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Per-sprite playback state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationState {
    current: Option<String>,
    frame_index: usize,
    timer: f32,
    playing: bool,
    paused: bool,
    loops_done: u32,
}

impl AnimationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `clip` from its first frame. With `ignore_if_playing`, a call for the
    /// clip that is already running is a no-op. Returns true if playback (re)started.
    pub fn play(&mut self, clip: &AnimationClip, ignore_if_playing: bool) -> bool {
        if ignore_if_playing && self.playing && self.current.as_deref() == Some(clip.key.as_str())
        {
            return false;
        }
        self.current = Some(clip.key.clone());
        self.frame_index = 0;
        self.timer = 0.0;
        self.playing = !clip.frames.is_empty();
        self.paused = false;
        self.loops_done = 0;
        true
    }

    /// Freeze on the current frame.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Spritesheet frame currently shown for `clip`.
    pub fn current_frame(&self, clip: &AnimationClip) -> Option<u32> {
        clip.frames.get(self.frame_index).copied()
    }

    /// Advance playback by `dt` seconds. `clip` must be the clip named by `current_key`.
    pub fn advance(&mut self, clip: &AnimationClip, dt: f32) {
        if !self.playing || self.paused || clip.frames.is_empty() {
            return;
        }
        let frame_duration = clip.frame_duration();
        self.timer += dt;
        while self.timer >= frame_duration {
            self.timer -= frame_duration;
            self.frame_index += 1;
            if self.frame_index < clip.frames.len() {
                continue;
            }
            let again = match clip.repeat {
                Repeat::Forever => true,
                Repeat::Times(n) => self.loops_done < n,
            };
            if again {
                self.frame_index = 0;
                self.loops_done += 1;
            } else {
                self.frame_index = clip.frames.len() - 1;
                self.timer = 0.0;
                self.playing = false;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_clip() -> AnimationClip {
        AnimationClip::new("run", "player", generate_frame_numbers(0, 7), 10.0).looping()
    }

    #[test]
    fn frame_numbers_are_inclusive() {
        assert_eq!(generate_frame_numbers(0, 3), vec![0, 1, 2, 3]);
        assert_eq!(generate_frame_numbers(4, 4), vec![4]);
    }

    #[test]
    fn registry_keeps_first_clip_for_a_key() {
        let mut registry = AnimationRegistry::new();
        assert!(registry.create(run_clip()));
        assert!(!registry.create(AnimationClip::new("run", "player", vec![1], 1.0)));
        assert_eq!(registry.get("run").map(|c| c.frames.len()), Some(8));
    }

    #[test]
    fn looping_clip_wraps_around() {
        let clip = run_clip();
        let mut state = AnimationState::new();
        state.play(&clip, true);
        state.advance(&clip, 0.85);
        assert_eq!(state.current_frame(&clip), Some(0));
        assert!(state.is_playing());
        state.advance(&clip, 0.1);
        assert_eq!(state.current_frame(&clip), Some(1));
    }

    #[test]
    fn ignore_if_playing_keeps_progress() {
        let clip = run_clip();
        let mut state = AnimationState::new();
        state.play(&clip, true);
        state.advance(&clip, 0.35);
        assert!(!state.play(&clip, true));
        assert_eq!(state.current_frame(&clip), Some(3));
        assert!(state.play(&clip, false));
        assert_eq!(state.current_frame(&clip), Some(0));
    }

    #[test]
    fn one_shot_clip_holds_last_frame() {
        let idle = AnimationClip::new("idle", "player", vec![4], 20.0);
        let mut state = AnimationState::new();
        state.play(&idle, true);
        state.advance(&idle, 1.0);
        assert!(!state.is_playing());
        assert_eq!(state.current_frame(&idle), Some(4));
        assert!(state.play(&idle, true));
    }

    #[test]
    fn paused_state_does_not_advance() {
        let clip = run_clip();
        let mut state = AnimationState::new();
        state.play(&clip, true);
        state.advance(&clip, 0.25);
        state.pause();
        state.advance(&clip, 5.0);
        assert_eq!(state.current_frame(&clip), Some(2));
    }
}
