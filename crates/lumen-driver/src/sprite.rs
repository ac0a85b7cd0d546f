//! Sprite frame sequencing.
//!
//! Cycles a node's texture through a range of frames at a fixed interval.
//! Left-facing frames are the right-facing ones flipped horizontally.

use crate::error::RenderError;
use crate::node::Node;
use lumen_core::{AnimationError, TextureDesc, TextureOptions};
use std::time::Duration;

/// Which way the sprite faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone)]
struct Playback {
    facing: Facing,
    start: usize,
    end: usize,
    interval: Duration,
    next: usize,
    current: usize,
    elapsed: Duration,
}

/// Frame-by-frame texture animation for one node.
#[derive(Debug)]
pub struct FrameSequence {
    node: Node,
    right: Vec<TextureDesc>,
    left: Vec<TextureDesc>,
    playback: Option<Playback>,
}

impl FrameSequence {
    pub fn new(node: Node, right: Vec<TextureDesc>) -> Self {
        let left = right
            .iter()
            .map(|frame| {
                TextureDesc::new(
                    frame.kind().clone(),
                    TextureOptions {
                        flip_x: true,
                        ..frame.options()
                    },
                )
            })
            .collect();
        Self {
            node,
            right,
            left,
            playback: None,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    fn frames(&self, facing: Facing) -> &[TextureDesc] {
        match facing {
            Facing::Left => &self.left,
            Facing::Right => &self.right,
        }
    }

    /// Loop frames `start..=end`, showing `start` right away.
    pub fn play(
        &mut self,
        facing: Facing,
        start: usize,
        end: usize,
        interval: Duration,
    ) -> Result<(), RenderError> {
        let len = self.frames(facing).len();
        if end >= len || start > end {
            return Err(AnimationError::FrameOutOfBounds { start, end, len }.into());
        }
        if interval.is_zero() {
            return Err(AnimationError::InvalidSettings(
                "frame interval must be positive".to_string(),
            )
            .into());
        }
        self.playback = Some(Playback {
            facing,
            start,
            end,
            interval,
            next: start,
            current: start,
            elapsed: Duration::ZERO,
        });
        self.show_next()
    }

    /// Advance the clock, switching frames for every interval that elapsed.
    pub fn advance(&mut self, dt: Duration) -> Result<(), RenderError> {
        let Some(playback) = self.playback.as_mut() else {
            return Ok(());
        };
        playback.elapsed += dt;
        let mut steps = 0;
        while playback.elapsed >= playback.interval {
            playback.elapsed -= playback.interval;
            steps += 1;
        }
        for _ in 0..steps {
            self.show_next()?;
        }
        Ok(())
    }

    /// Stop cycling. The current frame stays on the node.
    pub fn stop(&mut self) {
        self.playback = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Index of the frame on screen, if playing.
    pub fn current_frame(&self) -> Option<(Facing, usize)> {
        self.playback.as_ref().map(|p| (p.facing, p.current))
    }

    fn show_next(&mut self) -> Result<(), RenderError> {
        let Some(playback) = self.playback.as_mut() else {
            return Ok(());
        };
        let index = playback.next;
        playback.current = index;
        playback.next = if index >= playback.end {
            playback.start
        } else {
            index + 1
        };
        let facing = playback.facing;
        let frame = self.frames(facing)[index].clone();
        self.node.set_texture(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectDriver;
    use crate::driver::RenderDriver;
    use lumen_core::{Dimensions, ImageResolver, NodeProps, ResourceError};

    struct Sheet;

    impl ImageResolver for Sheet {
        fn resolve(&self, _src: &str) -> Result<Dimensions, ResourceError> {
            Ok(Dimensions::new(800, 300))
        }
    }

    fn sequence(driver: &DirectDriver) -> FrameSequence {
        let sheet = TextureDesc::image("img://sheet.png");
        let frames = (0..8)
            .map(|i| TextureDesc::sub_texture(&sheet, i * 100, 0, 100, 150, TextureOptions::default()))
            .collect();
        FrameSequence::new(driver.create_node(NodeProps::new()).unwrap(), frames)
    }

    #[test]
    fn test_frames_wrap_to_start() {
        let driver = DirectDriver::new(Box::new(Sheet));
        let mut seq = sequence(&driver);
        let interval = Duration::from_millis(100);

        seq.play(Facing::Right, 2, 3, interval).unwrap();
        assert_eq!(seq.current_frame(), Some((Facing::Right, 2)));
        seq.advance(interval).unwrap();
        assert_eq!(seq.current_frame(), Some((Facing::Right, 3)));
        seq.advance(interval).unwrap();
        assert_eq!(seq.current_frame(), Some((Facing::Right, 2)));
        assert!(seq.node().texture().unwrap().same(&seq.right[2]));
    }

    #[test]
    fn test_left_frames_are_flipped() {
        let driver = DirectDriver::new(Box::new(Sheet));
        let mut seq = sequence(&driver);
        seq.play(Facing::Left, 0, 7, Duration::from_millis(50)).unwrap();
        seq.advance(Duration::from_millis(120)).unwrap();

        assert_eq!(seq.current_frame(), Some((Facing::Left, 2)));
        let shown = seq.node().texture().unwrap();
        assert!(shown.options().flip_x);
        assert_eq!(shown.kind().type_name(), "SubTexture");
    }

    #[test]
    fn test_out_of_bounds_fails_fast() {
        let driver = DirectDriver::new(Box::new(Sheet));
        let mut seq = sequence(&driver);
        let err = seq
            .play(Facing::Right, 0, 8, Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Animation(AnimationError::FrameOutOfBounds { end: 8, len: 8, .. })
        ));
        assert!(seq.play(Facing::Right, 5, 4, Duration::from_millis(100)).is_err());
        assert!(seq.play(Facing::Right, 0, 1, Duration::ZERO).is_err());
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_stop_keeps_frame() {
        let driver = DirectDriver::new(Box::new(Sheet));
        let mut seq = sequence(&driver);
        seq.play(Facing::Right, 4, 6, Duration::from_millis(10)).unwrap();
        seq.stop();
        seq.advance(Duration::from_millis(100)).unwrap();
        assert!(seq.node().texture().unwrap().same(&seq.right[4]));
        assert_eq!(seq.current_frame(), None);
    }
}
