//! Node Property Store
//!
//! A flat record of every mutable visual property of one node. Composite
//! properties (`Color`, `Mount`, `Pivot`, ...) fan out to the fields they
//! stand for, so reading a composite returns its primary field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every numeric property a node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Prop {
    X,
    Y,
    Width,
    Height,
    Alpha,
    Scale,
    ScaleX,
    ScaleY,
    Rotation,
    Mount,
    MountX,
    MountY,
    Pivot,
    PivotX,
    PivotY,
    Color,
    ColorTop,
    ColorBottom,
    ColorLeft,
    ColorRight,
    ColorTl,
    ColorTr,
    ColorBl,
    ColorBr,
    ZIndex,
    ZIndexLocked,
}

impl Prop {
    /// Number of property slots.
    pub const COUNT: usize = 26;

    /// All properties in slot order.
    pub const ALL: [Prop; Self::COUNT] = [
        Prop::X,
        Prop::Y,
        Prop::Width,
        Prop::Height,
        Prop::Alpha,
        Prop::Scale,
        Prop::ScaleX,
        Prop::ScaleY,
        Prop::Rotation,
        Prop::Mount,
        Prop::MountX,
        Prop::MountY,
        Prop::Pivot,
        Prop::PivotX,
        Prop::PivotY,
        Prop::Color,
        Prop::ColorTop,
        Prop::ColorBottom,
        Prop::ColorLeft,
        Prop::ColorRight,
        Prop::ColorTl,
        Prop::ColorTr,
        Prop::ColorBl,
        Prop::ColorBr,
        Prop::ZIndex,
        Prop::ZIndexLocked,
    ];

    /// Fixed offset of this property in a [`NodeProps`] record and in the
    /// shared property buffer.
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Property stored at `slot`, if any.
    pub fn from_slot(slot: usize) -> Option<Prop> {
        Self::ALL.get(slot).copied()
    }

    /// The fields written when this property is assigned.
    pub fn expand(self) -> &'static [Prop] {
        use Prop::*;
        match self {
            Scale => &[Scale, ScaleX, ScaleY],
            Mount => &[Mount, MountX, MountY],
            Pivot => &[Pivot, PivotX, PivotY],
            Color => &[
                Color, ColorTop, ColorBottom, ColorLeft, ColorRight, ColorTl, ColorTr, ColorBl,
                ColorBr,
            ],
            ColorTop => &[ColorTop, ColorTl, ColorTr],
            ColorBottom => &[ColorBottom, ColorBl, ColorBr],
            ColorLeft => &[ColorLeft, ColorTl, ColorBl],
            ColorRight => &[ColorRight, ColorTr, ColorBr],
            X => &[X],
            Y => &[Y],
            Width => &[Width],
            Height => &[Height],
            Alpha => &[Alpha],
            ScaleX => &[ScaleX],
            ScaleY => &[ScaleY],
            Rotation => &[Rotation],
            MountX => &[MountX],
            MountY => &[MountY],
            PivotX => &[PivotX],
            PivotY => &[PivotY],
            ColorTl => &[ColorTl],
            ColorTr => &[ColorTr],
            ColorBl => &[ColorBl],
            ColorBr => &[ColorBr],
            ZIndex => &[ZIndex],
            ZIndexLocked => &[ZIndexLocked],
        }
    }

    /// Whether this property holds a packed `0xRRGGBBAA` color.
    pub fn is_color(self) -> bool {
        matches!(
            self,
            Prop::Color
                | Prop::ColorTop
                | Prop::ColorBottom
                | Prop::ColorLeft
                | Prop::ColorRight
                | Prop::ColorTl
                | Prop::ColorTr
                | Prop::ColorBl
                | Prop::ColorBr
        )
    }
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The property record of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProps {
    values: [f64; Prop::COUNT],
}

impl NodeProps {
    pub fn new() -> Self {
        let mut props = Self {
            values: [0.0; Prop::COUNT],
        };
        props.set(Prop::Alpha, 1.0);
        props.set(Prop::Scale, 1.0);
        props.set(Prop::Pivot, 0.5);
        props
    }

    pub fn get(&self, prop: Prop) -> f64 {
        self.values[prop.slot()]
    }

    /// Assign `value`, fanning out composite properties.
    pub fn set(&mut self, prop: Prop, value: f64) {
        for field in prop.expand() {
            self.values[field.slot()] = value;
        }
    }

    /// Overwrite a single slot without fan-out.
    ///
    /// Used when replaying fields that were already expanded by the writer.
    pub fn set_slot(&mut self, slot: usize, value: f64) {
        if let Some(v) = self.values.get_mut(slot) {
            *v = value;
        }
    }

    /// Builder-style assignment.
    pub fn with(mut self, prop: Prop, value: f64) -> Self {
        self.set(prop, value);
        self
    }

    /// Read a color property as packed RGBA.
    pub fn color(&self, prop: Prop) -> u32 {
        self.get(prop) as u32
    }

    pub fn set_color(&mut self, prop: Prop, rgba: u32) {
        self.set(prop, f64::from(rgba));
    }

    pub fn z_index(&self) -> i32 {
        self.get(Prop::ZIndex) as i32
    }

    /// Iterate over `(prop, value)` for every slot.
    pub fn iter(&self) -> impl Iterator<Item = (Prop, f64)> + '_ {
        Prop::ALL.iter().map(move |p| (*p, self.values[p.slot()]))
    }
}

impl Default for NodeProps {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a packed `0xRRGGBBAA` color into normalized channels.
pub fn unpack_rgba(rgba: u32) -> [f32; 4] {
    let r = ((rgba >> 24) & 0xFF) as f32 / 255.0;
    let g = ((rgba >> 16) & 0xFF) as f32 / 255.0;
    let b = ((rgba >> 8) & 0xFF) as f32 / 255.0;
    let a = (rgba & 0xFF) as f32 / 255.0;
    [r, g, b, a]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_match_all_order() {
        for (i, prop) in Prop::ALL.iter().enumerate() {
            assert_eq!(prop.slot(), i);
            assert_eq!(Prop::from_slot(i), Some(*prop));
        }
        assert_eq!(Prop::from_slot(Prop::COUNT), None);
    }

    #[test]
    fn test_defaults() {
        let props = NodeProps::new();
        assert_eq!(props.get(Prop::Alpha), 1.0);
        assert_eq!(props.get(Prop::ScaleX), 1.0);
        assert_eq!(props.get(Prop::PivotY), 0.5);
        assert_eq!(props.get(Prop::MountX), 0.0);
        assert_eq!(props.color(Prop::ColorTl), 0);
    }

    #[test]
    fn test_color_fans_out_to_corners() {
        let mut props = NodeProps::new();
        props.set_color(Prop::Color, 0xff0000ff);
        for corner in [Prop::ColorTl, Prop::ColorTr, Prop::ColorBl, Prop::ColorBr] {
            assert_eq!(props.color(corner), 0xff0000ff);
        }

        props.set_color(Prop::ColorTop, 0x00ff00ff);
        assert_eq!(props.color(Prop::ColorTl), 0x00ff00ff);
        assert_eq!(props.color(Prop::ColorTr), 0x00ff00ff);
        assert_eq!(props.color(Prop::ColorBl), 0xff0000ff);
    }

    #[test]
    fn test_mount_and_pivot_fan_out() {
        let props = NodeProps::new().with(Prop::Mount, 1.0).with(Prop::Pivot, 0.0);
        assert_eq!(props.get(Prop::MountX), 1.0);
        assert_eq!(props.get(Prop::MountY), 1.0);
        assert_eq!(props.get(Prop::PivotX), 0.0);
    }

    #[test]
    fn test_unpack_rgba() {
        let [r, g, b, a] = unpack_rgba(0xff000080);
        assert_eq!(r, 1.0);
        assert_eq!(g, 0.0);
        assert_eq!(b, 0.0);
        assert!((a - 0.5).abs() < 0.01);
    }
}
