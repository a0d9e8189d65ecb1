//! Overlay placement on a detected face.
//!
//! Pure functions from a face, an overlay kind and the user tuning to a
//! single draw instruction. Nothing here touches OpenCV.

use crate::face::{EyeAnchors, Face};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SCALE_MIN: f32 = 0.6;
pub const SCALE_MAX: f32 = 2.2;
pub const OFFSET_LIMIT: f32 = 200.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    #[default]
    Hat,
    Glasses,
    Mustache,
    Custom,
    Mask,
    Logo,
    None,
}

impl OverlayKind {
    /// Selector order, matches the filter trackbar.
    pub const ALL: [OverlayKind; 7] = [
        OverlayKind::Hat,
        OverlayKind::Glasses,
        OverlayKind::Mustache,
        OverlayKind::Custom,
        OverlayKind::Mask,
        OverlayKind::Logo,
        OverlayKind::None,
    ];

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or_default()
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn placement_rule(self) -> Option<PlacementRule> {
        let rule = match self {
            OverlayKind::Hat => PlacementRule::new(1.0, VerticalAnchor::AboveTop { lift: 0.85 }),
            OverlayKind::Glasses => PlacementRule::new(1.15, VerticalAnchor::BoxFraction(0.20)),
            OverlayKind::Mustache => PlacementRule::new(0.85, VerticalAnchor::BoxFraction(0.55)),
            OverlayKind::Custom => PlacementRule::new(1.0, VerticalAnchor::Centered),
            OverlayKind::Mask | OverlayKind::Logo => PlacementRule::new(1.0, VerticalAnchor::Top),
            OverlayKind::None => return None,
        };
        Some(rule)
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlayKind::Hat => "hat",
            OverlayKind::Glasses => "glasses",
            OverlayKind::Mustache => "mustache",
            OverlayKind::Custom => "custom",
            OverlayKind::Mask => "mask",
            OverlayKind::Logo => "logo",
            OverlayKind::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for OverlayKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown overlay kind {value:?}"))
    }
}

/// Where the top edge of the overlay goes relative to the face box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerticalAnchor {
    /// Above the box top, raised by a fraction of the overlay height.
    AboveTop { lift: f32 },
    /// At a fraction of the box height below the box top.
    BoxFraction(f32),
    /// Overlay centered vertically in the box.
    Centered,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRule {
    pub scale_multiplier: f32,
    pub vertical_anchor: VerticalAnchor,
}

impl PlacementRule {
    pub const fn new(scale_multiplier: f32, vertical_anchor: VerticalAnchor) -> Self {
        Self {
            scale_multiplier,
            vertical_anchor,
        }
    }
}

/// User knobs for overlay placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementTuning {
    pub scale: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

impl Default for PlacementTuning {
    fn default() -> Self {
        Self {
            scale: 1.25,
            x_offset: 0.0,
            y_offset: -20.0,
        }
    }
}

impl PlacementTuning {
    pub fn new(scale: f32, x_offset: f32, y_offset: f32) -> Self {
        Self {
            scale,
            x_offset,
            y_offset,
        }
        .clamped()
    }

    /// Clamp into the slider ranges.
    pub fn clamped(self) -> Self {
        Self {
            scale: self.scale.clamp(SCALE_MIN, SCALE_MAX),
            x_offset: self.x_offset.clamp(-OFFSET_LIMIT, OFFSET_LIMIT),
            y_offset: self.y_offset.clamp(-OFFSET_LIMIT, OFFSET_LIMIT),
        }
    }
}

/// Natural pixel size of an overlay image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f32,
    pub height: f32,
}

impl ImageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn aspect(&self) -> Option<f32> {
        let aspect = self.height / self.width;
        (aspect.is_finite() && aspect > 0.0).then_some(aspect)
    }
}

/// Draw an image at (`x`, `y`) with the given size, rotated by `angle`
/// radians around its own center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstruction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl DrawInstruction {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

pub fn head_tilt(face: &Face, anchors: EyeAnchors) -> f32 {
    let (Some(left), Some(right)) = (face.keypoint(anchors.left), face.keypoint(anchors.right))
    else {
        return 0.0;
    };

    let dx = right.x - left.x;
    let dy = right.y - left.y;
    if !dx.is_finite() || !dy.is_finite() {
        return 0.0;
    }
    dy.atan2(dx)
}

pub fn place_overlay(
    face: &Face,
    kind: OverlayKind,
    image_size: ImageSize,
    tuning: &PlacementTuning,
    anchors: EyeAnchors,
) -> Option<DrawInstruction> {
    let rule = kind.placement_rule()?;
    let face_box = face.bounding_box?;
    let aspect = image_size.aspect()?;

    let width = face_box.width * tuning.scale * rule.scale_multiplier;
    let height = width * aspect;

    let x = face_box.x_min + (face_box.width - width) / 2.0;
    let y = match rule.vertical_anchor {
        VerticalAnchor::AboveTop { lift } => face_box.y_min - height * lift,
        VerticalAnchor::BoxFraction(fraction) => face_box.y_min + face_box.height * fraction,
        VerticalAnchor::Centered => face_box.y_min + (face_box.height - height) / 2.0,
        VerticalAnchor::Top => face_box.y_min,
    };

    Some(DrawInstruction {
        x: x + tuning.x_offset,
        y: y + tuning.y_offset,
        width,
        height,
        angle: head_tilt(face, anchors),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{BoundingBox, Keypoint};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::f32::consts::FRAC_PI_2;

    const ANCHORS: EyeAnchors = EyeAnchors::new(0, 1);

    fn face_with_eyes(left: (f32, f32), right: (f32, f32)) -> Face {
        Face::new(
            BoundingBox::new(100.0, 50.0, 200.0, 200.0),
            vec![Keypoint::new(left.0, left.1), Keypoint::new(right.0, right.1)],
        )
    }

    fn untuned() -> PlacementTuning {
        PlacementTuning {
            scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }

    #[test]
    fn level_eyes_have_no_tilt() {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        assert_relative_eq!(head_tilt(&face, ANCHORS), 0.0);
    }

    #[test]
    fn vertical_eyes_tilt_a_quarter_turn() {
        let face = face_with_eyes((0.0, 0.0), (0.0, 10.0));
        assert_relative_eq!(head_tilt(&face, ANCHORS), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn missing_anchor_means_no_tilt() {
        let mut face = face_with_eyes((0.0, 0.0), (0.0, 10.0));
        face.keypoints.truncate(1);
        face.keypoints.push(Keypoint::new(3.0, 7.0));
        assert_eq!(head_tilt(&face, EyeAnchors::new(0, 2)), 0.0);
        assert_eq!(head_tilt(&face, EyeAnchors::new(5, 1)), 0.0);
    }

    #[test]
    fn non_finite_anchor_means_no_tilt() {
        let face = face_with_eyes((0.0, 0.0), (f32::NAN, 10.0));
        assert_eq!(head_tilt(&face, ANCHORS), 0.0);
    }

    #[test]
    fn hat_sits_above_the_box() {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        let instruction = place_overlay(
            &face,
            OverlayKind::Hat,
            ImageSize::new(600.0, 360.0),
            &untuned(),
            ANCHORS,
        )
        .unwrap();

        assert_relative_eq!(instruction.width, 200.0);
        assert_relative_eq!(instruction.height, 120.0);
        assert_relative_eq!(instruction.x, 100.0);
        assert_relative_eq!(instruction.y, -52.0, epsilon = 1e-4);
        assert_relative_eq!(instruction.angle, 0.0);
    }

    #[rstest]
    #[case(OverlayKind::Glasses, 230.0, 50.0 + 40.0)]
    #[case(OverlayKind::Mustache, 170.0, 50.0 + 110.0)]
    #[case(OverlayKind::Mask, 200.0, 50.0)]
    #[case(OverlayKind::Logo, 200.0, 50.0)]
    fn kinds_anchor_inside_the_box(
        #[case] kind: OverlayKind,
        #[case] width: f32,
        #[case] y: f32,
    ) {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        let instruction =
            place_overlay(&face, kind, ImageSize::new(100.0, 50.0), &untuned(), ANCHORS).unwrap();

        assert_relative_eq!(instruction.width, width, epsilon = 1e-3);
        assert_relative_eq!(instruction.x, 100.0 + (200.0 - width) / 2.0, epsilon = 1e-3);
        assert_relative_eq!(instruction.y, y, epsilon = 1e-3);
    }

    #[test]
    fn custom_is_centered_vertically() {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        let instruction = place_overlay(
            &face,
            OverlayKind::Custom,
            ImageSize::new(100.0, 50.0),
            &untuned(),
            ANCHORS,
        )
        .unwrap();
        // 200 wide, 100 high in a 200 high box
        assert_relative_eq!(instruction.y, 100.0);
    }

    #[rstest]
    fn aspect_is_preserved(
        #[values(
            OverlayKind::Hat,
            OverlayKind::Glasses,
            OverlayKind::Mustache,
            OverlayKind::Custom,
            OverlayKind::Mask,
            OverlayKind::Logo
        )]
        kind: OverlayKind,
        #[values((37.0, 80.0), (640.0, 12.5), (1.0, 1.0))] box_size: (f32, f32),
    ) {
        let face = Face::new(BoundingBox::new(5.0, 9.0, box_size.0, box_size.1), vec![]);
        let image = ImageSize::new(700.0, 240.0);
        let instruction =
            place_overlay(&face, kind, image, &PlacementTuning::default(), ANCHORS).unwrap();
        assert_relative_eq!(
            instruction.height / instruction.width,
            240.0 / 700.0,
            max_relative = 1e-5
        );
    }

    #[test]
    fn offsets_are_added_last() {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        let tuning = PlacementTuning::new(1.0, 15.0, -30.0);
        let instruction = place_overlay(
            &face,
            OverlayKind::Hat,
            ImageSize::new(600.0, 360.0),
            &tuning,
            ANCHORS,
        )
        .unwrap();
        assert_relative_eq!(instruction.x, 115.0);
        assert_relative_eq!(instruction.y, -82.0, epsilon = 1e-4);
    }

    #[rstest]
    #[case(BoundingBox::new(0.0, 0.0, 1.0, 1.0))]
    #[case(BoundingBox::new(-40.0, 300.0, 900.0, 20.0))]
    fn none_never_draws(#[case] face_box: BoundingBox) {
        let face = Face::new(face_box, vec![]);
        let instruction = place_overlay(
            &face,
            OverlayKind::None,
            ImageSize::new(10.0, 10.0),
            &PlacementTuning::default(),
            ANCHORS,
        );
        assert!(instruction.is_none());
    }

    #[test]
    fn face_without_box_is_skipped() {
        let face = Face {
            bounding_box: None,
            keypoints: vec![Keypoint::new(0.0, 0.0), Keypoint::new(1.0, 0.0)],
        };
        let instruction = place_overlay(
            &face,
            OverlayKind::Hat,
            ImageSize::new(10.0, 10.0),
            &PlacementTuning::default(),
            ANCHORS,
        );
        assert!(instruction.is_none());
    }

    #[test]
    fn degenerate_image_is_skipped() {
        let face = face_with_eyes((0.0, 0.0), (10.0, 0.0));
        let instruction = place_overlay(
            &face,
            OverlayKind::Hat,
            ImageSize::new(0.0, 10.0),
            &untuned(),
            ANCHORS,
        );
        assert!(instruction.is_none());
    }

    #[test]
    fn rotation_pivots_on_instruction_center() {
        let instruction = DrawInstruction {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
            angle: 0.3,
        };
        assert_eq!(instruction.center(), (60.0, 40.0));
    }

    #[test]
    fn tuning_clamps_to_slider_ranges() {
        let tuning = PlacementTuning::new(5.0, -900.0, 201.0);
        assert_eq!(tuning, PlacementTuning::new(2.2, -200.0, 200.0));
        assert_eq!(PlacementTuning::new(0.1, 0.0, 0.0).scale, SCALE_MIN);
    }

    #[test]
    fn kind_names_round_trip() {
        for (index, kind) in OverlayKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.to_string().parse::<OverlayKind>(), Ok(kind));
            assert_eq!(OverlayKind::from_index(index), Some(kind));
            assert_eq!(kind.index(), index);
        }
        assert!("tiara".parse::<OverlayKind>().is_err());
        assert_eq!(OverlayKind::from_index(7), None);
    }
}
