//! Detection results as they come out of the landmark detector.
//!
//! Everything here lives for one render pass only.

/// Axis aligned face extent in video pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, width: f32, height: f32) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x_min: self.x_min * factor,
            y_min: self.y_min * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Face {
    pub bounding_box: Option<BoundingBox>,
    pub keypoints: Vec<Keypoint>,
}

impl Face {
    pub fn new(bounding_box: BoundingBox, keypoints: Vec<Keypoint>) -> Self {
        Self {
            bounding_box: Some(bounding_box),
            keypoints,
        }
    }

    pub fn keypoint(&self, index: usize) -> Option<Keypoint> {
        self.keypoints.get(index).copied()
    }
}

/// Keypoint indices of the two outer eye corners used to estimate head tilt.
///
/// `left` and `right` are as seen in the image, so an upright face has
/// `keypoints[left].x < keypoints[right].x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeAnchors {
    pub left: usize,
    pub right: usize,
}

impl EyeAnchors {
    pub const fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_lookup_is_bounds_checked() {
        let face = Face::new(
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            vec![Keypoint::new(1.0, 2.0)],
        );
        assert_eq!(face.keypoint(0), Some(Keypoint::new(1.0, 2.0)));
        assert_eq!(face.keypoint(1), None);
    }
}
