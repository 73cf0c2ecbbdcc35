use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    /// Area of the box, zero for inverted or empty boxes
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.0[0] + self.0[2]) * 0.5,
            (self.0[1] + self.0[3]) * 0.5,
        )
    }

    #[inline]
    pub fn diagonal(&self) -> f32 {
        self.width().hypot(self.height())
    }

    /// Point where the object touches the ground: bottom edge, horizontal center
    #[inline]
    pub fn ground_contact(&self) -> (f32, f32) {
        ((self.0[0] + self.0[2]) * 0.5, self.0[3])
    }

    /// Intersection-over-union, 0 whenever either box has no area
    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let a1 = self.area();
        let a2 = other.area();

        if a1 <= 0.0 || a2 <= 0.0 {
            return 0.0;
        }

        let i_w = (self.right().min(other.right()) - self.left().max(other.left())).max(0.0);
        let i_h = (self.bottom().min(other.bottom()) - self.top().max(other.top())).max(0.0);
        let i_area = i_w * i_h;
        let union = a1 + a2 - i_area;

        if union <= 0.0 {
            0.0
        } else {
            i_area / union
        }
    }

    #[inline]
    pub fn center_distance(&self, other: &BBox<Ltrb>) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();

        (ax - bx).hypot(ay - by)
    }

    /// Component-wise `factor * next + (1 - factor) * self` on all four edges
    #[inline]
    pub fn lerp(&self, next: &BBox<Ltrb>, factor: f32) -> Self {
        let mut out = [0.0; 4];
        for (i, v) in out.iter_mut().enumerate() {
            *v = next.0[i] * factor + self.0[i] * (1.0 - factor);
        }

        BBox(out, PhantomData)
    }

    /// Continues the per-frame motion from `prev` to `self` for `gap` more frames
    #[inline]
    pub fn extrapolate(&self, prev: &BBox<Ltrb>, gap: f32) -> Self {
        let mut out = [0.0; 4];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.0[i] + (self.0[i] - prev.0[i]) * gap;
        }

        BBox(out, PhantomData)
    }

    #[inline]
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        BBox(
            [self.0[0] * sx, self.0[1] * sy, self.0[2] * sx, self.0[3] * sy],
            PhantomData,
        )
    }
}
