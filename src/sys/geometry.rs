use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }
}

/// Pixel rectangle. `x + width` and `y + height` are exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    pub fn origin(&self) -> Point { Point::new(self.x, self.y) }

    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.max_x() && point.y >= self.y && point.y < self.max_y()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        let rect = Rect::new(x, y, max_x - x, max_y - y);
        (!rect.is_empty()).then_some(rect)
    }

    pub fn intersects(&self, other: &Rect) -> bool { self.intersection(other).is_some() }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// The parts of `self` not covered by `other`, as at most four
    /// non-overlapping rectangles (full-width bands above and below, then
    /// the left and right remainders of the middle band).
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let Some(hole) = self.intersection(other) else {
            return if self.is_empty() { vec![] } else { vec![*self] };
        };
        let pieces = [
            Rect::new(self.x, self.y, self.width, hole.y - self.y),
            Rect::new(self.x, hole.max_y(), self.width, self.max_y() - hole.max_y()),
            Rect::new(self.x, hole.y, hole.x - self.x, hole.height),
            Rect::new(hole.max_x(), hole.y, self.max_x() - hole.max_x(), hole.height),
        ];
        pieces.into_iter().filter(|r| !r.is_empty()).collect()
    }

    /// Length along the given form factor's main axis.
    pub fn length(&self, form_factor: FormFactor) -> i32 {
        match form_factor {
            FormFactor::Horizontal => self.width,
            FormFactor::Vertical => self.height,
        }
    }
}

/// Subtracts every rectangle in `holes` from `base`.
pub fn subtract_all<'a>(base: Rect, holes: impl IntoIterator<Item = &'a Rect>) -> Vec<Rect> {
    let mut region = if base.is_empty() { vec![] } else { vec![base] };
    for hole in holes {
        region = region.iter().flat_map(|r| r.subtract(hole)).collect();
    }
    region
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub fn form_factor(self) -> FormFactor {
        match self {
            Edge::Top | Edge::Bottom => FormFactor::Horizontal,
            Edge::Left | Edge::Right => FormFactor::Vertical,
        }
    }

    pub fn is_horizontal(self) -> bool { self.form_factor() == FormFactor::Horizontal }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    Horizontal,
    Vertical,
}
