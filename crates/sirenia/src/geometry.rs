//! Axis-aligned rectangle and segment primitives used by the metrics and the strategies.

use crate::graph::{Bounds, PositionedNode};

/// Center-anchored axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub cx: f64,
    pub cy: f64,
    pub half_w: f64,
    pub half_h: f64,
}

impl Rect {
    pub fn of(node: &PositionedNode) -> Self {
        Self {
            cx: node.x,
            cy: node.y,
            half_w: node.width / 2.0,
            half_h: node.height / 2.0,
        }
    }

    pub fn left(&self) -> f64 {
        self.cx - self.half_w
    }

    pub fn right(&self) -> f64 {
        self.cx + self.half_w
    }

    pub fn top(&self) -> f64 {
        self.cy - self.half_h
    }

    pub fn bottom(&self) -> f64 {
        self.cy + self.half_h
    }

    pub fn inflate(self, by: f64) -> Self {
        Self {
            half_w: self.half_w + by,
            half_h: self.half_h + by,
            ..self
        }
    }

    /// Two rectangles overlap unless they are strictly separated along x or y; touching edges
    /// count as an overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() < other.left()
            || self.left() > other.right()
            || self.bottom() < other.top()
            || self.top() > other.bottom())
    }

    /// Point on this rectangle's border in the direction of `other`'s center.
    pub fn clip_towards(&self, other: &Rect) -> (f64, f64) {
        let dx = other.cx - self.cx;
        let dy = other.cy - self.cy;
        if dx == 0.0 && dy == 0.0 {
            return (self.cx, self.cy);
        }

        let mut t_x = f64::INFINITY;
        let mut t_y = f64::INFINITY;
        if dx != 0.0 {
            t_x = (self.half_w / dx.abs()).max(0.0);
        }
        if dy != 0.0 {
            t_y = (self.half_h / dy.abs()).max(0.0);
        }
        let t = t_x.min(t_y);
        (self.cx + t * dx, self.cy + t * dy)
    }
}

/// Counter-clockwise orientation test of three points.
pub fn ccw(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    (c.1 - a.1) * (b.0 - a.0) > (b.1 - a.1) * (c.0 - a.0)
}

/// Whether segment `p1-p2` intersects segment `q1-q2`.
pub fn segments_intersect(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    ccw(p1, q1, q2) != ccw(p2, q1, q2) && ccw(p1, p2, q1) != ccw(p1, p2, q2)
}

/// Tight bounding box of all node rectangles, or `None` for an empty slice.
pub fn bounds_of(nodes: &[PositionedNode]) -> Option<Bounds> {
    let mut it = nodes.iter().map(Rect::of);
    let first = it.next()?;
    let mut b = Bounds {
        min_x: first.left(),
        min_y: first.top(),
        max_x: first.right(),
        max_y: first.bottom(),
    };
    for r in it {
        b.min_x = b.min_x.min(r.left());
        b.min_y = b.min_y.min(r.top());
        b.max_x = b.max_x.max(r.right());
        b.max_y = b.max_y.max(r.bottom());
    }
    Some(b)
}
