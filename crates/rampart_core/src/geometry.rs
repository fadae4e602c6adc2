//! Grid/world transforms, route interpolation and formation layout.
//!
//! Pure functions and immutable values only. Paths are authored as tile
//! coordinates and converted to world space once when a level loads.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};

/// Edge length of one grid tile in world units.
pub const TILE_SIZE: i32 = 48;

/// Tiles per side of the playable square.
///
/// Keeps every squared distance on the field inside the fixed-point range.
pub const GRID_EXTENT: i32 = 512;

/// Edge length of the playable square in world units.
pub const WORLD_EXTENT: i32 = GRID_EXTENT * TILE_SIZE;

/// Whether a world position lies on the playable square, edges included.
#[must_use]
pub fn in_world_bounds(position: Vec2Fixed) -> bool {
    let field = Fixed::ZERO..=Fixed::from_num(WORLD_EXTENT);
    field.contains(&position.x) && field.contains(&position.y)
}

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPoint {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPoint {
    /// Create a new grid point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether the tile lies on the playable square.
    #[must_use]
    pub const fn in_bounds(self) -> bool {
        self.x >= 0 && self.x < GRID_EXTENT && self.y >= 0 && self.y < GRID_EXTENT
    }

    /// World position of the tile center.
    ///
    /// Saturates for tiles far outside [`GRID_EXTENT`].
    #[must_use]
    pub fn to_world(self) -> Vec2Fixed {
        let center = |v: i32| v.saturating_mul(TILE_SIZE).saturating_add(TILE_SIZE / 2);
        Vec2Fixed::from_ints(center(self.x), center(self.y))
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn from_world(position: Vec2Fixed) -> Self {
        let tile = Fixed::from_num(TILE_SIZE);
        Self {
            x: (position.x / tile).floor().to_num(),
            y: (position.y / tile).floor().to_num(),
        }
    }
}

/// An ordered route in world space.
///
/// Progress along a path is measured in segment units: `0` is the first
/// waypoint, `1` the second, and `segment_count()` the goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    waypoints: Vec<Vec2Fixed>,
    lengths: Vec<Fixed>,
}

impl Path {
    /// Build a path from authored grid points.
    ///
    /// Returns `None` for fewer than two points or a zero-length segment.
    #[must_use]
    pub fn from_grid(points: &[GridPoint]) -> Option<Self> {
        Self::from_world(points.iter().map(|p| p.to_world()).collect())
    }

    /// Build a path from world waypoints.
    #[must_use]
    pub fn from_world(waypoints: Vec<Vec2Fixed>) -> Option<Self> {
        if waypoints.len() < 2 {
            return None;
        }
        let lengths: Vec<Fixed> = waypoints.windows(2).map(|w| w[0].distance(w[1])).collect();
        if lengths.iter().any(|len| *len == Fixed::ZERO) {
            return None;
        }
        Some(Self { waypoints, lengths })
    }

    /// World waypoints in order.
    #[must_use]
    pub fn waypoints(&self) -> &[Vec2Fixed] {
        &self.waypoints
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.lengths.len()
    }

    /// Progress value of the goal.
    #[must_use]
    pub fn end_progress(&self) -> Fixed {
        Fixed::from_num(self.segment_count())
    }

    /// Whether `progress` has reached the goal.
    #[must_use]
    pub fn is_complete(&self, progress: Fixed) -> bool {
        progress >= self.end_progress()
    }

    /// First waypoint.
    #[must_use]
    pub fn origin(&self) -> Vec2Fixed {
        self.waypoints[0]
    }

    /// Last waypoint.
    #[must_use]
    pub fn goal(&self) -> Vec2Fixed {
        self.waypoints[self.waypoints.len() - 1]
    }

    /// Total world length.
    #[must_use]
    pub fn total_length(&self) -> Fixed {
        self.lengths.iter().copied().sum()
    }

    /// Position between the two waypoints bracketing `progress`.
    #[must_use]
    pub fn position_at(&self, progress: Fixed) -> Vec2Fixed {
        if progress <= Fixed::ZERO {
            return self.origin();
        }
        if self.is_complete(progress) {
            return self.goal();
        }
        let index: usize = progress.floor().to_num();
        let t = progress.frac();
        self.waypoints[index].lerp(self.waypoints[index + 1], t)
    }

    /// Progress reached after travelling `distance` world units from `progress`.
    ///
    /// Never decreases and saturates at [`end_progress`](Self::end_progress).
    #[must_use]
    pub fn advance(&self, progress: Fixed, distance: Fixed) -> Fixed {
        let end = self.end_progress();
        if distance <= Fixed::ZERO || progress >= end {
            return progress.min(end);
        }

        let mut progress = progress.max(Fixed::ZERO);
        let mut remaining = distance;
        while progress < end {
            let index: usize = progress.floor().to_num();
            let len = self.lengths[index];
            let left_in_segment = (Fixed::ONE - progress.frac()) * len;
            if remaining < left_in_segment {
                return progress + remaining / len;
            }
            remaining -= left_in_segment;
            progress = Fixed::from_num(index + 1);
        }
        end
    }

    /// Nearest point on the path to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec2Fixed) -> Vec2Fixed {
        let mut best = self.origin();
        let mut best_dist = best.distance_squared(point);
        for pair in self.waypoints.windows(2) {
            let candidate = closest_on_segment(pair[0], pair[1], point);
            let dist = candidate.distance_squared(point);
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
            }
        }
        best
    }
}

fn closest_on_segment(a: Vec2Fixed, b: Vec2Fixed, point: Vec2Fixed) -> Vec2Fixed {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == Fixed::ZERO {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(Fixed::ZERO, Fixed::ONE);
    a.lerp(b, t)
}

/// Formation offsets relative to a rally point for `count` units.
///
/// One unit stands on the point, two stand side by side, three form a
/// triangle and larger groups fill centered rows of three.
#[must_use]
pub fn formation_offsets(count: usize, spacing: Fixed) -> Vec<Vec2Fixed> {
    let half = spacing / Fixed::from_num(2);
    match count {
        0 => Vec::new(),
        1 => vec![Vec2Fixed::ZERO],
        2 => vec![Vec2Fixed::new(-half, Fixed::ZERO), Vec2Fixed::new(half, Fixed::ZERO)],
        3 => vec![
            Vec2Fixed::new(Fixed::ZERO, -half),
            Vec2Fixed::new(-half, half),
            Vec2Fixed::new(half, half),
        ],
        _ => {
            let rows = count.div_ceil(3);
            let row_shift = Fixed::from_num(rows - 1) * half;
            (0..count)
                .map(|i| {
                    let row = i / 3;
                    let in_row = (count - row * 3).min(3);
                    let col = i % 3;
                    let x = (Fixed::from_num(col) - Fixed::from_num(in_row - 1) / Fixed::from_num(2))
                        * spacing;
                    let y = Fixed::from_num(row) * spacing - row_shift;
                    Vec2Fixed::new(x, y)
                })
                .collect()
        }
    }
}

/// Offset pushing `a` away from `b` when they are closer than `min_distance`.
///
/// Each unit of a pair receives half the overlap. Coincident units are split
/// along the x axis, with `a_first` deciding the side.
#[must_use]
pub fn separation_push(a: Vec2Fixed, b: Vec2Fixed, min_distance: Fixed, a_first: bool) -> Vec2Fixed {
    let diff = a - b;
    let dist = diff.length();
    if dist >= min_distance {
        return Vec2Fixed::ZERO;
    }
    let half_overlap = (min_distance - dist) / Fixed::from_num(2);
    if dist == Fixed::ZERO {
        let sign = if a_first { -Fixed::ONE } else { Fixed::ONE };
        return Vec2Fixed::new(half_overlap * sign, Fixed::ZERO);
    }
    diff.scale(half_overlap / dist)
}
