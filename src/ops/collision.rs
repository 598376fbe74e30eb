use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box, origin at the top-left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Edges are inclusive
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// Intersection over union; 0.0 when disjoint
    pub fn overlap_ratio(&self, other: &Rect) -> f64 {
        let inter = self.intersection_area(other);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Same size, centered on `p`
    pub fn centered_at(&self, p: Point) -> Rect {
        Rect::new(p.x - self.width / 2.0, p.y - self.height / 2.0, self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Container,
    Item,
}

/// A droppable area registered by the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppableRegion {
    pub id: String,
    pub kind: RegionKind,
    /// The owning container; equals `id` for container regions
    pub container_id: String,
    pub rect: Rect,
}

impl DroppableRegion {
    pub fn container(id: impl Into<String>, rect: Rect) -> Self {
        let id = id.into();
        DroppableRegion {
            container_id: id.clone(),
            id,
            kind: RegionKind::Container,
            rect,
        }
    }

    pub fn item(id: impl Into<String>, container_id: impl Into<String>, rect: Rect) -> Self {
        DroppableRegion {
            id: id.into(),
            kind: RegionKind::Item,
            container_id: container_id.into(),
            rect,
        }
    }

    fn target(&self) -> DropTarget {
        match self.kind {
            RegionKind::Container => DropTarget::Container {
                id: self.id.clone(),
            },
            RegionKind::Item => DropTarget::Item {
                id: self.id.clone(),
                container_id: self.container_id.clone(),
            },
        }
    }
}

/// Regions currently mounted, in registration order
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    regions: IndexMap<String, DroppableRegion>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-measure a region. Re-registering keeps its original slot.
    pub fn register(&mut self, region: DroppableRegion) {
        self.regions.insert(region.id.clone(), region);
    }

    pub fn unregister(&mut self, id: &str) -> Option<DroppableRegion> {
        self.regions.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&DroppableRegion> {
        self.regions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DroppableRegion> {
        self.regions.values()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    fn items_of<'a>(&'a self, container_id: &'a str) -> impl Iterator<Item = &'a DroppableRegion> {
        self.regions
            .values()
            .filter(move |r| r.kind == RegionKind::Item && r.container_id == container_id)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The single place a drag would land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DropTarget {
    /// Empty space inside a container
    Container { id: String },
    /// On top of another item
    Item { id: String, container_id: String },
}

impl DropTarget {
    pub fn container_id(&self) -> &str {
        match self {
            DropTarget::Container { id } => id,
            DropTarget::Item { container_id, .. } => container_id,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            DropTarget::Container { .. } => None,
            DropTarget::Item { id, .. } => Some(id),
        }
    }
}

/// Geometry for one resolution pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionInput {
    /// Pointer position; `None` for keyboard drags
    pub pointer: Option<Point>,
    /// Current bounding box of the dragged item
    pub drag_rect: Rect,
}

/// Pick one drop target:
///
/// 1. regions containing the pointer, items before containers
/// 2. otherwise the best overlap ratio against the dragged box
/// 3. a populated container narrows to its nearest item
/// 4. nothing at all keeps `previous`
pub fn resolve(
    registry: &RegionRegistry,
    input: &CollisionInput,
    previous: Option<&DropTarget>,
) -> Option<DropTarget> {
    let best = input
        .pointer
        .and_then(|p| pointer_within(registry, p))
        .or_else(|| best_intersection(registry, &input.drag_rect));

    let Some(best) = best else {
        return previous.cloned();
    };

    if best.kind == RegionKind::Container {
        let center = input.drag_rect.center();
        if let Some(nearest) = closest_center(registry.items_of(&best.id), center) {
            return Some(nearest.target());
        }
    }
    Some(best.target())
}

fn pointer_within(registry: &RegionRegistry, p: Point) -> Option<&DroppableRegion> {
    let hits = registry.iter().filter(|r| r.rect.contains(p));
    let mut best_item: Option<&DroppableRegion> = None;
    let mut best_container: Option<&DroppableRegion> = None;
    for region in hits {
        let slot = match region.kind {
            RegionKind::Item => &mut best_item,
            RegionKind::Container => &mut best_container,
        };
        let better = match slot {
            None => true,
            Some(current) => {
                let (a, b) = (region.rect.area(), current.rect.area());
                a < b || (a == b && region.rect.center().distance(p) < current.rect.center().distance(p))
            }
        };
        if better {
            *slot = Some(region);
        }
    }
    best_item.or(best_container)
}

fn best_intersection<'a>(registry: &'a RegionRegistry, drag: &Rect) -> Option<&'a DroppableRegion> {
    let mut best: Option<(&DroppableRegion, f64)> = None;
    for region in registry.iter() {
        let ratio = region.rect.overlap_ratio(drag);
        if ratio <= 0.0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((current, current_ratio)) => {
                ratio > current_ratio
                    || (ratio == current_ratio
                        && region.kind == RegionKind::Item
                        && current.kind == RegionKind::Container)
            }
        };
        if better {
            best = Some((region, ratio));
        }
    }
    best.map(|(r, _)| r)
}

fn closest_center<'a>(
    candidates: impl Iterator<Item = &'a DroppableRegion>,
    center: Point,
) -> Option<&'a DroppableRegion> {
    let mut best: Option<(&DroppableRegion, f64)> = None;
    for region in candidates {
        let d = region.rect.center().distance(center);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((region, d));
        }
    }
    best.map(|(r, _)| r)
}
