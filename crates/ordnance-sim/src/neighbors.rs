//! Neighbor query adapter.
//!
//! Turns the spatial index into a bounded, distance-sorted candidate list for
//! one projectile. The list is cached against (projectile, game time) so it
//! is built at most once per projectile per tick.

use glam::IVec3;
use ordnance_common::{planar_dist_sq, ProjectileId};
use tracing::trace;

use crate::config::GameTime;
use crate::projectile::ObjectRef;
use crate::world::{ObjectQuery, SpatialIndex};

/// A collision candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Candidate object or projectile
    pub target: ObjectRef,
    /// Planar squared distance from the querying projectile
    pub dist_sq: i64,
}

/// Memoized neighbor list owned by the simulation.
#[derive(Debug, Clone)]
pub struct NeighborCache {
    owner: Option<ProjectileId>,
    stamp: GameTime,
    entries: Vec<Neighbor>,
    range: i32,
    capacity: usize,
}

impl NeighborCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(range: i32, capacity: usize) -> Self {
        Self {
            owner: None,
            stamp: 0,
            entries: Vec::with_capacity(capacity),
            range,
            capacity: capacity.max(1),
        }
    }

    /// Returns true if the cached list belongs to `owner` at `now`.
    #[must_use]
    pub fn is_current(&self, owner: ProjectileId, now: GameTime) -> bool {
        self.owner == Some(owner) && self.stamp == now
    }

    /// The cached list, nearest first.
    #[must_use]
    pub fn entries(&self) -> &[Neighbor] {
        &self.entries
    }

    /// Drops the cached list.
    pub fn invalidate(&mut self) {
        self.owner = None;
        self.entries.clear();
    }

    /// Rebuilds the list for `owner` at `center` unless it is already current.
    ///
    /// `projectiles` lists the other live projectiles; the owner must not be in it.
    pub fn refresh<W, I>(
        &mut self,
        owner: ProjectileId,
        now: GameTime,
        center: IVec3,
        world: &W,
        projectiles: I,
    ) -> &[Neighbor]
    where
        W: ObjectQuery + SpatialIndex + ?Sized,
        I: IntoIterator<Item = (ProjectileId, IVec3)>,
    {
        if self.is_current(owner, now) {
            return &self.entries;
        }

        self.entries.clear();
        self.owner = Some(owner);
        self.stamp = now;

        let range_sq = i64::from(self.range) * i64::from(self.range);
        for handle in world.objects_near(center, self.range) {
            if let Some(object) = world.object(handle) {
                let dist_sq = planar_dist_sq(center, object.position);
                if dist_sq <= range_sq {
                    self.insert(Neighbor { target: ObjectRef::Object(handle), dist_sq });
                }
            }
        }
        for (id, position) in projectiles {
            let dist_sq = planar_dist_sq(center, position);
            if dist_sq <= range_sq {
                self.insert(Neighbor { target: ObjectRef::Projectile(id), dist_sq });
            }
        }

        trace!("{owner}: {} neighbors at {now}", self.entries.len());
        &self.entries
    }

    fn insert(&mut self, neighbor: Neighbor) {
        if self.entries.len() >= self.capacity {
            match self.entries.last() {
                Some(last) if neighbor.dist_sq >= last.dist_sq => return,
                _ => {},
            }
        }
        let at = self.entries.partition_point(|e| e.dist_sq <= neighbor.dist_sq);
        self.entries.insert(at, neighbor);
        self.entries.truncate(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxWorld;
    use ordnance_common::{MapBounds, PlayerId};

    fn world_with_units(xs: &[i32]) -> SandboxWorld {
        let mut world = SandboxWorld::new(MapBounds::new(32, 32));
        for x in xs {
            world.spawn_tank(PlayerId::new(1), IVec3::new(*x, 1000, 0));
        }
        world
    }

    #[test]
    fn test_sorted_and_range_limited() {
        let world = world_with_units(&[1300, 1010, 1100, 2000]);
        let mut cache = NeighborCache::new(512, 8);
        let list = cache.refresh(ProjectileId::new(0, 0), 100, IVec3::new(1000, 1000, 0), &world, []);
        let dists: Vec<i64> = list.iter().map(|n| n.dist_sq).collect();
        assert_eq!(dists, vec![100, 10_000, 90_000]);
    }

    #[test]
    fn test_capacity_keeps_nearest() {
        let world = world_with_units(&[1400, 1300, 1200, 1100, 1050]);
        let mut cache = NeighborCache::new(512, 3);
        let list = cache.refresh(ProjectileId::new(0, 0), 100, IVec3::new(1000, 1000, 0), &world, []);
        let dists: Vec<i64> = list.iter().map(|n| n.dist_sq).collect();
        assert_eq!(dists, vec![2_500, 10_000, 40_000]);
    }

    #[test]
    fn test_includes_projectiles() {
        let world = world_with_units(&[1200]);
        let mut cache = NeighborCache::new(512, 8);
        let other = ProjectileId::new(5, 1);
        let list = cache.refresh(
            ProjectileId::new(0, 0),
            100,
            IVec3::new(1000, 1000, 0),
            &world,
            [(other, IVec3::new(1000, 1030, 50))],
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].target, ObjectRef::Projectile(other));
    }

    #[test]
    fn test_idempotent_within_tick() {
        let world = world_with_units(&[1100, 1200]);
        let mut cache = NeighborCache::new(512, 8);
        let owner = ProjectileId::new(0, 0);
        let first = cache.refresh(owner, 100, IVec3::new(1000, 1000, 0), &world, []).to_vec();
        let second = cache.refresh(owner, 100, IVec3::new(1000, 1000, 0), &world, []).to_vec();
        assert_eq!(first, second);
        assert_eq!(world.spatial_queries(), 1);

        cache.refresh(owner, 200, IVec3::new(1000, 1000, 0), &world, []);
        assert_eq!(world.spatial_queries(), 2);
    }
}
