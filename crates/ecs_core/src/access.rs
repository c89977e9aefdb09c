//! The declarative access descriptor every [`SystemParam`](crate::system::param::SystemParam)
//! contributes to, and the conflict relation over it.
//!
//! Grounded on the pseudocode in spec §4.3: a system's `AccessSet` is built
//! incrementally during `initialize` (each param's `init` mutates the
//! [`SystemMeta`](crate::system::SystemMeta) it is handed) and then compared
//! pairwise by the schedule runner before two systems are allowed to run
//! concurrently.

use std::any::TypeId;

use smallvec::SmallVec;

/// One query parameter's component access: the components it reads, the
/// components it writes, and the components its filters exclude.
#[derive(Debug, Clone, Default)]
pub struct QueryAccess {
    pub reads: SmallVec<[TypeId; 4]>,
    pub writes: SmallVec<[TypeId; 4]>,
    pub excludes: SmallVec<[TypeId; 4]>,
}

impl QueryAccess {
    fn includes(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.reads.iter().copied().chain(self.writes.iter().copied())
    }
}

/// The machine-readable description of what a system reads/writes.
///
/// See spec §3 "AccessSet" and §4.3 for the conflict relation this backs.
#[derive(Debug, Clone, Default)]
pub struct AccessSet {
    pub commands: bool,
    pub queries: Vec<QueryAccess>,
    pub resource_reads: SmallVec<[TypeId; 8]>,
    pub resource_writes: SmallVec<[TypeId; 8]>,
    pub reads_all: bool,
    pub writes_all: bool,
}

impl AccessSet {
    pub fn add_resource_read(&mut self, ty: TypeId) {
        if !self.resource_reads.contains(&ty) {
            self.resource_reads.push(ty);
        }
    }

    pub fn add_resource_write(&mut self, ty: TypeId) {
        if !self.resource_writes.contains(&ty) {
            self.resource_writes.push(ty);
        }
    }

    pub fn add_query(&mut self, query: QueryAccess) {
        self.queries.push(query);
    }

    pub fn any_write(&self) -> bool {
        self.writes_all
            || !self.resource_writes.is_empty()
            || self.queries.iter().any(|q| !q.writes.is_empty())
    }
}

fn sets_intersect(a: &[TypeId], b: &[TypeId]) -> bool {
    a.iter().any(|t| b.contains(t))
}

/// Disjointness test between two queries' component sets, per spec §4.3:
/// `(qA.includes ∩ qB.excludes = ∅) ∧ (qB.includes ∩ qA.excludes = ∅)`.
///
/// Open Question decision (see `DESIGN.md`): `Without`/exclude sets prove
/// disjointness only when one side's excludes are a superset of the other
/// side's includes — this is exactly what the intersection test below
/// checks (an empty intersection with the *other* side's full include set).
pub fn queries_conflict(a: &QueryAccess, b: &QueryAccess) -> bool {
    let a_includes: SmallVec<[TypeId; 8]> = a.includes().collect();
    let b_includes: SmallVec<[TypeId; 8]> = b.includes().collect();

    let archetypes_overlap =
        !sets_intersect(&a_includes, &b.excludes) && !sets_intersect(&b_includes, &a.excludes);
    if !archetypes_overlap {
        return false;
    }

    let a_writes_conflict_b = sets_intersect(&a.writes, &b_includes);
    let b_writes_conflict_a = sets_intersect(&b.writes, &a_includes);
    a_writes_conflict_b || b_writes_conflict_a
}

/// Conflict relation `conflict(A, B)` from spec §4.3. Commutative by
/// construction (every branch tests both orderings).
pub fn conflict(a: &AccessSet, b: &AccessSet) -> bool {
    if a.writes_all || b.writes_all {
        return true;
    }
    if a.reads_all && b.any_write() {
        return true;
    }
    if b.reads_all && a.any_write() {
        return true;
    }

    for r in &a.resource_writes {
        if b.resource_reads.contains(r) || b.resource_writes.contains(r) {
            return true;
        }
    }
    for r in &b.resource_writes {
        if a.resource_reads.contains(r) || a.resource_writes.contains(r) {
            return true;
        }
    }

    for qa in &a.queries {
        for qb in &b.queries {
            if queries_conflict(qa, qb) {
                return true;
            }
        }
    }

    // `commands` never conflicts with anything (§4.3 tie-break rule); its
    // effects are deferred and the queue is internally synchronized.
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty<T: 'static>() -> TypeId {
        TypeId::of::<T>()
    }

    struct A;
    struct B;

    #[test]
    fn conflict_is_reflexive_iff_any_write() {
        let mut read_only = AccessSet::default();
        read_only.add_resource_read(ty::<A>());
        assert!(!conflict(&read_only, &read_only));

        let mut writer = AccessSet::default();
        writer.add_resource_write(ty::<A>());
        assert!(conflict(&writer, &writer));
    }

    #[test]
    fn resource_read_write_conflicts() {
        let mut reader = AccessSet::default();
        reader.add_resource_read(ty::<A>());
        let mut writer = AccessSet::default();
        writer.add_resource_write(ty::<A>());
        assert!(conflict(&reader, &writer));
        assert!(conflict(&writer, &reader));
    }

    #[test]
    fn disjoint_resources_do_not_conflict() {
        let mut one = AccessSet::default();
        one.add_resource_write(ty::<A>());
        let mut other = AccessSet::default();
        other.add_resource_write(ty::<B>());
        assert!(!conflict(&one, &other));
    }

    #[test]
    fn commands_alone_never_conflicts() {
        let mut one = AccessSet { commands: true, ..Default::default() };
        let mut other = AccessSet { commands: true, ..Default::default() };
        one.add_resource_write(ty::<A>());
        other.add_resource_write(ty::<A>());
        // commands flag itself contributes nothing to the relation; the
        // resource writes above still conflict independently.
        assert!(conflict(&one, &other));

        let just_commands_a = AccessSet { commands: true, ..Default::default() };
        let just_commands_b = AccessSet { commands: true, ..Default::default() };
        assert!(!conflict(&just_commands_a, &just_commands_b));
    }

    #[test]
    fn disjoint_query_excludes_avoid_conflict() {
        let mut qa = QueryAccess::default();
        qa.writes.push(ty::<A>());
        qa.excludes.push(ty::<B>());

        let mut qb = QueryAccess::default();
        qb.reads.push(ty::<A>());
        qb.reads.push(ty::<B>());

        // qa excludes B, which qb includes -> archetypes can never overlap.
        assert!(!queries_conflict(&qa, &qb));
    }

    #[test]
    fn overlapping_query_writes_conflict() {
        let mut qa = QueryAccess::default();
        qa.writes.push(ty::<A>());

        let mut qb = QueryAccess::default();
        qb.reads.push(ty::<A>());

        assert!(queries_conflict(&qa, &qb));
    }
}
