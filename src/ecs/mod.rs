//! Entity/component store.
//!
//! The [`World`] owns entity ids, the components attached to them and a
//! reverse index from component kind to the entities holding it. It is an
//! ordinary value: build one per scene and pass it to setup code and to the
//! render driver by reference.
//!
//! Lookups on unknown entities log an error and return
//! [`EcsError::UnknownEntity`]; the store never panics on misuse.

pub mod component;
pub mod query;

use std::collections::HashMap;

use crate::error::EcsError;

pub use component::{Children, Component, ComponentData, ComponentKind, Parent};
pub use query::{MultiQuery, Query, SetOp};

/// Opaque entity id. Ids of destroyed entities are handed out again.
pub type Entity = u32;

#[derive(Debug, Default)]
pub struct World {
    entity_components: HashMap<Entity, Vec<Component>>,
    component_entities: HashMap<ComponentKind, Vec<Entity>>,
    next_id: Entity,
    free_ids: Vec<Entity>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses the most recently freed id, otherwise mints the next one.
    pub fn create_entity(&mut self) -> Entity {
        let entity = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        self.entity_components.insert(entity, Vec::new());
        entity
    }

    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        let components = self
            .entity_components
            .remove(&entity)
            .ok_or_else(|| unknown(entity))?;
        for component in components {
            self.unindex(component.kind(), entity);
        }
        self.detach(entity);
        self.free_ids.push(entity);
        Ok(())
    }

    /// Drops every [`Parent`] and [`Children`] link to `entity`, so a later
    /// entity reusing its id is not mistaken for the old relative.
    fn detach(&mut self, entity: Entity) {
        for holder in self.candidates(ComponentKind::Parent) {
            let parent = self
                .entity_components
                .get_mut(&holder)
                .and_then(|components| components.iter_mut().find_map(Parent::from_mut));
            if let Some(parent) = parent.filter(|parent| parent.0 == Some(entity)) {
                log::debug!("Entity {holder} lost its parent {entity}");
                parent.0 = None;
            }
        }
        for holder in self.candidates(ComponentKind::Children) {
            if let Some(children) = self
                .entity_components
                .get_mut(&holder)
                .and_then(|components| components.iter_mut().find_map(Children::from_mut))
            {
                children.0.retain(|child| *child != entity);
            }
        }
    }

    /// Destroys `entity` and everything reachable through its [`Children`].
    pub fn destroy_hierarchy(&mut self, entity: Entity) -> Result<(), EcsError> {
        let children = self
            .get_component::<Children>(entity)?
            .map(|children| children.0.clone())
            .unwrap_or_default();
        for child in children {
            if let Err(e) = self.destroy_hierarchy(child) {
                log::warn!("Child of entity {entity} was already gone: {e}");
            }
        }
        self.destroy_entity(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entity_components.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entity_components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_components.is_empty()
    }

    /// Attaches `component` to `entity`.
    ///
    /// A component of the same kind already on the entity is replaced in place
    /// and returned; the entity keeps its position in the kind index.
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: impl Into<Component>,
    ) -> Result<Option<Component>, EcsError> {
        let component = component.into();
        let kind = component.kind();
        let components = self
            .entity_components
            .get_mut(&entity)
            .ok_or_else(|| unknown(entity))?;

        if let Some(slot) = components.iter_mut().find(|c| c.kind() == kind) {
            log::debug!("Replacing {kind} on entity {entity}");
            return Ok(Some(std::mem::replace(slot, component)));
        }

        components.push(component);
        self.component_entities.entry(kind).or_default().push(entity);
        Ok(None)
    }

    pub fn remove_component<C: ComponentData>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<C>, EcsError> {
        let components = self
            .entity_components
            .get_mut(&entity)
            .ok_or_else(|| unknown(entity))?;
        let Some(idx) = components.iter().position(|c| c.kind() == C::KIND) else {
            return Ok(None);
        };
        let removed = components.remove(idx);
        self.unindex(C::KIND, entity);
        Ok(C::from_owned(removed))
    }

    pub fn get_component<C: ComponentData>(&self, entity: Entity) -> Result<Option<&C>, EcsError> {
        let components = self
            .entity_components
            .get(&entity)
            .ok_or_else(|| unknown(entity))?;
        Ok(components.iter().find_map(C::from_ref))
    }

    pub fn get_component_mut<C: ComponentData>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<&mut C>, EcsError> {
        let components = self
            .entity_components
            .get_mut(&entity)
            .ok_or_else(|| unknown(entity))?;
        Ok(components.iter_mut().find_map(C::from_mut))
    }

    pub fn has_component(&self, entity: Entity, kind: ComponentKind) -> bool {
        self.entity_components
            .get(&entity)
            .is_some_and(|components| components.iter().any(|c| c.kind() == kind))
    }

    pub fn query_singular(&self, query: &Query) -> Vec<Entity> {
        match query {
            Query::Single(kind) => self.candidates(*kind),
            Query::Union(kinds) => query::union(&self.candidate_lists(kinds)),
            Query::Intersection(kinds) => query::intersection(&self.candidate_lists(kinds)),
        }
    }

    pub fn query_multiple(&self, query: &MultiQuery) -> Vec<Entity> {
        let results: Vec<Vec<Entity>> = query
            .queries
            .iter()
            .map(|q| self.query_singular(q))
            .collect();
        query::combine(query.op, &results)
    }

    fn candidates(&self, kind: ComponentKind) -> Vec<Entity> {
        self.component_entities
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn candidate_lists(&self, kinds: &[ComponentKind]) -> Vec<Vec<Entity>> {
        kinds.iter().map(|kind| self.candidates(*kind)).collect()
    }

    fn unindex(&mut self, kind: ComponentKind, entity: Entity) {
        if let Some(entities) = self.component_entities.get_mut(&kind) {
            if let Some(idx) = entities.iter().position(|e| *e == entity) {
                entities.remove(idx);
            }
        }
    }
}

fn unknown(entity: Entity) -> EcsError {
    log::error!("Entity {entity} does not exist");
    EcsError::UnknownEntity(entity)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::data_structures::{
        mesh::MeshReference,
        transform::{Position, Rotation, Scale},
    };

    #[test]
    fn freed_ids_are_reused_lifo() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        assert_eq!((a, b, c), (0, 1, 2));

        world.destroy_entity(a).unwrap();
        world.destroy_entity(c).unwrap();
        assert_eq!(world.create_entity(), c);
        assert_eq!(world.create_entity(), a);
        assert_eq!(world.create_entity(), 3);
    }

    #[test]
    fn live_ids_never_collide() {
        let mut world = World::new();
        let mut live = HashSet::new();
        for round in 0..50u32 {
            let e = world.create_entity();
            assert!(live.insert(e), "id {e} handed out twice");
            if round % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                world.destroy_entity(victim).unwrap();
                live.remove(&victim);
            }
        }
        assert_eq!(world.len(), live.len());
    }

    #[test]
    fn component_lookup_until_destroyed() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position::new(1.0, 2.0, 3.0)).unwrap();

        let position = world.get_component::<Position>(e).unwrap().unwrap();
        assert_eq!(position.0, cgmath::Vector3::new(1.0, 2.0, 3.0));
        assert!(world.get_component::<Scale>(e).unwrap().is_none());

        world.destroy_entity(e).unwrap();
        assert_eq!(
            world.get_component::<Position>(e),
            Err(EcsError::UnknownEntity(e))
        );
        assert!(world.query_singular(&Query::Single(ComponentKind::Position)).is_empty());
    }

    #[test]
    fn unknown_entity_is_an_error_not_a_panic() {
        let mut world = World::new();
        assert_eq!(world.destroy_entity(42), Err(EcsError::UnknownEntity(42)));
        assert!(world.add_component(42, Scale::default()).is_err());
    }

    #[test]
    fn duplicate_kind_replaces_in_place() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position::new(1.0, 0.0, 0.0)).unwrap();
        let previous = world.add_component(e, Position::new(2.0, 0.0, 0.0)).unwrap();

        assert_eq!(previous, Some(Position::new(1.0, 0.0, 0.0).into()));
        assert_eq!(
            world.get_component::<Position>(e).unwrap(),
            Some(&Position::new(2.0, 0.0, 0.0))
        );
        assert_eq!(world.query_singular(&Query::Single(ComponentKind::Position)), vec![e]);
    }

    #[test]
    fn removed_component_is_unindexed() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, MeshReference::new("cube")).unwrap();
        let removed = world.remove_component::<MeshReference>(e).unwrap();

        assert_eq!(removed, Some(MeshReference::new("cube")));
        assert!(!world.has_component(e, ComponentKind::MeshReference));
        assert!(world
            .query_singular(&Query::Single(ComponentKind::MeshReference))
            .is_empty());
    }

    #[test]
    fn union_query_has_no_duplicates() {
        let mut world = World::new();
        let both = world.create_entity();
        let only_position = world.create_entity();
        world.add_component(both, Position::default()).unwrap();
        world.add_component(both, Rotation::default()).unwrap();
        world.add_component(only_position, Position::default()).unwrap();

        let ab = world.query_singular(&Query::any_of([
            ComponentKind::Position,
            ComponentKind::Rotation,
        ]));
        let ba = world.query_singular(&Query::any_of([
            ComponentKind::Rotation,
            ComponentKind::Position,
        ]));
        assert_eq!(ab, vec![both, only_position]);
        assert_eq!(
            ab.iter().collect::<HashSet<_>>(),
            ba.iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn intersection_query_requires_every_kind() {
        let mut world = World::new();
        let full = world.create_entity();
        let partial = world.create_entity();
        world.add_component(full, Position::default()).unwrap();
        world.add_component(full, Scale::default()).unwrap();
        world.add_component(partial, Scale::default()).unwrap();

        let found =
            world.query_singular(&Query::all_of([ComponentKind::Scale, ComponentKind::Position]));
        assert_eq!(found, vec![full]);
    }

    #[test]
    fn multi_query_composes_nested_results() {
        let mut world = World::new();
        let moved_mesh = world.create_entity();
        let static_mesh = world.create_entity();
        let moved_empty = world.create_entity();
        world.add_component(moved_mesh, MeshReference::new("a")).unwrap();
        world.add_component(moved_mesh, Rotation::default()).unwrap();
        world.add_component(static_mesh, MeshReference::new("b")).unwrap();
        world.add_component(moved_empty, Position::default()).unwrap();

        let query = MultiQuery::intersection([
            Query::Single(ComponentKind::MeshReference),
            Query::any_of([ComponentKind::Position, ComponentKind::Rotation, ComponentKind::Scale]),
        ]);
        assert_eq!(world.query_multiple(&query), vec![moved_mesh]);
    }

    #[test]
    fn destroy_hierarchy_removes_children() {
        let mut world = World::new();
        let root = world.create_entity();
        let child = world.create_entity();
        world.add_component(child, Parent(Some(root))).unwrap();
        world.add_component(root, Children(vec![child])).unwrap();

        world.destroy_hierarchy(root).unwrap();
        assert!(world.is_empty());
    }

    #[test]
    fn destroyed_entity_is_unlinked_from_relatives() {
        let mut world = World::new();
        let root = world.create_entity();
        let child = world.create_entity();
        let sibling = world.create_entity();
        world.add_component(child, Parent(Some(root))).unwrap();
        world.add_component(root, Children(vec![child, sibling])).unwrap();

        world.destroy_entity(root).unwrap();
        assert_eq!(world.get_component::<Parent>(child).unwrap(), Some(&Parent(None)));

        let newcomer = world.create_entity();
        assert_eq!(newcomer, root);
        assert_eq!(world.get_component::<Parent>(child).unwrap(), Some(&Parent(None)));

        let owner = world.create_entity();
        world.add_component(owner, Children(vec![child, sibling])).unwrap();
        world.destroy_entity(sibling).unwrap();
        assert_eq!(world.get_component::<Children>(owner).unwrap(), Some(&Children(vec![child])));
    }
}
