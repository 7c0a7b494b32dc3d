//! Lazy, restartable views over a world's entities.
//!
//! A [`ComponentView`] yields, in collection order, every entity that has all
//! component types of a [`ComponentSet`], skipping pending-destroy entities
//! unless asked to include them. [`EntityView`] is the same view with the
//! empty set, so it only applies the pending-destroy filter.
//!
//! A view borrows the world immutably, so the entity collection cannot change
//! underneath it. Component values can still be changed through the handles
//! the entities hand out. Each call to [`iter`](ComponentView::iter) starts a
//! fresh pass from the first entity.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::component::ComponentSet;
use crate::entity::Entity;

// ---------------------------------------------------------------------------
// ComponentView
// ---------------------------------------------------------------------------

/// Entities having every type in `S`.
pub struct ComponentView<'w, S: ComponentSet> {
    entities: &'w [Box<Entity>],
    include_pending_destroy: bool,
    _set: PhantomData<fn() -> S>,
}

/// Every entity, filtered only by pending-destroy state.
pub type EntityView<'w> = ComponentView<'w, ()>;

impl<'w, S: ComponentSet> ComponentView<'w, S> {
    pub(crate) fn new(entities: &'w [Box<Entity>], include_pending_destroy: bool) -> Self {
        Self {
            entities,
            include_pending_destroy,
            _set: PhantomData,
        }
    }

    /// Start a pass from the first entity.
    pub fn iter(&self) -> ComponentIter<'w, S> {
        ComponentIter {
            entities: self.entities,
            index: 0,
            include_pending_destroy: self.include_pending_destroy,
            _set: PhantomData,
        }
    }

    /// Whether pending-destroy entities are yielded.
    pub fn includes_pending_destroy(&self) -> bool {
        self.include_pending_destroy
    }

    /// Run `f` for each matching entity with its component handles.
    pub fn for_each_with(&self, mut f: impl FnMut(&'w Entity, S::Handles)) {
        for entity in self.iter() {
            f(entity, S::fetch(entity));
        }
    }
}

impl<S: ComponentSet> Clone for ComponentView<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ComponentSet> Copy for ComponentView<'_, S> {}

impl<'w, S: ComponentSet> IntoIterator for ComponentView<'w, S> {
    type Item = &'w Entity;
    type IntoIter = ComponentIter<'w, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, 'w, S: ComponentSet> IntoIterator for &'a ComponentView<'w, S> {
    type Item = &'w Entity;
    type IntoIter = ComponentIter<'w, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: ComponentSet> fmt::Debug for ComponentView<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentView")
            .field("components", &S::tokens())
            .field("include_pending_destroy", &self.include_pending_destroy)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentIter
// ---------------------------------------------------------------------------

/// Index cursor over the entity collection.
pub struct ComponentIter<'w, S: ComponentSet> {
    entities: &'w [Box<Entity>],
    index: usize,
    include_pending_destroy: bool,
    _set: PhantomData<fn() -> S>,
}

/// Iterator over an [`EntityView`].
pub type EntityIter<'w> = ComponentIter<'w, ()>;

impl<'w, S: ComponentSet> ComponentIter<'w, S> {
    fn accepts(&self, entity: &Entity) -> bool {
        (self.include_pending_destroy || !entity.is_pending_destroy()) && S::matches(entity)
    }
}

impl<'w, S: ComponentSet> Iterator for ComponentIter<'w, S> {
    type Item = &'w Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let entities: &'w [Box<Entity>] = self.entities;
        while let Some(entity) = entities.get(self.index).map(Box::as_ref) {
            self.index += 1;
            if self.accepts(entity) {
                return Some(entity);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entities.len().saturating_sub(self.index)))
    }
}

impl<S: ComponentSet> FusedIterator for ComponentIter<'_, S> {}

impl<S: ComponentSet> fmt::Debug for ComponentIter<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentIter")
            .field("index", &self.index)
            .field("len", &self.entities.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentContainer, Container};
    use crate::entity::EntityId;
    use crate::type_registry::type_id_of;

    struct Position;
    struct Rotation;

    fn entity(id: u64, position: bool, rotation: bool, pending: bool) -> Box<Entity> {
        let mut entity = Entity::new(EntityId::from_raw(id));
        if position {
            let container: Box<dyn ComponentContainer> = Box::new(Container::new(Position));
            entity.containers_entry(type_id_of::<Position>()).or_insert(container);
        }
        if rotation {
            let container: Box<dyn ComponentContainer> = Box::new(Container::new(Rotation));
            entity.containers_entry(type_id_of::<Rotation>()).or_insert(container);
        }
        if pending {
            entity.mark_pending_destroy();
        }
        Box::new(entity)
    }

    fn ids<'w>(iter: impl Iterator<Item = &'w Entity>) -> Vec<u64> {
        iter.map(|e| e.id().get()).collect()
    }

    #[test]
    fn component_view_requires_every_type() {
        let entities = vec![
            entity(1, true, true, false),
            entity(2, true, false, false),
            entity(3, false, true, false),
            entity(4, true, true, false),
        ];
        let view = ComponentView::<(Position, Rotation)>::new(&entities, false);
        assert_eq!(ids(view.iter()), vec![1, 4]);
    }

    #[test]
    fn pending_destroy_skipped_unless_included() {
        let entities = vec![
            entity(1, true, false, true),
            entity(2, true, false, false),
        ];
        let skipping = ComponentView::<(Position,)>::new(&entities, false);
        assert_eq!(ids(skipping.iter()), vec![2]);

        let including = ComponentView::<(Position,)>::new(&entities, true);
        assert_eq!(ids(including.iter()), vec![1, 2]);
    }

    #[test]
    fn entity_view_only_filters_pending() {
        let entities = vec![
            entity(1, false, false, false),
            entity(2, true, false, true),
            entity(3, false, true, false),
        ];
        let view = EntityView::new(&entities, false);
        assert_eq!(ids(view.iter()), vec![1, 3]);
    }

    #[test]
    fn views_restart_from_the_beginning() {
        let entities = vec![entity(1, true, false, false), entity(2, true, false, false)];
        let view = ComponentView::<(Position,)>::new(&entities, false);

        let mut first = view.iter();
        assert_eq!(first.next().map(|e| e.id().get()), Some(1));

        assert_eq!(ids(view.iter()), vec![1, 2]);
        assert_eq!(ids((&view).into_iter()), vec![1, 2]);
        assert_eq!(view.into_iter().count(), 2);
    }

    #[test]
    fn empty_collection_yields_nothing() {
        let entities: Vec<Box<Entity>> = Vec::new();
        let mut iter = EntityView::new(&entities, true).iter();
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
