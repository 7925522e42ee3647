//! Set-algebra queries over component kinds.
//!
//! A [`Query`] selects entities by the kinds they hold. A [`MultiQuery`]
//! combines the results of several queries with the same union/intersection
//! rules, e.g. "has MeshReference AND (Position OR Rotation OR Scale)".

use std::{collections::HashSet, hash::Hash};

use crate::ecs::component::ComponentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Entities holding any of the kinds.
    Union(Vec<ComponentKind>),
    /// Entities holding every kind.
    Intersection(Vec<ComponentKind>),
    /// Raw candidate list of one kind.
    Single(ComponentKind),
}

impl Query {
    pub fn any_of(kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        Query::Union(kinds.into_iter().collect())
    }

    pub fn all_of(kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        Query::Intersection(kinds.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiQuery {
    pub op: SetOp,
    pub queries: Vec<Query>,
}

impl MultiQuery {
    pub fn union(queries: impl IntoIterator<Item = Query>) -> Self {
        Self {
            op: SetOp::Union,
            queries: queries.into_iter().collect(),
        }
    }

    pub fn intersection(queries: impl IntoIterator<Item = Query>) -> Self {
        Self {
            op: SetOp::Intersection,
            queries: queries.into_iter().collect(),
        }
    }
}

pub(crate) fn combine<T: Copy + Eq + Hash>(op: SetOp, lists: &[Vec<T>]) -> Vec<T> {
    match op {
        SetOp::Union => union(lists),
        SetOp::Intersection => intersection(lists),
    }
}

/// Concatenation of all lists, keeping the first occurrence of each element.
pub fn union<T: Copy + Eq + Hash>(lists: &[Vec<T>]) -> Vec<T> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flatten()
        .copied()
        .filter(|element| seen.insert(*element))
        .collect()
}

/// Elements present in every list, in the order of the first list.
pub fn intersection<T: Copy + Eq + Hash>(lists: &[Vec<T>]) -> Vec<T> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    let rest: Vec<HashSet<T>> = rest
        .iter()
        .map(|list| list.iter().copied().collect())
        .collect();
    let mut seen = HashSet::new();
    first
        .iter()
        .copied()
        .filter(|element| rest.iter().all(|set| set.contains(element)))
        .filter(|element| seen.insert(*element))
        .collect()
}
