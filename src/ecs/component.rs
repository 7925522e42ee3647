//! Component kinds and the closed [`Component`] enum stored by the [`World`](super::World).
//!
//! Every kind of data an entity can carry is one variant of [`Component`].
//! Typed access goes through [`ComponentData`], which each payload type
//! implements, so lookups are matched on the enum discriminant rather than on
//! strings.

use std::fmt;

use crate::{
    camera::PerspectiveCamera,
    data_structures::{
        mesh::MeshReference,
        texture::TextureReference,
        transform::{Position, Rotation, Scale},
    },
    ecs::Entity,
    lights::{AmbientLight, DirectionalLight, Light, PointLight},
};

/// Stable identifier of a component kind. An entity holds at most one
/// component per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Position,
    Rotation,
    Scale,
    MeshReference,
    TextureReference,
    Parent,
    Children,
    Light,
    PointLight,
    AmbientLight,
    DirectionalLight,
    PerspectiveCamera,
}

impl ComponentKind {
    pub const fn tag(self) -> &'static str {
        match self {
            ComponentKind::Position => "Position",
            ComponentKind::Rotation => "Rotation",
            ComponentKind::Scale => "Scale",
            ComponentKind::MeshReference => "MeshReference",
            ComponentKind::TextureReference => "TextureReference",
            ComponentKind::Parent => "Parent",
            ComponentKind::Children => "Children",
            ComponentKind::Light => "Light",
            ComponentKind::PointLight => "PointLight",
            ComponentKind::AmbientLight => "AmbientLight",
            ComponentKind::DirectionalLight => "DirectionalLight",
            ComponentKind::PerspectiveCamera => "PerspectiveCamera",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One level of transform inheritance. `None` marks a detached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Parent(pub Option<Entity>);

/// Ordered list of entities owned by a model root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Children(pub Vec<Entity>);

/// Tagged component record as stored in the world.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Position(Position),
    Rotation(Rotation),
    Scale(Scale),
    MeshReference(MeshReference),
    TextureReference(TextureReference),
    Parent(Parent),
    Children(Children),
    Light(Light),
    PointLight(PointLight),
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
    PerspectiveCamera(PerspectiveCamera),
}

/// Typed view onto one [`Component`] variant.
pub trait ComponentData: Into<Component> + Sized {
    const KIND: ComponentKind;

    fn from_ref(component: &Component) -> Option<&Self>;

    fn from_mut(component: &mut Component) -> Option<&mut Self>;

    fn from_owned(component: Component) -> Option<Self>;
}

macro_rules! component_data {
    ($($variant:ident),* $(,)?) => {
        impl Component {
            pub fn kind(&self) -> ComponentKind {
                match self {
                    $(Component::$variant(_) => ComponentKind::$variant,)*
                }
            }
        }

        $(
            impl From<$variant> for Component {
                fn from(value: $variant) -> Self {
                    Component::$variant(value)
                }
            }

            impl ComponentData for $variant {
                const KIND: ComponentKind = ComponentKind::$variant;

                fn from_ref(component: &Component) -> Option<&Self> {
                    match component {
                        Component::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_mut(component: &mut Component) -> Option<&mut Self> {
                    match component {
                        Component::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_owned(component: Component) -> Option<Self> {
                    match component {
                        Component::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

component_data!(
    Position,
    Rotation,
    Scale,
    MeshReference,
    TextureReference,
    Parent,
    Children,
    Light,
    PointLight,
    AmbientLight,
    DirectionalLight,
    PerspectiveCamera,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        let component: Component = Parent(Some(3)).into();
        assert_eq!(component.kind(), ComponentKind::Parent);
        assert_eq!(Parent::from_ref(&component), Some(&Parent(Some(3))));
        assert!(Children::from_ref(&component).is_none());
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(ComponentKind::MeshReference.tag(), "MeshReference");
        assert_eq!(ComponentKind::PerspectiveCamera.to_string(), "PerspectiveCamera");
    }
}
