//! Stable, hashable identity for schedules, sets, worlds and executors.
//!
//! A [`Label`]-like value is conceptually the `(type_tag, index)` pair from
//! the data model: `type_tag` is the label's concrete Rust type, `index` is
//! whatever that type's own `Eq`/`Hash` impl considers its identity (an
//! enum's discriminant plus payload, a newtype's wrapped integer, ...).
//! Rather than reaching for raw `TypeId`/integer pairs by hand, we get the
//! same pair for free by going through `Any` + `Eq` + `Hash` on the concrete
//! type and type-erasing it behind a small `DynEq`/`DynHash` vtable. Four
//! marker traits (`ScheduleLabel`, `SystemSetLabel`, `WorldLabel`,
//! `ExecutorLabel`) share this representation but are distinct types, so
//! passing a `ScheduleLabel` where an `ExecutorLabel` is expected is a
//! compile error.

use std::any::Any;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Object-safe equality, implemented for every `Any + Eq` type.
pub trait DynEq: Any {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynEq) -> bool;
}

impl<T: Any + Eq> DynEq for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynEq) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
}

/// Object-safe hashing, implemented for every `DynEq + Hash` type.
///
/// Mixes the concrete `TypeId` into the hash so that two distinct label
/// types whose payloads happen to hash identically never collide.
pub trait DynHash: DynEq {
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: DynEq + Hash> DynHash for T {
    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        T::hash(self, &mut state);
        self.type_id().hash(&mut state);
    }
}

macro_rules! define_label_kind {
    ($(#[$meta:meta])* $label_trait:ident, $interned:ident) => {
        $(#[$meta])*
        pub trait $label_trait: DynHash + Debug + Send + Sync {
            /// Clones this label into an owned, boxed trait object.
            fn dyn_clone(&self) -> Box<dyn $label_trait>;

            /// Upcast to the object-safe equality helper.
            fn as_dyn_eq(&self) -> &dyn DynEq;

            /// Interns this label into a cheap, `Clone`-able handle.
            fn intern(&self) -> $interned
            where
                Self: Sized + Clone + 'static,
            {
                $interned::new(self.clone())
            }
        }

        impl<T> $label_trait for T
        where
            T: DynHash + Debug + Clone + Send + Sync + 'static,
        {
            fn dyn_clone(&self) -> Box<dyn $label_trait> {
                Box::new(self.clone())
            }

            fn as_dyn_eq(&self) -> &dyn DynEq {
                self
            }
        }

        impl PartialEq for dyn $label_trait {
            fn eq(&self, other: &Self) -> bool {
                self.as_dyn_eq().dyn_eq(other.as_dyn_eq())
            }
        }

        impl Eq for dyn $label_trait {}

        impl Hash for dyn $label_trait {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.dyn_hash(state);
            }
        }

        impl Clone for Box<dyn $label_trait> {
            fn clone(&self) -> Self {
                self.dyn_clone()
            }
        }

        /// A cheaply-clonable, hashable handle to a boxed label. Equality and
        /// hashing forward to the wrapped label's own `Eq`/`Hash` impl, so
        /// cloning is just an `Arc` refcount bump regardless of payload size.
        #[derive(Clone)]
        pub struct $interned(Arc<dyn $label_trait>);

        impl $interned {
            pub fn new(label: impl $label_trait + 'static) -> Self {
                Self(Arc::new(label))
            }

            pub fn as_label(&self) -> &dyn $label_trait {
                &*self.0
            }
        }

        impl PartialEq for $interned {
            fn eq(&self, other: &Self) -> bool {
                self.0.as_dyn_eq().dyn_eq(other.0.as_dyn_eq())
            }
        }

        impl Eq for $interned {}

        impl Hash for $interned {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.dyn_hash(state);
            }
        }

        impl Debug for $interned {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Debug::fmt(&*self.0, f)
            }
        }

        impl From<$interned> for Box<dyn $label_trait> {
            fn from(interned: $interned) -> Self {
                interned.0.dyn_clone()
            }
        }
    };
}

define_label_kind!(
    /// Identifies a [`Schedule`](crate::schedule::Schedule) within an app or world.
    ScheduleLabel,
    InternedScheduleLabel
);

define_label_kind!(
    /// Identifies a [`SystemSet`](crate::schedule::SystemSet).
    SystemSetLabel,
    InternedSystemSetLabel
);

define_label_kind!(
    /// Identifies a world (the primary world or one of an app's sub-apps).
    WorldLabel,
    InternedWorldLabel
);

define_label_kind!(
    /// Identifies a named executor (thread pool) that systems may be pinned to.
    ExecutorLabel,
    InternedExecutorLabel
);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    struct Foo;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    struct Bar;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Phase {
        Pre,
        Main,
    }

    #[test]
    fn interned_labels_compare_by_value() {
        let a = Foo.intern();
        let b = Foo.intern();
        assert_eq!(a, b);

        let pre = Phase::Pre.intern();
        let main = Phase::Main.intern();
        assert_ne!(pre, main);
        assert_eq!(pre, Phase::Pre.intern());
    }

    #[test]
    fn distinct_label_kinds_do_not_conflate_equal_payloads() {
        // `Foo` and `Bar` are both unit structs; without mixing the TypeId
        // into the hash/eq these would be indistinguishable once erased.
        let foo: Box<dyn ScheduleLabel> = Box::new(Foo);
        let bar: Box<dyn ScheduleLabel> = Box::new(Bar);
        assert_ne!(&*foo, &*bar);
    }
}
