//! Uniform readiness interface over the kinds of input a work item can
//! wait on.
//!
//! Two variants exist: [`Resolved`] wraps a value that is available up
//! front, and [`Deferred`] is a single-resolution cell. Results returned
//! by the dispatch queue are themselves `Deferred`, so nested dispatch
//! results need no extra variant.
//!
//! [`Dependencies`] lifts the interface to tuples so a work item can wait
//! on several heterogeneous inputs at once.

use crate::deferred::Deferred;

/// A value that may not be available yet.
pub trait Awaitable: Send + 'static {
    /// The value produced once ready.
    type Output: Send + 'static;

    /// Whether [`resolve`](Awaitable::resolve) would return without blocking.
    fn is_ready(&self) -> bool;

    /// Produce the value, blocking the calling thread if it is not ready.
    fn resolve(self) -> Self::Output;
}

/// An input that is already available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved<T>(pub T);

impl<T: Send + 'static> Awaitable for Resolved<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        true
    }

    fn resolve(self) -> T {
        self.0
    }
}

impl<T: Clone + Send + Sync + 'static> Awaitable for Deferred<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        Deferred::is_ready(self)
    }

    fn resolve(self) -> T {
        self.wait().clone()
    }
}

/// A fixed set of [`Awaitable`] inputs, resolved together.
///
/// Implemented for tuples of up to six awaitables, and for `()`.
pub trait Dependencies: Send + 'static {
    /// Tuple of resolved values, in declaration order.
    type Values: Send + 'static;

    /// Whether every input is ready.
    fn all_ready(&self) -> bool;

    /// Resolve every input, blocking on any that are not ready.
    fn resolve_all(self) -> Self::Values;
}

impl Dependencies for () {
    type Values = ();

    fn all_ready(&self) -> bool {
        true
    }

    fn resolve_all(self) {}
}

macro_rules! impl_dependencies {
    ($($dep:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($dep: Awaitable),+> Dependencies for ($($dep,)+) {
            type Values = ($($dep::Output,)+);

            fn all_ready(&self) -> bool {
                let ($($dep,)+) = self;
                true $(&& $dep.is_ready())+
            }

            fn resolve_all(self) -> Self::Values {
                let ($($dep,)+) = self;
                ($($dep.resolve(),)+)
            }
        }
    };
}

impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_is_always_ready() {
        let r = Resolved(String::from("x"));
        assert!(r.is_ready());
        assert_eq!(r.resolve(), "x");
    }

    #[test]
    fn deferred_readiness_tracks_cell() {
        let cell = Deferred::new();
        let dep = cell.clone();
        assert!(!Awaitable::is_ready(&dep));
        cell.set(4u16);
        assert!(Awaitable::is_ready(&dep));
        assert_eq!(dep.resolve(), 4);
    }

    #[test]
    fn unit_dependencies_are_ready() {
        assert!(().all_ready());
        ().resolve_all();
    }

    #[test]
    fn mixed_tuple_waits_for_every_member() {
        let a = Deferred::new();
        let b = Deferred::new();
        let deps = (a.clone(), Resolved(10u8), b.clone());
        assert!(!deps.all_ready());

        a.set(1i32);
        assert!(!deps.all_ready(), "b is still pending");

        b.set("b");
        assert!(deps.all_ready());
        assert_eq!(deps.resolve_all(), (1, 10, "b"));
    }

    #[test]
    fn six_way_tuple_resolves_in_order() {
        let deps = (
            Resolved(1u8),
            Resolved(2u16),
            Resolved(3u32),
            Resolved(4u64),
            Deferred::resolved(5i8),
            Deferred::resolved(6i16),
        );
        assert!(deps.all_ready());
        assert_eq!(deps.resolve_all(), (1, 2, 3, 4, 5, 6));
    }
}
