/*
Copyright 2021 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Support types referenced by generated component implementations.

use std::cell::UnsafeCell;

/// Creates a binding on demand.
///
/// `T` will be created each time [`Provider::get`] is called, allowing
/// multiple instances to be created.
///
/// This also prevents creating `T` immediately when constructing an object
/// that depends on `T`, which allows lazy initialization and can break a
/// dependency cycle.
///
/// If only a single cached instance is needed, consider using [`Lazy<T>`]
/// instead.
pub struct Provider<'a, T> {
    f: Box<dyn Fn() -> T + 'a>,
}

impl<'a, T> Provider<'a, T> {
    pub fn new(f: impl Fn() -> T + 'a) -> Self {
        Provider {
            f: std::boxed::Box::new(f),
        }
    }

    pub fn get(&self) -> T {
        (self.f)()
    }
}

/// Creates the binding once, on first use.
pub struct Lazy<'a, T> {
    provider: Provider<'a, T>,
    value: Once<T>,
}

impl<'a, T> Lazy<'a, T> {
    pub fn new(provider: Provider<'a, T>) -> Self {
        Lazy {
            provider,
            value: Once::new(),
        }
    }

    pub fn get(&'a self) -> &'a T {
        self.value.get(|| self.provider.get())
    }
}

/// One-time initialized cell backing scoped bindings.
#[doc(hidden)]
pub struct Once<T> {
    once: std::sync::Once,
    value: UnsafeCell<Option<T>>,
}

impl<T> Once<T> {
    pub fn new() -> Self {
        Once {
            once: std::sync::Once::new(),
            value: UnsafeCell::new(None),
        }
    }

    pub fn get<F>(&self, initializer: F) -> &T
    where
        F: FnOnce() -> T,
    {
        unsafe {
            self.once
                .call_once(|| *self.value.get() = Some(initializer()));
            (*self.value.get()).as_ref().unwrap()
        }
    }
}

impl<T> Default for Once<T> {
    fn default() -> Self {
        Once::new()
    }
}

/// Why a production binding did not deliver a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionError {
    message: String,
}

impl ProductionError {
    pub fn new(message: &str) -> Self {
        ProductionError {
            message: message.to_owned(),
        }
    }
}

impl std::fmt::Display for ProductionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProductionError {}

/// Outcome of a production binding, observable without unwrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced<T> {
    result: Result<T, ProductionError>,
}

impl<T> Produced<T> {
    pub fn of(result: Result<T, ProductionError>) -> Self {
        Produced { result }
    }

    pub fn succeeded(value: T) -> Self {
        Produced { result: Ok(value) }
    }

    pub fn failed(error: ProductionError) -> Self {
        Produced { result: Err(error) }
    }

    pub fn get(self) -> Result<T, ProductionError> {
        self.result
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Produces the binding on demand, surfacing failure through [`Produced`].
pub struct Producer<'a, T> {
    f: Box<dyn Fn() -> Produced<T> + 'a>,
}

impl<'a, T> Producer<'a, T> {
    pub fn new(f: impl Fn() -> Produced<T> + 'a) -> Self {
        Producer {
            f: std::boxed::Box::new(f),
        }
    }

    pub fn get(&self) -> Produced<T> {
        (self.f)()
    }
}

/// Populates the `#[inject]` fields of an already constructed instance.
pub struct MembersInjector<'a, T> {
    f: Box<dyn Fn(&mut T) + 'a>,
}

impl<'a, T> MembersInjector<'a, T> {
    pub fn new(f: impl Fn(&mut T) + 'a) -> Self {
        MembersInjector {
            f: std::boxed::Box::new(f),
        }
    }

    pub fn inject(&self, target: &mut T) {
        (self.f)(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_creates_every_time() {
        let mut count = std::cell::Cell::new(0);
        let counter = &count;
        let provider = Provider::new(move || {
            counter.set(counter.get() + 1);
            counter.get()
        });
        assert_eq!(provider.get(), 1);
        assert_eq!(provider.get(), 2);
        drop(provider);
        assert_eq!(*count.get_mut(), 2);
    }

    #[test]
    fn lazy_creates_once() {
        let count = std::cell::Cell::new(0);
        let counter = &count;
        let lazy = Lazy::new(Provider::new(move || {
            counter.set(counter.get() + 1);
            "value".to_owned()
        }));
        assert_eq!(lazy.get(), "value");
        assert_eq!(lazy.get(), "value");
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn once_returns_same_instance() {
        let once: Once<String> = Once::new();
        let first = once.get(|| "a".to_owned()) as *const String;
        let second = once.get(|| "b".to_owned()) as *const String;
        assert_eq!(first, second);
    }

    #[test]
    fn produced_carries_failure() {
        let ok: Produced<i32> = Produced::succeeded(1);
        assert!(!ok.is_failure());
        assert_eq!(ok.get().unwrap(), 1);
        let failed: Produced<i32> = Produced::failed(ProductionError::new("out of juice"));
        assert!(failed.is_failure());
        assert_eq!(
            failed.get().unwrap_err().to_string(),
            "out of juice"
        );
    }

    #[test]
    fn members_injector_mutates_target() {
        let injector = MembersInjector::new(|target: &mut Vec<i32>| target.push(7));
        let mut target = Vec::new();
        injector.inject(&mut target);
        assert_eq!(target, vec![7]);
    }
}
