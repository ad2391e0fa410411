//! Typed view and initializer helpers.

use std::future::Future;

use pathstate_core::{InitError, Initializer, Path, Subscription, View};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::convert::{from_value, to_value};
use crate::error::Result;

/// Extension trait for typed access through a view.
///
/// Reads go through the view, so they are tracked exactly like untyped
/// reads. Writes serialize first and then follow the usual equality and
/// notification rules.
///
/// # Example
///
/// ```rust
/// use pathstate_core::{Engine, Target, Value};
/// use pathstate_serde::TypedView;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Profile {
///     name: String,
///     age: u32,
/// }
///
/// let engine = Engine::new();
/// let target = Target::new(Value::map());
/// let store = engine.wrap(&target).unwrap();
///
/// let profile = Profile { name: "ada".into(), age: 36 };
/// store.set_as("profile", &profile).unwrap();
/// assert_eq!(store.get_as::<Profile>("profile").unwrap(), Some(profile));
/// ```
pub trait TypedView {
    /// Read a child and deserialize it.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// Read a nested location relative to the view and deserialize it.
    fn get_in_as<T: DeserializeOwned>(&self, relative: &Path) -> Result<Option<T>>;

    /// Deserialize the whole subtree the view addresses.
    fn snapshot_as<T: DeserializeOwned>(&self) -> Result<T>;

    /// Serialize and write a child. Returns whether anything changed.
    fn set_as<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<bool>;

    /// Serialize and merge into the view's map.
    fn merge_as<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool>;

    /// Serialize and replace the view's contents in place.
    fn replace_as<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool>;
}

impl TypedView for View {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key).map(from_value).transpose()
    }

    fn get_in_as<T: DeserializeOwned>(&self, relative: &Path) -> Result<Option<T>> {
        self.get_in(relative).map(from_value).transpose()
    }

    fn snapshot_as<T: DeserializeOwned>(&self) -> Result<T> {
        from_value(self.snapshot())
    }

    fn set_as<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<bool> {
        Ok(self.set(key, to_value(data)?)?)
    }

    fn merge_as<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool> {
        Ok(self.merge(to_value(data)?)?)
    }

    fn replace_as<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool> {
        Ok(self.replace(to_value(data)?)?)
    }
}

/// Deserialize the current selection of a subscription.
pub fn selection_as<T: DeserializeOwned>(subscription: &Subscription) -> Result<T> {
    from_value(subscription.value())
}

/// Build a value initializer from any serializable partial state.
pub fn initializer_from<T: Serialize + ?Sized>(data: &T) -> Result<Initializer> {
    Ok(Initializer::value(to_value(data)?))
}

/// Wrap a synchronous initializer that returns a serializable result.
pub fn typed_sync<F, T>(f: F) -> Initializer
where
    F: Fn(&View) -> std::result::Result<T, InitError> + 'static,
    T: Serialize,
{
    Initializer::sync(move |store| {
        let data = f(store)?;
        Ok(to_value(&data)?)
    })
}

/// Wrap an async initializer that resolves to a serializable result.
///
/// A result that fails to serialize settles the computation as a failure.
pub fn typed_future<F, Fut, T>(f: F) -> Initializer
where
    F: Fn(View) -> Fut + 'static,
    Fut: Future<Output = std::result::Result<T, InitError>> + 'static,
    T: Serialize + 'static,
{
    Initializer::future(move |store| {
        let pending = f(store);
        async move {
            let data = pending.await?;
            Ok::<_, InitError>(to_value(&data)?)
        }
    })
}
