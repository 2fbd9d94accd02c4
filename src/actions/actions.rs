use crate::channel::Subscription;
use crate::error::{BoxError, StoreError};
use crate::store::{Publication, Readable, Ready, Writable};
use futures::future;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Computes the next value from the current one.
pub type Reducer<T> = Box<dyn FnOnce(&T) -> Result<T, BoxError> + Send>;

type Generator<T, A> = Arc<dyn Fn(A) -> Reducer<T> + Send + Sync>;

/// Named reducer generators over a value of type `T`.
///
/// Each action turns its arguments (`A`) into a reducer. Actions that need
/// different arguments can share an enum for `A`.
///
/// ```
/// use spellkit::{ActionSet, Readable, Store};
///
/// let counter = ActionSet::new()
///     .action("add", |n: i32| move |current: &i32| current + n)
///     .bind(Store::new(0));
///
/// counter.dispatch("add", 5).unwrap();
/// counter.dispatch("add", 3).unwrap();
/// assert_eq!(counter.unwrap(), 8);
/// ```
pub struct ActionSet<T, A = ()> {
    actions: BTreeMap<String, Generator<T, A>>,
}

impl<T: 'static, A: 'static> ActionSet<T, A> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Register an infallible action.
    pub fn action<G, R>(self, name: impl Into<String>, generator: G) -> Self
    where
        G: Fn(A) -> R + Send + Sync + 'static,
        R: FnOnce(&T) -> T + Send + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move |args| {
                let reducer = generator(args);
                Box::new(move |current: &T| Ok::<T, BoxError>(reducer(current))) as Reducer<T>
            }),
        )
    }

    /// Register an action whose reducer can fail.
    ///
    /// A failing reducer leaves the store untouched and its error is
    /// returned from `dispatch` as [`StoreError::Action`].
    pub fn try_action<G, R, E>(self, name: impl Into<String>, generator: G) -> Self
    where
        G: Fn(A) -> R + Send + Sync + 'static,
        R: FnOnce(&T) -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.insert(
            name.into(),
            Arc::new(move |args| {
                let reducer = generator(args);
                Box::new(move |current: &T| reducer(current).map_err(Into::<BoxError>::into))
                    as Reducer<T>
            }),
        )
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Whether an action called `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Attach these actions to `store`.
    pub fn bind<S>(self, store: S) -> WithActions<S, A>
    where
        S: Writable<Value = T>,
    {
        WithActions::new(store, self)
    }

    fn insert(mut self, name: String, generator: Generator<T, A>) -> Self {
        if self.actions.insert(name.clone(), generator).is_some() {
            tracing::warn!(action = %name, "action registered twice; keeping the later one");
        }
        self
    }

    fn reducer(&self, name: &str, args: A) -> Result<Reducer<T>, StoreError> {
        let generator = self
            .actions
            .get(name)
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;
        Ok(generator(args))
    }
}

impl<T: 'static, A: 'static> Default for ActionSet<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A> fmt::Debug for ActionSet<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

/// A store paired with a set of named actions.
///
/// Readable and writable exactly like the wrapped store, which it shares:
/// closing this closes the store.
pub struct WithActions<S: Readable, A = ()> {
    store: S,
    actions: Arc<ActionSet<S::Value, A>>,
}

impl<S, A> WithActions<S, A>
where
    S: Writable,
    A: 'static,
{
    /// Attach `actions` to `store`; same as [`ActionSet::bind`].
    pub fn new(store: S, actions: ActionSet<S::Value, A>) -> Self {
        Self {
            store,
            actions: Arc::new(actions),
        }
    }

    /// Run action `name` against the current value and publish the result.
    ///
    /// Fails with [`StoreError::NotReady`] while the store is Pending, see
    /// [`dispatch_async`](Self::dispatch_async).
    pub fn dispatch(&self, name: &str, args: A) -> Result<(), StoreError> {
        let reducer = self.actions.reducer(name, args)?;
        let current = self.store.current().ok_or(StoreError::NotReady)?;
        self.apply(name, reducer, &current)
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The registered actions.
    pub fn actions(&self) -> &ActionSet<S::Value, A> {
        &self.actions
    }

    fn apply(
        &self,
        name: &str,
        reducer: Reducer<S::Value>,
        current: &S::Value,
    ) -> Result<(), StoreError> {
        let next = reducer(current).map_err(|source| StoreError::Action {
            name: name.to_string(),
            source,
        })?;
        self.store.publish(next)
    }
}

impl<S, A> WithActions<S, A>
where
    S: Writable + Clone + 'static,
    A: Send + 'static,
{
    /// Like [`dispatch`](Self::dispatch), but waits for a Pending store to
    /// hydrate first.
    pub fn dispatch_async(&self, name: &str, args: A) -> Publication {
        let reducer = match self.actions.reducer(name, args) {
            Ok(reducer) => reducer,
            Err(err) => return future::ready(Err(err)).boxed(),
        };
        let this = self.clone();
        let name = name.to_string();
        async move {
            let current = this.store.ready().await?;
            this.apply(&name, reducer, &current)
        }
        .boxed()
    }
}

impl<S: Readable, A> Readable for WithActions<S, A>
where
    A: 'static,
{
    type Value = S::Value;

    fn current(&self) -> Option<S::Value> {
        self.store.current()
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&S::Value) + Send + Sync + 'static,
    {
        self.store.subscribe(f)
    }

    fn ready(&self) -> Ready<S::Value> {
        self.store.ready()
    }

    fn close(&self) {
        self.store.close();
    }

    fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl<S: Writable, A: 'static> Writable for WithActions<S, A> {
    fn publish(&self, value: S::Value) -> Result<(), StoreError> {
        self.store.publish(value)
    }
}

impl<S: Readable + Clone, A> Clone for WithActions<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            actions: Arc::clone(&self.actions),
        }
    }
}

impl<S: Readable + fmt::Debug, A> fmt::Debug for WithActions<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithActions")
            .field("store", &self.store)
            .field("actions", &self.actions)
            .finish()
    }
}
