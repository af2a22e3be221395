// Observable value holder
// One writer publishes, any number of readers watch for the latest value
use tokio::sync::watch;

/// Single-writer value holder backed by a watch channel.
///
/// The owner publishes with [`Observable::set`]; readers obtain a
/// [`watch::Receiver`] from [`Observable::subscribe`] and are woken on
/// every publish. Readers only ever see the latest value.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Receive the current value and all future updates
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    // Publishing never fails, even with no live receivers
    pub(crate) fn set(&self, value: T) {
        self.tx.send_replace(value);
    }
}

impl<T: Clone> Observable<T> {
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
