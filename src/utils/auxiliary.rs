use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

pub type SharableRef<T> = Arc<Mutex<T>>;

pub trait SharableRefExt<T: ?Sized> {
    fn new_sharable(inner: T) -> SharableRef<T>
    where
        T: Sized;

    /// Locks the reference. A worker that panicked while holding the lock leaves the data as
    /// it was, so the guard is recovered instead of propagating the poison.
    fn lock_sharable(&self) -> MutexGuard<'_, T>;
}

impl<T: ?Sized> SharableRefExt<T> for SharableRef<T> {
    fn new_sharable(inner: T) -> SharableRef<T>
    where
        T: Sized,
    {
        Arc::new(Mutex::new(inner))
    }

    fn lock_sharable(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawns a named worker thread. On the target the FreeRTOS task backing the thread gets
/// `priority`; on the host the priority is only informative.
pub fn spawn_worker<F, R>(name: &'static str, priority: u8, work: F) -> io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    #[cfg(target_os = "espidf")]
    {
        use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;

        ThreadSpawnConfiguration {
            priority,
            ..Default::default()
        }
        .set()
        .map_err(io::Error::other)?;
    }
    log::debug!("spawning {name} worker with priority {priority}");

    let handle = thread::Builder::new().name(name.to_string()).spawn(work);

    #[cfg(target_os = "espidf")]
    {
        use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;

        ThreadSpawnConfiguration::default()
            .set()
            .map_err(io::Error::other)?;
    }
    handle
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_poisoned_reference_is_still_usable() {
        let shared = SharableRef::new_sharable(5u32);
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock_sharable();
            panic!("poison the lock");
        })
        .join();
        *shared.lock_sharable() += 1;
        assert_eq!(*shared.lock_sharable(), 6);
    }

    #[test]
    fn test1_spawned_worker_carries_its_name() {
        let handle =
            spawn_worker("capture", 5, || thread::current().name().map(str::to_string)).unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("capture"));
    }
}
