use parking_lot::Mutex;

/// A thread-safe free-list of reusable objects.
///
/// `take` pops an idle object or constructs a fresh one; `put` returns an
/// object, dropping it on the floor once `max_idle` are already parked.
/// Callers are responsible for resetting objects before reuse.
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    make: Box<dyn Fn() -> T + Send + Sync>,
    max_idle: usize,
}

impl<T> Pool<T> {
    pub fn new(max_idle: usize, make: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            make: Box::new(make),
            max_idle,
        }
    }

    pub fn take(&self) -> T {
        if let Some(value) = self.free.lock().pop() {
            return value;
        }
        (self.make)()
    }

    pub fn put(&self, value: T) {
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    pub fn num_idle(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn test_take_reuses_returned_objects() {
        let pool = Pool::new(2, Vec::<u8>::new);
        let mut buf = pool.take();
        buf.push(7);
        pool.put(buf);
        assert_eq!(pool.num_idle(), 1);
        let reused = pool.take();
        assert_eq!(reused, vec![7]);
        assert_eq!(pool.num_idle(), 0);
    }

    #[test]
    fn test_put_respects_max_idle() {
        let pool = Pool::new(1, Vec::<u8>::new);
        pool.put(Vec::new());
        pool.put(Vec::new());
        assert_eq!(pool.num_idle(), 1);
    }
}
