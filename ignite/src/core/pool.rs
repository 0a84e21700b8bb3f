use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::core::context::Context;

///
/// Idle contexts waiting for their next request. The lock only guards the
/// push/pop, allocation happens outside of it.
///
pub struct ContextPool {
    idle: Mutex<Vec<Box<Context>>>,
    capacity: usize,
    config: Arc<Config>,
}

impl ContextPool {
    pub fn new(config: Arc<Config>) -> ContextPool {
        ContextPool {
            idle: Mutex::new(Vec::new()),
            capacity: config.pool_capacity,
            config,
        }
    }

    /// Hands out an idle context, or a fresh one when the pool is empty.
    pub fn acquire(&self) -> Box<Context> {
        let pooled = self.idle.lock().pop();

        match pooled {
            Some(context) => context,
            None => {
                debug!("Context pool empty, allocating a new context");
                Box::new(Context::new(self.config.clone()))
            }
        }
    }

    pub fn release(&self, context: Box<Context>) {
        {
            let mut idle = self.idle.lock();
            if idle.len() < self.capacity {
                idle.push(context);
                return;
            }
        }

        debug!("Context pool full, dropping a context");
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_reuse_released_contexts() {
        let pool = ContextPool::new(Arc::new(Config::default()));

        let context = pool.acquire();
        let address = &*context as *const Context;
        pool.release(context);

        assert_eq!(pool.idle(), 1);
        assert_eq!(&*pool.acquire() as *const Context, address);
    }

    #[test]
    fn it_should_drop_contexts_beyond_capacity() {
        let pool = ContextPool::new(Arc::new(Config::default().with_pool_capacity(1)));

        let first = pool.acquire();
        let second = pool.acquire();
        pool.release(first);
        pool.release(second);

        assert_eq!(pool.idle(), 1);
    }
}
