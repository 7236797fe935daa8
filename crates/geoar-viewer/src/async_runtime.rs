//! Async task spawning for native and WASM.
//!
//! Native runs futures on a Tokio runtime (reqwest needs one); WASM runs them
//! on Bevy's `AsyncComputeTaskPool`, where reqwest uses the browser's fetch.
//! Results come back to the schedule over `async_channel` senders and are
//! drained with `try_recv`.

use bevy::prelude::*;

/// Installs the platform's async runtime.
pub struct AsyncRuntimePlugin;

impl Plugin for AsyncRuntimePlugin {
    fn build(&self, app: &mut App) {
        #[cfg(target_family = "wasm")]
        let _ = app;

        #[cfg(not(target_family = "wasm"))]
        app.add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default());
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;

    /// Spawns fetches without `#[cfg]` at every call site.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        runtime: Res<'w, bevy_tokio_tasks::TokioTasksRuntime>,
        // Mirrors the WASM signature.
        #[allow(dead_code)]
        _local: Local<'s, ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Run a future to completion in the background.
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.runtime.spawn_background_task(move |_ctx| future);
        }

        /// Run a future and send its output on `reply`. A closed channel is ignored.
        pub fn spawn_reply<F, T>(&self, future: F, reply: async_channel::Sender<T>)
        where
            F: Future<Output = T> + Send + 'static,
            T: Send + 'static,
        {
            self.spawn(async move {
                let _ = reply.send(future.await).await;
            });
        }
    }
}

#[cfg(target_family = "wasm")]
mod wasm {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;
    use bevy::tasks::AsyncComputeTaskPool;

    /// Spawns fetches without `#[cfg]` at every call site.
    ///
    /// No runtime resource is needed in the browser, so this only carries
    /// placeholders that satisfy the derive.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        #[allow(dead_code)]
        _local: Local<'s, ()>,
        #[allow(dead_code)]
        _marker: std::marker::PhantomData<&'w ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Run a future to completion in the background. The browser is
        /// single-threaded, so `Send` is not required.
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + 'static,
        {
            AsyncComputeTaskPool::get().spawn_local(future).detach();
        }

        /// Run a future and send its output on `reply`. A closed channel is ignored.
        pub fn spawn_reply<F, T>(&self, future: F, reply: async_channel::Sender<T>)
        where
            F: Future<Output = T> + 'static,
            T: 'static,
        {
            self.spawn(async move {
                let _ = reply.send(future.await).await;
            });
        }
    }
}

#[cfg(not(target_family = "wasm"))]
pub use native::TaskSpawner;
#[cfg(target_family = "wasm")]
pub use wasm::TaskSpawner;
