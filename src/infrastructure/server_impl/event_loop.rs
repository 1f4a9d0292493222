//! A fixed pool of single-threaded event loops.
//!
//! Every loop is an OS thread driving its own current-thread tokio runtime.
//! Work handed to a loop with [`EventLoop::execute`] is spawned on that
//! runtime and therefore never leaves that thread, which is what pins a
//! connection to its loop.

use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tracing::{error, trace};

pub fn default_loop_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct EventLoop {
    index: usize,
    tasks: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl EventLoop {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Queues `task` onto this loop. Returns `false` once the loop has stopped.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.send(task.boxed()).is_ok()
    }
}

/// Round-robin access to the loops of a group; cheap to clone.
#[derive(Debug, Clone)]
pub struct LoopSelector {
    loops: Arc<[EventLoop]>,
    next: Arc<AtomicUsize>,
}

impl LoopSelector {
    pub fn next(&self) -> &EventLoop {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.loops.len();
        &self.loops[idx]
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

#[derive(Debug)]
pub struct EventLoopGroup {
    selector: LoopSelector,
    threads: Vec<thread::JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl EventLoopGroup {
    /// Starts `size` loops (at least one).
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (shutdown, _) = watch::channel(false);

        let mut loops = Vec::with_capacity(size);
        let mut threads = Vec::with_capacity(size);
        for index in 0..size {
            let (event_loop, thread) = spawn_loop(index, shutdown.subscribe())?;
            loops.push(event_loop);
            threads.push(thread);
        }

        Ok(Self {
            selector: LoopSelector {
                loops: loops.into(),
                next: Arc::new(AtomicUsize::new(0)),
            },
            threads,
            shutdown,
        })
    }

    pub fn selector(&self) -> LoopSelector {
        self.selector.clone()
    }

    pub fn len(&self) -> usize {
        self.selector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selector.is_empty()
    }

    /// Stops every loop and waits for its thread. Tasks still running on a
    /// loop are dropped with its runtime, which closes their sockets.
    pub fn shutdown_gracefully(&mut self) {
        let _ = self.shutdown.send(true);

        let current = thread::current().id();
        for thread in self.threads.drain(..) {
            if thread.thread().id() == current {
                continue;
            }
            if thread.join().is_err() {
                error!("event loop thread panicked");
            }
        }
    }
}

impl Drop for EventLoopGroup {
    fn drop(&mut self) {
        self.shutdown_gracefully();
    }
}

fn spawn_loop(
    index: usize,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<(EventLoop, thread::JoinHandle<()>)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (tasks, mut queue) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();

    let thread = thread::Builder::new()
        .name(format!("layoutkit-loop-{index}"))
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    tokio::select! {
                        task = queue.recv() => match task {
                            Some(task) => {
                                tokio::spawn(task);
                            }
                            None => break,
                        },
                        _ = shutdown.wait_for(|stop| *stop) => break,
                    }
                }
            });
            trace!(loop_index = index, "event loop stopped");
        })?;

    Ok((EventLoop { index, tasks }, thread))
}
