//! The background execution context for discovery and activation.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{Span, debug, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Mode {
    Thread {
        tx: Option<Sender<(Span, Job)>>,
        handle: Option<JoinHandle<()>>,
    },
    Inline,
}

/// Runs submitted jobs one at a time, in submission order.
pub struct Worker {
    name: String,
    mode: Mode,
}

impl Worker {
    pub fn spawn(name: &str) -> io::Result<Worker> {
        let (tx, rx) = unbounded::<(Span, Job)>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || run(rx))?;
        Ok(Worker {
            name: name.to_string(),
            mode: Mode::Thread { tx: Some(tx), handle: Some(handle) },
        })
    }

    /// A worker that runs each job on the submitting thread before
    /// `submit` returns.
    pub fn inline(name: &str) -> Worker {
        Worker { name: name.to_string(), mode: Mode::Inline }
    }

    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        match &self.mode {
            Mode::Inline => {
                let _guard = Span::current().entered();
                job()
            }
            Mode::Thread { tx: Some(tx), .. } => {
                if tx.send((Span::current(), Box::new(job))).is_err() {
                    debug!(worker = %self.name, "worker thread is gone; dropping job");
                }
            }
            Mode::Thread { tx: None, .. } => {}
        }
    }
}

fn run(rx: Receiver<(Span, Job)>) {
    for (span, job) in rx {
        let _guard = span.enter();
        trace!("running job");
        job();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Mode::Thread { tx, handle } = &mut self.mode {
            tx.take();
            if let Some(handle) = handle.take()
                && handle.join().is_err()
            {
                debug!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}
