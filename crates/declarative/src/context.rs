//! Progress reporting
//!
//! Callbacks are only ever invoked from the thread driving the scheduler,
//! even when objects are processed by a worker pool.

/// Receives progress updates during a run.
pub trait ProgressCallback: Send {
    /// Called when a scheduler pass starts
    fn on_pass_start(&mut self, pass: usize);

    /// Called when an object's explorers and manifest have run
    fn on_object_prepared(&mut self, name: &str);

    /// Called when an object is done
    fn on_object_done(&mut self, name: &str, changed: bool);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_pass_start(&mut self, _pass: usize) {}
    fn on_object_prepared(&mut self, _name: &str) {}
    fn on_object_done(&mut self, _name: &str, _changed: bool) {}
}

/// Records every callback, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    pub passes: usize,
    pub prepared: Vec<String>,
    pub done: Vec<String>,
}

#[cfg(test)]
impl ProgressCallback for RecordingProgress {
    fn on_pass_start(&mut self, _pass: usize) {
        self.passes += 1;
    }

    fn on_object_prepared(&mut self, name: &str) {
        self.prepared.push(name.to_string());
    }

    fn on_object_done(&mut self, name: &str, _changed: bool) {
        self.done.push(name.to_string());
    }
}
