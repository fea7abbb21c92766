/// Application-wide constants for audio capture and streaming recognition

pub mod coordinator {
    /// How long the coordinator waits on the buffer condvar per iteration
    /// before re-checking for shutdown.
    pub const WAIT_SLICE_MS: u64 = 100;

    /// A failed recognition pass is retried exactly this many times before
    /// the session aborts with a recognition error.
    pub const RECOGNITION_RETRIES: usize = 1;
}
