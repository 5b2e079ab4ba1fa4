//! boxed error type shared by all the non-real-time code paths
//!
//! The jack thread and the control loop both need to propagate errors
//! across thread boundaries, so the box has to be Send + Sync.  The
//! real-time process path never uses this; it reports failure with a
//! plain bool return.
pub type BoxError = std::boxed::Box<
    dyn std::error::Error // must implement Error to satisfy ?
        + std::marker::Send // needed for threads
        + std::marker::Sync, // needed for threads
>;
