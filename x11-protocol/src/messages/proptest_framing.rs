//! Property tests for message framing.
//!
//! Setup messages must parse identically however the stream happens to be
//! split into reads.
