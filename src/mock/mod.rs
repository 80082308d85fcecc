//! Deterministic clock test double, driven through `FnTimeGen` in place of
//! `SystemTime::now()`.

pub(crate) mod mock_time;
