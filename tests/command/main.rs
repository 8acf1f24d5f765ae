//! Command integration test suite; each command gets its own module.

mod apply_test;
mod init_test;
