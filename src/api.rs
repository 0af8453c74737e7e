pub mod auth;
pub mod session_guard;
pub mod swagger_main;
pub mod task;
pub mod timeline;

#[cfg(test)]
pub mod test_util;
