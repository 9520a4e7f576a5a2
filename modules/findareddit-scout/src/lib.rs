pub mod mentions;
pub mod registry;
pub mod report;
pub mod run_loop;
pub mod scan;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod validator;
