pub mod app;
pub mod mock_runner;
