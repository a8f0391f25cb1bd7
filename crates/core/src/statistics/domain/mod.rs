pub mod fps_window;
pub mod statistics_aggregator;
