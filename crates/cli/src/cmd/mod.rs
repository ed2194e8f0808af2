mod start;

pub use start::cmd_start;
