pub mod telemetry_loop;

pub use telemetry_loop::{run, telemetry_loop, Payload};
