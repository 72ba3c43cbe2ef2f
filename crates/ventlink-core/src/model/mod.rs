// ── Domain model ──
//
// Typed readings as consumers see them. Device units (tenths of a degree,
// raw mode codes) never leak past `convert`.

pub mod sensor;
pub mod snapshot;

pub use sensor::{DeviceClass, SENSOR_COUNT, SensorDescription, SensorKey, Unit};
pub use snapshot::{Reading, ReadingValue, Snapshot};
