// Domain layer: plant records, filter values and the repository port.

pub mod model;
pub mod ports;
