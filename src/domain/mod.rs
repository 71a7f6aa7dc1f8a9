// Domain layer: DTOs and the ports the stores talk through.

pub mod model;
pub mod ports;
