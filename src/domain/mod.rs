// Domain layer: core models, column rules and ports (interfaces).

pub mod model;
pub mod ports;
pub mod rules;
