pub mod delivery;
pub mod endpoints;
pub mod trigger;

pub use delivery::DeliveryService;
pub use endpoints::EndpointService;
pub use trigger::TriggerService;
