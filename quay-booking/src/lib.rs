pub mod directory;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod repository;

pub use directory::DepartureDirectory;
pub use ledger::CapacityUpdate;
pub use lifecycle::{BookingLifecycle, CancelRequest, HoldRequest};
pub use models::{
    Booking, BookingStatus, Departure, DepartureResource, DepartureStatus, DeparturePatch,
    NewDeparture, NewResource,
};
pub use repository::{
    BookingFilter, BookingStore, DepartureFilter, DepartureStore, Page, PageResult, StoreError,
};
