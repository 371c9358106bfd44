pub mod appointment;
pub mod availability;
pub mod draft;
pub mod payment;
pub mod schedule;
pub mod search;
pub mod wire;

pub use appointment::{
    derive_capabilities, Appointment, AppointmentStatus, AppointmentView, Capabilities,
    PaymentMethod, PaymentStatus, ServiceLineItem,
};
pub use availability::{RawSlot, SlotCapacity, TimeSlotAvailability};
pub use draft::{AppointmentDraft, DraftPatch, SelectedService, ServiceSelection, SizeClass, Species};
pub use payment::{PaymentRecord, PaymentRecordStatus, PaymentSuccessMarker, PaymentSummary};
pub use search::{CustomerIdentity, SearchCriteria, SearchKind};
pub use wire::Amount;
