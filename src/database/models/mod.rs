pub mod appointment;
pub mod patient;
pub mod subscription;
pub mod tenant;
pub mod usage;

pub use appointment::{Appointment, AppointmentDraft};
pub use patient::{Patient, PatientDraft};
pub use subscription::{
    ActiveSubscription, PackageLimit, QuotaLimit, Subscription, SubscriptionPackage, SubscriptionStatus,
};
pub use tenant::{Membership, Tenant};
pub use usage::UsageTracking;
