// Entity Models - one module per table
//
// Each entity module has:
// - The row struct (Serialize, handed to templates as-is)
// - An `*Input` struct with `validate()` for create/edit
// - Free repository functions taking `&Connection`

pub mod appointment;
pub mod event;
pub mod fixed_cost;
pub mod member;
pub mod message;
pub mod ministry;
pub mod transaction;
pub mod user;

pub use appointment::{Appointment, AppointmentInput};
pub use event::{Event, EventInput};
pub use fixed_cost::{FixedCost, FixedCostInput};
pub use member::{Member, MemberInput, MemberStatus};
pub use message::{Channel, DeliveryStatus, MessageLogEntry, SentMessage};
pub use ministry::{Ministry, MinistryInput};
pub use transaction::{PaymentMethod, Transaction, TransactionFilter, TransactionInput, TransactionKind};
pub use user::{AccessLevel, NewUser, User};
