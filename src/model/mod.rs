//! Core data structures
//!
//! Defines Ticket, WindowCategory and CompanyProfile, the records every actor
//! exchanges through the shared store.

mod ids;
mod ticket;
mod window;

pub use ids::{TicketId, WindowId, TICKET_PREFIX};
pub use ticket::{Ticket, TicketStatus};
pub use window::{CompanyProfile, WindowCategory};
