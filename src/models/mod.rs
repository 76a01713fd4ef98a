pub mod fixture;
pub mod ticket;

pub use fixture::{Fixture, FixtureResult, Odds, Outcome};
pub use ticket::{Selection, Settlement, Ticket, TicketStatus};
