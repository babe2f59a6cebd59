//! Terminal styling utilities
//!
//! Consistent colors for the CLI board and console listings.
//! Uses crossterm for cross-platform terminal colors.

use crate::model::{Ticket, TicketStatus};
use crossterm::style::{StyledContent, Stylize};

/// Status colors
/// - waiting: Yellow
/// - called: Green
pub fn status_style(status: TicketStatus) -> StyledContent<&'static str> {
    match status {
        TicketStatus::Waiting => status.as_str().yellow(),
        TicketStatus::Called => status.as_str().green(),
    }
}

/// Status indicator (circle)
pub fn status_indicator(status: TicketStatus) -> StyledContent<&'static str> {
    match status {
        TicketStatus::Waiting => "○".yellow(),
        TicketStatus::Called => "●".green(),
    }
}

/// Ticket id, bold for emphasis on the board
pub fn ticket_id(ticket: &Ticket) -> StyledContent<String> {
    ticket.id.to_string().cyan().bold()
}

/// Window number as shown next to a called ticket
pub fn window(number: u32) -> StyledContent<String> {
    format!("→ window {}", number).green().bold()
}

/// Count styling: dim when zero
pub fn count(n: usize) -> StyledContent<String> {
    if n == 0 {
        n.to_string().dark_grey()
    } else {
        n.to_string().white()
    }
}

/// Section headers
pub fn header(text: &str) -> StyledContent<String> {
    text.to_string().bold()
}

/// Dim/muted text
pub fn dim(text: &str) -> StyledContent<String> {
    text.to_string().dark_grey()
}

/// Success text
pub fn success(text: &str) -> StyledContent<String> {
    text.to_string().green()
}

/// Warning text
pub fn warning(text: &str) -> StyledContent<String> {
    text.to_string().yellow()
}

/// Path styling
pub fn path(p: &str) -> StyledContent<String> {
    p.to_string().blue()
}

/// One ticket on a single line
pub fn ticket_line(ticket: &Ticket) -> String {
    match (ticket.status, ticket.window) {
        (TicketStatus::Called, Some(number)) => format!(
            "{} {}  {}  {}",
            status_indicator(ticket.status),
            ticket_id(ticket),
            dim(&ticket.category),
            window(number)
        ),
        _ => format!(
            "{} {}  {}",
            status_indicator(ticket.status),
            ticket_id(ticket),
            dim(&ticket.category)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_colors() {
        let _ = status_style(TicketStatus::Waiting);
        let _ = status_style(TicketStatus::Called);
        let _ = status_indicator(TicketStatus::Called);
    }

    #[test]
    fn test_ticket_line_shows_window_for_called() {
        let mut ticket = Ticket::new(7, "Loans", Utc::now());
        assert!(!ticket_line(&ticket).contains("window"));

        ticket.mark_called(3, Utc::now());
        let line = ticket_line(&ticket);
        assert!(line.contains("T7"));
        assert!(line.contains("window 3"));
    }
}
