// Ticket-availability transition detection
//
// Only the single most recent prior `tickets_left` for an identity is consulted.
// Without a baseline no transition can be inferred.

use std::fmt;

/// A change in ticket availability between two consecutive observations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// prior `<= 0`, current `> 0`
    TicketsAppeared { available: i32 },
    /// prior `> 0`, current `<= 0`
    TicketsExhausted,
}

impl Transition {
    /// Classify the move from `prior` to `current` tickets left
    pub fn classify(prior: Option<i32>, current: i32) -> Option<Self> {
        let prior = prior?;
        if prior <= 0 && current > 0 {
            Some(Transition::TicketsAppeared { available: current })
        } else if prior > 0 && current <= 0 {
            Some(Transition::TicketsExhausted)
        } else {
            None
        }
    }

    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::TicketsAppeared { .. } => "tickets_appeared",
            Transition::TicketsExhausted => "tickets_exhausted",
        }
    }

    /// Operator-facing message for this transition
    pub fn message(&self, location: &str, queue_id: i32) -> String {
        match self {
            Transition::TicketsAppeared { available } => format!(
                "🎉 Внимание! Появились талоны по услуге \"получение карты\" в {} (очередь {}). Доступно: {} ✅",
                location, queue_id, available
            ),
            Transition::TicketsExhausted => format!(
                "⛔️ Талоны по услуге \"получение карты\" закончились в {} (очередь {}).",
                location, queue_id
            ),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_baseline_never_transitions() {
        assert_eq!(Transition::classify(None, 0), None);
        assert_eq!(Transition::classify(None, 5), None);
        assert_eq!(Transition::classify(None, -1), None);
    }

    #[test]
    fn test_tickets_appeared() {
        assert_eq!(
            Transition::classify(Some(0), 5),
            Some(Transition::TicketsAppeared { available: 5 })
        );
        assert_eq!(
            Transition::classify(Some(-2), 1),
            Some(Transition::TicketsAppeared { available: 1 })
        );
    }

    #[test]
    fn test_tickets_exhausted() {
        assert_eq!(Transition::classify(Some(5), 0), Some(Transition::TicketsExhausted));
        assert_eq!(Transition::classify(Some(1), -3), Some(Transition::TicketsExhausted));
    }

    #[test]
    fn test_no_zero_crossing_is_silent() {
        assert_eq!(Transition::classify(Some(3), 7), None);
        assert_eq!(Transition::classify(Some(7), 3), None);
        assert_eq!(Transition::classify(Some(0), 0), None);
        assert_eq!(Transition::classify(Some(-1), 0), None);
    }

    #[test]
    fn test_messages_name_location_and_queue() {
        let appeared = Transition::TicketsAppeared { available: 12 }.message("Wroclaw", 24);
        assert!(appeared.contains("Wroclaw"));
        assert!(appeared.contains("очередь 24"));
        assert!(appeared.contains("Доступно: 12"));

        let exhausted = Transition::TicketsExhausted.message("Legnica", 7);
        assert!(exhausted.contains("закончились в Legnica"));
        assert!(exhausted.contains("очередь 7"));
    }
}
