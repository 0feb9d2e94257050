// Keyhook Decisions
// Three-valued hook verdicts and their merge

use indexmap::IndexMap;
use std::fmt;

use crate::event::KeyEvent;

/// What a hook wants done with an event.
///
/// Ordered `Allow < Suspend < Suppress`; several opinions on one event merge
/// to their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(i32)]
pub enum Decision {
    /// Let the event through
    #[default]
    Allow = 0,
    /// Hold the event until more input decides it
    Suspend = 1,
    /// Drop the event
    Suppress = 2,
}

impl Decision {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Decision::Allow),
            1 => Some(Decision::Suspend),
            2 => Some(Decision::Suppress),
            _ => None,
        }
    }

    pub fn to_i32(self) -> i32 {
        self as i32
    }

    pub fn is_allow(self) -> bool {
        self == Decision::Allow
    }

    /// Suppress when `block` is set, Allow otherwise
    pub fn block_if(block: bool) -> Self {
        if block {
            Decision::Suppress
        } else {
            Decision::Allow
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Suspend => write!(f, "suspend"),
            Decision::Suppress => write!(f, "suppress"),
        }
    }
}

/// Per-event decisions produced by one hook invocation.
///
/// Events absent from the map are implicitly allowed.
pub type Decisions = IndexMap<KeyEvent, Decision>;

/// Merge several decisions for the same event (Allow when empty)
pub fn merge<I: IntoIterator<Item = Decision>>(decisions: I) -> Decision {
    decisions.into_iter().max().unwrap_or_default()
}

/// Merged decision for `event` across the outputs of every hook
pub fn merge_for(outputs: &[Decisions], event: &KeyEvent) -> Decision {
    merge(
        outputs
            .iter()
            .map(|d| d.get(event).copied().unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ScanCode;
    use Decision::*;

    #[test]
    fn test_ordering() {
        assert!(Allow < Suspend);
        assert!(Suspend < Suppress);
        assert_eq!(Decision::from_i32(2), Some(Suppress));
        assert_eq!(Decision::from_i32(3), None);
        assert_eq!(Suspend.to_i32(), 1);
    }

    #[test]
    fn test_merge() {
        assert_eq!(merge([]), Allow);
        assert_eq!(merge([Allow, Suspend, Allow]), Suspend);
        assert_eq!(merge([Suspend, Suppress, Allow]), Suppress);
        // Order independent
        assert_eq!(merge([Suppress, Suspend]), merge([Suspend, Suppress]));
    }

    #[test]
    fn test_merge_for_missing_entries() {
        let event = KeyEvent::down(ScanCode(30), 0.0);
        let other = KeyEvent::up(ScanCode(30), 0.1);

        let mut first = Decisions::new();
        first.insert(event.clone(), Suspend);
        let mut second = Decisions::new();
        second.insert(other.clone(), Suppress);

        let outputs = vec![first, second];
        assert_eq!(merge_for(&outputs, &event), Suspend);
        assert_eq!(merge_for(&outputs, &other), Suppress);
        assert_eq!(merge_for(&[], &event), Allow);
    }
}
