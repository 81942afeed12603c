use crate::foundation::core::ItemId;

/// Which view is active and which triggers are valid.
///
/// `Result` carries the id of its active item, so a result screen without one cannot be
/// constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Landing,
    Restoring,
    Result {
        active: ItemId,
    },
    Dashboard,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Landing => "Landing",
            Self::Restoring => "Restoring",
            Self::Result { .. } => "Result",
            Self::Dashboard => "Dashboard",
        }
    }

    /// Id of the item shown on the result screen.
    pub fn active(&self) -> Option<&ItemId> {
        match self {
            Self::Result { active } => Some(active),
            _ => None,
        }
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self, Self::Restoring)
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Result { active } => write!(f, "Result({active})"),
            other => f.write_str(other.name()),
        }
    }
}
