use std::fmt;

/// Lifecycle of a [`Manager`](crate::manager::Manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unregistered,
    Registering,
    Supervising,
    Unregistering,
    Terminated,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ManagerState::Unregistered => "unregistered",
            ManagerState::Registering => "registering",
            ManagerState::Supervising => "supervising",
            ManagerState::Unregistering => "unregistering",
            ManagerState::Terminated => "terminated",
        })
    }
}
