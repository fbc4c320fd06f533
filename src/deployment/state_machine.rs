use crate::db::models::DeploymentStatus;

/// Valid transitions for the Deployment state machine (spec.md §4.1):
///
/// ```text
/// pending → in_progress → completed
///                       ↘ failed
///                       ↘ rolling_back → rolled_back
///                                      ↘ failed
/// ```
pub fn validate_transition(from: DeploymentStatus, to: DeploymentStatus) -> anyhow::Result<()> {
    use DeploymentStatus::*;

    let allowed = matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Failed)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (Completed, RollingBack)
            | (Failed, RollingBack)
            | (RollingBack, RolledBack)
            | (RollingBack, Failed)
    );

    if allowed {
        Ok(())
    } else {
        anyhow::bail!("invalid deployment transition: {from} -> {to}")
    }
}

pub fn is_terminal(status: DeploymentStatus) -> bool {
    matches!(
        status,
        DeploymentStatus::Completed | DeploymentStatus::Failed | DeploymentStatus::RolledBack
    )
}

pub fn is_cancellable(status: DeploymentStatus) -> bool {
    matches!(status, DeploymentStatus::Pending | DeploymentStatus::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_advances_to_in_progress() {
        assert!(validate_transition(DeploymentStatus::Pending, DeploymentStatus::InProgress).is_ok());
    }

    #[test]
    fn completed_cannot_go_back_to_in_progress() {
        assert!(validate_transition(DeploymentStatus::Completed, DeploymentStatus::InProgress).is_err());
    }

    #[test]
    fn rolling_back_may_end_in_either_terminal_state() {
        assert!(validate_transition(DeploymentStatus::RollingBack, DeploymentStatus::RolledBack).is_ok());
        assert!(validate_transition(DeploymentStatus::RollingBack, DeploymentStatus::Failed).is_ok());
    }

    #[test]
    fn terminal_states_reject_further_transitions_except_rollback() {
        assert!(!is_terminal(DeploymentStatus::Pending));
        assert!(is_terminal(DeploymentStatus::RolledBack));
        assert!(validate_transition(DeploymentStatus::RolledBack, DeploymentStatus::RollingBack).is_err());
    }

    #[test]
    fn only_pending_and_in_progress_are_cancellable() {
        assert!(is_cancellable(DeploymentStatus::Pending));
        assert!(is_cancellable(DeploymentStatus::InProgress));
        assert!(!is_cancellable(DeploymentStatus::RollingBack));
    }
}
