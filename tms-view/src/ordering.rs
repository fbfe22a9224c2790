//! List ordering.

use std::cmp::Reverse;
use tms_core::{Application, ApplicationStatus, Reconcilable};

/// Display group of an application status. Pending items lead the list.
fn status_group(status: ApplicationStatus) -> u8 {
    match status {
        ApplicationStatus::Pending => 0,
        ApplicationStatus::Accepted => 1,
        ApplicationStatus::Rejected => 2,
        ApplicationStatus::Withdrawn => 3,
    }
}

/// Pending applications first, then accepted, rejected and withdrawn;
/// newest first within each group. Ties keep their input order.
pub fn order_applications<'a, I>(applications: I) -> Vec<&'a Application>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut ordered: Vec<&Application> = applications.into_iter().collect();
    ordered.sort_by_key(|app| (status_group(app.status), Reverse(app.created_at)));
    ordered
}

/// Newest first by creation time.
pub fn newest_first<'a, T, I>(records: I) -> Vec<&'a T>
where
    T: Reconcilable,
    I: IntoIterator<Item = &'a T>,
{
    let mut ordered: Vec<&T> = records.into_iter().collect();
    ordered.sort_by_key(|record| Reverse(record.created_at()));
    ordered
}
