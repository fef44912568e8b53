use tracing::instrument;

use super::{Achievement, Snapshot};

/// Collects every star earned strictly after `checkpoint`.
///
/// Ordered by `(earned_at, member_id, day, part)` so that identical input always produces an
/// identical list. Members without stars are skipped even if they carry completion data.
#[instrument(skip(snapshot), fields(members = snapshot.members.len()))]
pub fn diff(snapshot: &Snapshot, checkpoint: i64) -> Vec<Achievement> {
    let mut found: Vec<Achievement> = snapshot
        .active_members()
        .flat_map(|(member_id, member)| {
            member
                .completion_day_level
                .iter()
                .flat_map(move |(day, completion)| {
                    completion
                        .timestamps()
                        .filter(move |(_, earned_at)| *earned_at > checkpoint)
                        .map(move |(part, earned_at)| Achievement {
                            member_id: member_id.clone(),
                            name: member.display_name().to_string(),
                            day: *day,
                            part,
                            earned_at,
                        })
                })
        })
        .collect();

    found.sort_by(|a, b| {
        a.earned_at
            .cmp(&b.earned_at)
            .then_with(|| a.member_id.cmp(&b.member_id))
            .then(a.day.cmp(&b.day))
            .then(a.part.cmp(&b.part))
    });

    tracing::debug!(found = found.len(), checkpoint, "diffed snapshot against checkpoint");
    found
}
