use super::{DayStatus, Member, Snapshot};

pub const BOTH_STARS: char = '★';
pub const ONE_STAR: char = '☆';
pub const NO_STARS: char = '·';

/// Wraps the table so chat clients render it in a monospace font
pub const FENCE: &str = "```";

/// Gap between the name column and the day columns
const NAME_GAP: usize = 2;

/// Heads the name column, which is never narrower than this
const DAY_LABEL: &str = "Day";

impl From<DayStatus> for char {
    fn from(value: DayStatus) -> Self {
        match value {
            DayStatus::Both => BOTH_STARS,
            DayStatus::One => ONE_STAR,
            DayStatus::None => NO_STARS,
        }
    }
}

/// Formats a snapshot as a fixed-width star table.
///
/// Only members with at least one star are listed, ordered by stars, then local score (both
/// descending), then name. Day columns run from 1 to the smaller of `day_limit` and the last day
/// present in the data; the output depends on nothing else.
pub fn render(snapshot: &Snapshot, year: i32, day_limit: u32) -> String {
    let days = snapshot.max_active_day().min(day_limit);

    let mut rows: Vec<(&String, &Member)> = snapshot.active_members().collect();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.stars
            .cmp(&a.stars)
            .then(b.local_score.cmp(&a.local_score))
            .then_with(|| a.display_name().cmp(b.display_name()))
            .then_with(|| a_id.cmp(b_id))
    });

    let width = rows
        .iter()
        .map(|(_, member)| member.display_name().chars().count())
        .max()
        .unwrap_or(0)
        .max(DAY_LABEL.chars().count());

    let (tens, units): (Vec<String>, Vec<String>) = (1..=days)
        .map(|day| {
            let tens = match day {
                0..=9 => String::from(" "),
                _ => (day / 10).to_string(),
            };
            (tens, (day % 10).to_string())
        })
        .unzip();

    let gap = " ".repeat(NAME_GAP);
    let mut lines = vec![
        format!("**🎄 Advent of Code {year} Leaderboard 🎄**"),
        String::new(),
        FENCE.to_string(),
        format!("{:<width$}{gap}{}", DAY_LABEL, tens.join(" ")),
        format!("{:<width$}{gap}{}", "", units.join(" ")),
        "-".repeat(width + NAME_GAP + days as usize * 2),
    ];

    for (_, member) in rows {
        let glyphs = (1..=days)
            .map(|day| char::from(member.day_status(day)).to_string())
            .collect::<Vec<_>>()
            .join(" ");

        lines.push(format!(
            "{:<width$}{gap}{glyphs}{gap}({}⭐ Score: {})",
            member.display_name(),
            member.stars,
            member.local_score
        ));
    }

    lines.push(FENCE.to_string());
    lines.join("\n")
}
