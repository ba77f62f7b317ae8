use crate::executor::input::ClickKind;
use crate::library::types::CommandKind;
use crate::perception::types::TextFragment;

fn normalise(text: &str) -> String {
    text.to_lowercase().replace(['[', ']'], "").trim().to_string()
}

/// Finds the fragment matching `target`. Exact (normalised) text wins
/// outright; otherwise the most similar fragment above `floor`.
pub fn find_target(target: &str, fragments: &[TextFragment], floor: f32) -> Option<(i32, i32)> {
    let target = normalise(target);
    if target.is_empty() {
        return None;
    }

    let mut best: Option<(f32, (i32, i32))> = None;
    for fragment in fragments {
        let text = normalise(&fragment.text);
        if text == target {
            return Some((fragment.x, fragment.y));
        }
        let ratio = similar::TextDiff::from_chars(target.as_str(), text.as_str()).ratio();
        if ratio > floor && best.map_or(true, |(r, _)| ratio > r) {
            best = Some((ratio, (fragment.x, fragment.y)));
        }
    }

    if let Some((ratio, (x, y))) = best {
        tracing::debug!(target = %target, ratio, x, y, "fuzzy on-screen match");
    }
    best.map(|(_, point)| point)
}

/// Click flavour implied by a command name.
pub fn click_kind_for(name: &str) -> ClickKind {
    let name = name.to_lowercase();
    if name.contains("right") {
        ClickKind::Right
    } else if name.contains("double") {
        ClickKind::Double
    } else {
        ClickKind::Left
    }
}

pub fn click_script(kind: ClickKind, (x, y): (i32, i32)) -> CommandKind {
    CommandKind::Script {
        code: format!("{} {x} {y}", kind.verb()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Vec<TextFragment> {
        vec![
            TextFragment::new("Cancel", 300, 300),
            TextFragment::new("Submit", 500, 300),
            TextFragment::new("Submitted orders", 700, 100),
        ]
    }

    #[test]
    fn exact_match_wins() {
        assert_eq!(find_target("Submit", &screen(), 0.8), Some((500, 300)));
        assert_eq!(find_target("[submit]", &screen(), 0.8), Some((500, 300)));
    }

    #[test]
    fn fuzzy_match_above_floor() {
        assert_eq!(find_target("Cancle", &screen(), 0.8), Some((300, 300)));
        assert_eq!(find_target("Delete", &screen(), 0.8), None);
        assert_eq!(find_target("  ", &screen(), 0.8), None);
    }

    #[test]
    fn click_kind_follows_name() {
        assert_eq!(click_kind_for("right click text"), ClickKind::Right);
        assert_eq!(click_kind_for("double click text"), ClickKind::Double);
        assert_eq!(click_kind_for("click text"), ClickKind::Left);
        assert_eq!(
            click_script(ClickKind::Double, (4, 5)),
            CommandKind::Script { code: "double_click 4 5".into() }
        );
    }
}
