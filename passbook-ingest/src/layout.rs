//! Rebuild text lines from positioned fragments.

use crate::types::{ExtractionTolerance, TextFragment};

/// Group fragments into lines, top to bottom, left to right.
///
/// Fragments whose baselines differ by at most `tolerance.y` from the previous
/// fragment of the line share it. Inside a line a single space is inserted where
/// the gap between two fragments exceeds `tolerance.x`.
pub fn assemble_lines(mut fragments: Vec<TextFragment>, tolerance: ExtractionTolerance) -> Vec<String> {
    fragments.retain(|f| !f.text.is_empty());
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<TextFragment>> = Vec::new();
    for frag in fragments {
        let same_line = rows
            .last()
            .and_then(|row| row.last())
            .is_some_and(|prev| (prev.y - frag.y).abs() <= tolerance.y);
        match rows.last_mut() {
            Some(row) if same_line => row.push(frag),
            _ => rows.push(vec![frag]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            join_row(&row, tolerance.x)
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn join_row(row: &[TextFragment], x_tolerance: f32) -> String {
    let mut line = String::new();
    let mut right_edge: Option<f32> = None;

    for frag in row {
        if let Some(edge) = right_edge {
            let gap = frag.x - edge;
            if gap > x_tolerance && !line.ends_with(' ') && !frag.text.starts_with(' ') {
                line.push(' ');
            }
        }
        line.push_str(&frag.text);
        right_edge = Some(right_edge.map_or(frag.right(), |edge| edge.max(frag.right())));
    }

    line.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(x: f32, y: f32, text: &str) -> TextFragment {
        // 6pt per glyph
        TextFragment::new(x, y, text.len() as f32 * 6.0, text)
    }

    #[test]
    fn test_orders_lines_top_to_bottom() {
        let lines = assemble_lines(
            vec![frag(10.0, 500.0, "second"), frag(10.0, 700.0, "first")],
            ExtractionTolerance::REFERENCE,
        );
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_gap_above_x_tolerance_inserts_space() {
        // "01-04-2024" ends at 70.0
        let lines = assemble_lines(
            vec![frag(80.0, 700.0, "Salary"), frag(10.0, 700.0, "01-04-2024")],
            ExtractionTolerance::REFERENCE,
        );
        assert_eq!(lines, vec!["01-04-2024 Salary"]);
    }

    #[test]
    fn test_gap_within_x_tolerance_joins() {
        let lines = assemble_lines(
            vec![frag(10.0, 700.0, "500"), frag(29.5, 700.0, ".00")],
            ExtractionTolerance::REFERENCE,
        );
        assert_eq!(lines, vec!["500.00"]);
    }

    #[test]
    fn test_zero_y_tolerance_splits_offset_baselines() {
        let frags = vec![frag(10.0, 700.0, "a"), frag(40.0, 699.5, "b")];
        assert_eq!(
            assemble_lines(frags.clone(), ExtractionTolerance::REFERENCE),
            vec!["a", "b"]
        );
        let loose = ExtractionTolerance { x: 2.0, y: 1.0 };
        assert_eq!(assemble_lines(frags, loose), vec!["a b"]);
    }

    #[test]
    fn test_drops_blank_lines() {
        let lines = assemble_lines(
            vec![frag(10.0, 700.0, "   "), frag(10.0, 600.0, "x")],
            ExtractionTolerance::REFERENCE,
        );
        assert_eq!(lines, vec!["x"]);
    }
}
