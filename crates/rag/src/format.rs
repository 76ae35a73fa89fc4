use crate::table::{HospitalRow, PhysicianRow, RetrievedRow, Table};

pub const NO_RESULTS: &str = "No results.";

/// Renders retrieved rows into the context block handed back to the
/// generation step, one paragraph per row in the order given. Rows carry
/// their own citation tag; the gateway guarantees they match `table`.
pub fn format_context(_table: Table, rows: &[RetrievedRow]) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }
    rows.iter()
        .map(render_row)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The user entry appended to the transcript after a retrieval round.
pub fn retrieval_followup(table: Table, rows: &[RetrievedRow]) -> String {
    format!(
        "Retrieved results for {}:\n\n{}",
        table,
        format_context(table, rows)
    )
}

fn render_row(row: &RetrievedRow) -> String {
    match row {
        RetrievedRow::Physician(row) => render_physician(row),
        RetrievedRow::Hospital(row) => render_hospital(row),
    }
}

fn render_physician(row: &PhysicianRow) -> String {
    format!(
        "{} {} ({}, {}, {}): {}",
        Table::Physicians.citation(row.id),
        row.name,
        row.specialty,
        row.city,
        row.state,
        row.profile
    )
}

fn render_hospital(row: &HospitalRow) -> String {
    format!(
        "{} {} ({}, {}): {}",
        Table::Hospitals.citation(row.id),
        row.name,
        row.city,
        row.state,
        row.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> RetrievedRow {
        RetrievedRow::Hospital(HospitalRow {
            id: 7,
            name: "General".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            description: "cardiac center".to_string(),
            similarity: 0.91,
        })
    }

    fn dr_lee() -> RetrievedRow {
        RetrievedRow::Physician(PhysicianRow {
            id: 3,
            name: "Dr. Ana Lee".to_string(),
            specialty: "Electrophysiology".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            profile: "Treats complex arrhythmias.".to_string(),
            similarity: 0.88,
        })
    }

    #[test]
    fn hospital_rows_carry_citation_and_name() {
        let text = format_context(Table::Hospitals, &[general()]);
        assert!(text.contains("[HOSPITALS_ID:7]"));
        assert!(text.contains("General"));
        assert_eq!(text, "[HOSPITALS_ID:7] General (Atlanta, GA): cardiac center");
    }

    #[test]
    fn physician_rows_include_specialty() {
        let text = format_context(Table::Physicians, &[dr_lee()]);
        assert_eq!(
            text,
            "[PHYSICIANS_ID:3] Dr. Ana Lee (Electrophysiology, Atlanta, GA): Treats complex arrhythmias."
        );
    }

    #[test]
    fn empty_rows_render_sentinel() {
        for table in Table::ALL {
            assert_eq!(format_context(table, &[]), "No results.");
        }
    }

    #[test]
    fn rows_are_separated_by_blank_lines_in_order() {
        let mut second = general();
        if let RetrievedRow::Hospital(row) = &mut second {
            row.id = 9;
            row.name = "Mercy".to_string();
        }
        let text = format_context(Table::Hospitals, &[general(), second]);
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].starts_with("[HOSPITALS_ID:7]"));
        assert!(paragraphs[1].starts_with("[HOSPITALS_ID:9] Mercy"));
    }

    #[test]
    fn formatting_is_byte_identical_across_calls() {
        let rows = vec![general()];
        assert_eq!(
            format_context(Table::Hospitals, &rows),
            format_context(Table::Hospitals, &rows)
        );
    }

    #[test]
    fn followup_names_the_queried_table() {
        assert_eq!(
            retrieval_followup(Table::Physicians, &[]),
            "Retrieved results for physicians:\n\nNo results."
        );
    }
}
