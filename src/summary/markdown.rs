use std::fmt::Write;

use super::{Printer, SummaryDocument, SummaryEntry};
use crate::errors::Result;

/// Renders a summary as a Markdown document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownPrinter;

fn with_notes(line: String, notes: &str) -> String {
    if notes.is_empty() {
        line
    } else {
        format!("{} ({})", line, notes)
    }
}

fn push_notes(out: &mut Vec<String>, notes: &str) {
    if !notes.is_empty() {
        out.push(notes.to_string());
    }
}

fn entry_lines(entry: &SummaryEntry) -> Vec<String> {
    let mut lines = Vec::new();
    match entry {
        SummaryEntry::MashTemp { temperature, notes } => lines.push(with_notes(
            format!("- **Mashing temperature**: {:.2}°C", temperature),
            notes,
        )),
        SummaryEntry::Rast {
            temperature,
            duration,
            notes,
        } => lines.push(with_notes(
            format!("- **Rast**: {:.2}°C for {:.2} minutes", temperature, duration),
            notes,
        )),
        SummaryEntry::LauternNotes { notes } => push_notes(&mut lines, notes),
        SummaryEntry::Hopping {
            name,
            amount,
            alpha,
            duration,
            notes,
        } => lines.push(with_notes(
            format!(
                "- **{}**: {:.2}g ({:.2}% alpha) [{:.2} minutes]",
                name, amount, alpha, duration
            ),
            notes,
        )),
        SummaryEntry::VolumeBeforeBoil { volume, notes } => lines.push(with_notes(
            format!("- **Measured volume - before boil**: {:.2}L", volume),
            notes,
        )),
        SummaryEntry::VolumeAfterBoil { volume, notes } => lines.push(with_notes(
            format!("- **Measured volume - after boil**: {:.2}L", volume),
            notes,
        )),
        SummaryEntry::Cooling {
            temperature,
            time,
            notes,
        } => lines.push(with_notes(
            format!("Reached {:.2}°C in {:.2} minutes", temperature, time),
            notes,
        )),
        SummaryEntry::PreFermentation { volume, sg, notes } => {
            lines.push(format!("- **Volume**: {:.2}L", volume));
            lines.push(format!("- **Specific gravity**: {:.3}", sg));
            push_notes(&mut lines, notes);
        }
        SummaryEntry::YeastStart { temperature, notes } => {
            lines.push(format!("- **Temperature**: {}°C", temperature));
            push_notes(&mut lines, notes);
        }
        SummaryEntry::SgMeasurement {
            date,
            gravity,
            is_final,
            notes,
        } => {
            let mut line = format!("- **{}**: {:.3}", date.format("%Y-%m-%d %H:%M"), gravity);
            if *is_final {
                line.push_str(" (final)");
            }
            lines.push(with_notes(line, notes));
        }
        SummaryEntry::MainFermentationAlcohol { alcohol } => {
            lines.push(format!("- **Main fermentation**: {:.2}%", alcohol))
        }
        SummaryEntry::DryHop { name, amount } => lines.push(format!("- **{}**: {:.2}g", name, amount)),
        SummaryEntry::PreBottlingVolume { volume } => {
            lines.push(format!("- **Volume**: {:.2}L", volume))
        }
        SummaryEntry::Bottling(b) => {
            lines.push(format!("- **Carbonation**: {:.2} g/L", b.carbonation));
            lines.push(format!("- **Alcohol**: {:.2}%vol", b.alcohol));
            lines.push(format!("- **Sugar**: {:.2} g ({})", b.sugar, b.sugar_type));
            lines.push(format!("- **Temperature**: {:.2}°C", b.temperature));
            lines.push(format!("- **Volume Before Sugar**: {:.2}L", b.volume));
            push_notes(&mut lines, &b.notes);
        }
        SummaryEntry::SecondaryFermentation { days, notes } => {
            lines.push(format!("- **Days**: {}", days));
            push_notes(&mut lines, notes);
        }
    }
    lines
}

/// Timeline lines arrive as `timestamp message`; the report shows them as a
/// two-column table.
fn timeline_row(line: &str) -> String {
    match line.split_once(' ') {
        Some((timestamp, event)) => format!("{} | {}", timestamp, event),
        None => format!("{} | ", line),
    }
}

impl Printer for MarkdownPrinter {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn print(&self, document: &SummaryDocument, timeline: &[String]) -> Result<String> {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "# Summary");
        if !document.title.is_empty() {
            let _ = writeln!(out, "\n**{}**", document.title);
        }
        let _ = writeln!(
            out,
            "\nThe following summary was generated on {}\n",
            document.created_at.format("%Y-%m-%d %H:%M:%S")
        );

        let mut section = None;
        for entry in &document.entries {
            if section != Some(entry.section()) {
                if section.is_some() {
                    out.push('\n');
                }
                let _ = writeln!(out, "## {}", entry.section());
                section = Some(entry.section());
            }
            for line in entry_lines(entry) {
                let _ = writeln!(out, "{}", line);
            }
        }
        if section.is_some() {
            out.push('\n');
        }

        let _ = writeln!(out, "## Calculations");
        let _ = writeln!(out, "- **Evaporation**: {:.2}%/h", document.evaporation);
        let _ = writeln!(out, "- **Efficiency**: {:.2}%", document.efficiency);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Timeline");
        let _ = writeln!(out, "Timestamp | Event");
        let _ = writeln!(out, "--- | ---");
        for line in timeline {
            let _ = writeln!(out, "{}", timeline_row(line));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::BottlingInfo;
    use chrono::{TimeZone, Utc};

    fn document(entries: Vec<SummaryEntry>) -> SummaryDocument {
        let mut doc = SummaryDocument::new("1", "Pale Ale");
        doc.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        doc.entries = entries;
        doc
    }

    #[test]
    fn test_header_and_empty_body() {
        let out = MarkdownPrinter.print(&document(vec![]), &[]).unwrap();
        assert!(out.starts_with("# Summary\n\n**Pale Ale**\n"));
        assert!(out.contains("generated on 2024-05-01 09:30:00"));
        assert!(out.contains("## Calculations\n- **Evaporation**: 0.00%/h\n- **Efficiency**: 0.00%\n"));
        assert!(out.ends_with("## Timeline\nTimestamp | Event\n--- | ---\n"));
    }

    #[test]
    fn test_sections_are_headed_once_per_run() {
        let out = MarkdownPrinter
            .print(
                &document(vec![
                    SummaryEntry::MashTemp {
                        temperature: 66.0,
                        notes: "stable".into(),
                    },
                    SummaryEntry::Rast {
                        temperature: 63.0,
                        duration: 45.0,
                        notes: String::new(),
                    },
                    SummaryEntry::Hopping {
                        name: "Magnum".into(),
                        amount: 20.0,
                        alpha: 13.5,
                        duration: 60.0,
                        notes: String::new(),
                    },
                    SummaryEntry::VolumeAfterBoil {
                        volume: 21.5,
                        notes: String::new(),
                    },
                ]),
                &[],
            )
            .unwrap();
        assert_eq!(out.matches("## Mash").count(), 1);
        assert_eq!(out.matches("## Hopping").count(), 1);
        assert!(out.contains("- **Mashing temperature**: 66.00°C (stable)\n"));
        assert!(out.contains("- **Rast**: 63.00°C for 45.00 minutes\n"));
        assert!(out.contains("- **Magnum**: 20.00g (13.50% alpha) [60.00 minutes]\n"));
        assert!(out.contains("- **Measured volume - after boil**: 21.50L\n"));
    }

    #[test]
    fn test_measurements_and_bottling() {
        let out = MarkdownPrinter
            .print(
                &document(vec![
                    SummaryEntry::SgMeasurement {
                        date: Utc.with_ymd_and_hms(2024, 5, 4, 18, 0, 0).unwrap(),
                        gravity: 1.012,
                        is_final: true,
                        notes: "clear".into(),
                    },
                    SummaryEntry::Bottling(BottlingInfo {
                        carbonation: 5.0,
                        alcohol: 5.3,
                        sugar: 120.0,
                        sugar_type: "glucose".into(),
                        temperature: 20.0,
                        volume: 19.0,
                        notes: String::new(),
                    }),
                ]),
                &[],
            )
            .unwrap();
        assert!(out.contains("## SG measurement\n- **2024-05-04 18:00**: 1.012 (final) (clear)\n"));
        assert!(out.contains("- **Sugar**: 120.00 g (glucose)\n"));
        assert!(out.contains("- **Alcohol**: 5.30%vol\n"));
    }

    #[test]
    fn test_timeline_rendered_as_table_rows() {
        let out = MarkdownPrinter
            .print(
                &document(vec![]),
                &["2024-05-01T10:00:00.000000000Z Mash started".to_string()],
            )
            .unwrap();
        assert!(out.contains("--- | ---\n2024-05-01T10:00:00.000000000Z | Mash started\n"));
    }
}
