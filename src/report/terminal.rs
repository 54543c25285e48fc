use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::features::{normalize, shannon_entropy};
use crate::models::{as_percentage, Assessment, FeatureVector, RiskTier};

/// Render a colored terminal report.
pub fn render(assessments: &[Assessment], verbose: bool) -> Result<()> {
    let high = count_tier(assessments, RiskTier::High);
    let medium = count_tier(assessments, RiskTier::Medium);
    let low = count_tier(assessments, RiskTier::Low);

    println!("\n {} v{}\n", "url-risk".bold(), env!("CARGO_PKG_VERSION"));

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("URLs scored        : {}", assessments.len()));
    println!(
        " │  {:<48} │",
        format!("{}  Safe            : {:>4}", "✓".green(), low)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Suspicious      : {:>4}", "⚠".yellow(), medium)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Fake/Phishing   : {:>4}", "✗".red(), high)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    println!("{}", score_table(assessments));

    if verbose {
        for a in assessments {
            println!("\n {} {}\n", "[FEATURES]".cyan().bold(), a.url);
            println!("{}", feature_table(&a.url, &a.features));
        }
    }

    Ok(())
}

fn count_tier(assessments: &[Assessment], tier: RiskTier) -> usize {
    assessments.iter().filter(|a| a.fusion.tier == tier).count()
}

fn tier_color(tier: RiskTier) -> Color {
    match tier {
        RiskTier::Low => Color::Green,
        RiskTier::Medium => Color::Yellow,
        RiskTier::High => Color::Red,
    }
}

fn score_table(assessments: &[Assessment]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("URL").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Risk").add_attribute(Attribute::Bold),
            Cell::new("Confidence %").add_attribute(Attribute::Bold),
            Cell::new("ML %").add_attribute(Attribute::Bold),
            Cell::new("AI %").add_attribute(Attribute::Bold),
        ]);

    for a in assessments {
        let color = tier_color(a.fusion.tier);
        table.add_row(vec![
            Cell::new(&a.url),
            Cell::new(a.fusion.status().to_string()).fg(color),
            Cell::new(a.fusion.tier.to_string())
                .fg(color)
                .set_alignment(CellAlignment::Center),
            Cell::new(format!("{:.2}", as_percentage(a.fusion.score)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", as_percentage(a.structural_score)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", as_percentage(a.text_score)))
                .set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

fn feature_table(url: &str, features: &FeatureVector) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Feature").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

    for (name, value) in FeatureVector::NAMES.iter().zip(features.to_array()) {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }

    // Not a model input; shown for triage only.
    table.add_row(vec![
        Cell::new("entropy").fg(Color::DarkGrey),
        Cell::new(format!("{:.3}", shannon_entropy(&normalize(url))))
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
    ]);

    table
}
