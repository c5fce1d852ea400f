use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

use crate::import::ImportResult;
use loto7_db::models::Draw;
use loto7_engine::analyzer::{Insights, NumberCount, NumberScore, Pattern, PatternValue};
use loto7_engine::filters::{Evaluation, Filter, ZoneCount};
use loto7_engine::predict::Prediction;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn verdict(pass: bool) -> Cell {
    if pass {
        Cell::new("OK").fg(Color::Green)
    } else {
        Cell::new("KO").fg(Color::Red)
    }
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Tirage", "Date", "Numéros", "Bonus"]);
    for draw in draws {
        table.add_row(vec![
            &draw.id,
            &draw.date,
            &join_numbers(&draw.main),
            &join_numbers(&draw.bonus),
        ]);
    }
    println!("{table}");
}

/// Tirages historiques avec le résultat de leur évaluation (somme, report, verdict).
pub fn display_evaluated_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Tirage", "Date", "Numéros", "Somme", "Report", "Filtres"]);
    for draw in draws {
        let eval = draw.evaluation.as_ref();
        let field = |path: &[&str]| {
            eval.and_then(|root| path.iter().try_fold(root, |v, key| v.get(*key)))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "—".to_string())
        };
        let pass = eval
            .and_then(|v| v.get("overall_pass"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        table.add_row(vec![
            Cell::new(&draw.id),
            Cell::new(&draw.date),
            Cell::new(join_numbers(&draw.main)),
            Cell::new(field(&["sum", "total"])),
            Cell::new(field(&["pull", "count"])),
            verdict(pass),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Tirages lus       : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    if result.replaced {
        println!("  (historique remplacé)");
    } else {
        println!("  Doublons ignorés  : {}", result.skipped);
    }
}

fn display_counts(title: &str, counts: &[NumberCount]) {
    println!("\n── {title} ──");
    let mut table = new_table(vec!["Numéro", "Sorties"]);
    for c in counts {
        table.add_row(vec![format!("{:2}", c.number), c.count.to_string()]);
    }
    println!("{table}");
}

pub fn display_stats(total: usize, main: &[NumberCount], bonus: &[NumberCount], latest: Option<&Draw>) {
    println!("\n📊 Statistiques sur {} tirages\n", total);
    if let Some(draw) = latest {
        println!("Dernier tirage : {} ({})", draw.id, draw.date);
    }
    display_counts("Numéros principaux (1-37)", main);
    display_counts("Numéros bonus (1-37)", bonus);
}

fn display_scores(title: &str, scores: &[NumberScore]) {
    println!("\n── {title} ──");
    let mut table = new_table(vec!["Numéro", "Score"]);
    for s in scores {
        table.add_row(vec![format!("{:2}", s.number), format!("{:.1}", s.score)]);
    }
    println!("{table}");
}

pub fn display_patterns(patterns: &[Pattern]) {
    if patterns.is_empty() {
        println!("\nPas assez de tirages pour dégager des motifs.");
        return;
    }
    println!("\n── Motifs récents ──");
    let mut table = new_table(vec!["Motif", "Description", "Valeur"]);
    for p in patterns {
        let value = match &p.value {
            PatternValue::Average(v) => format!("{v:.2}"),
            PatternValue::Zones(z) => format!("{:.1}% / {:.1}% / {:.1}%", z.low, z.mid, z.high),
        };
        let kind = serde_json::to_value(p.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        table.add_row(vec![kind, p.description.clone(), value]);
    }
    println!("{table}");
}

pub fn display_insights(insights: &Insights, total: usize) {
    println!("\n🔎 Analyse de {} tirages", total);
    display_scores("Numéros chauds", &insights.hot_numbers);
    display_scores("Numéros froids", &insights.cold_numbers);
    display_scores("Numéros en retard", &insights.overdue_numbers);
    display_patterns(&insights.patterns);
}

pub fn display_prediction(prediction: &Prediction) {
    println!("\n🎲 Prédictions pour le tirage n°{}\n", prediction.next_draw_number);

    let mut table = new_table(vec!["Grille", "Numéros", "Bonus", "Score"]);
    for draw in &prediction.draws {
        let score = draw
            .evaluation
            .as_ref()
            .and_then(|e| e.get("scoring"))
            .and_then(|s| s.get("final_score"))
            .and_then(|s| s.as_f64())
            .map_or_else(|| "—".to_string(), |s| format!("{s:.2}"));
        table.add_row(vec![
            &draw.id,
            &join_numbers(&draw.main),
            &join_numbers(&draw.bonus),
            &score,
        ]);
    }
    println!("{table}");

    if prediction.short {
        println!(
            "\n⚠ Seulement {} grille(s) sur {} après {} essais : les filtres sont trop stricts.",
            prediction.draws.len(),
            prediction.requested,
            prediction.attempts
        );
    }
    if let Some(patterns) = &prediction.patterns {
        display_patterns(patterns);
    }
}

pub fn display_evaluation(numbers: &[u8], evaluation: &Evaluation) {
    println!("\nÉvaluation de {}\n", join_numbers(numbers));

    let mut table = new_table(vec!["Filtre", "Détail", "Résultat"]);
    for filter in Filter::ALL {
        let detail = match filter {
            Filter::Continuous if evaluation.continuous.pairs.is_empty() => "aucune paire".to_string(),
            Filter::Continuous => evaluation.continuous.pairs.join(", "),
            Filter::Zone3 => zone_detail(&evaluation.zone3.distribution),
            Filter::Zone4 => zone_detail(&evaluation.zone4.distribution),
            Filter::OddEven => format!("impairs:pairs = {}", evaluation.odd_even.balance),
            Filter::Sum => format!("{} (plage {})", evaluation.sum.total, evaluation.sum.range),
            Filter::LastDigits => format!("max {} par chiffre final", evaluation.last_digits.max_count),
            Filter::Pull => format!("{} repris (plage {})", evaluation.pull.count, evaluation.pull.valid_range),
        };
        table.add_row(vec![Cell::new(filter.name()), Cell::new(detail), verdict(evaluation.passed(filter))]);
    }
    println!("{table}");

    println!(
        "\nVerdict : {}",
        if evaluation.overall_pass { "tous les filtres passent" } else { "rejetée" }
    );
}

fn zone_detail(distribution: &[ZoneCount]) -> String {
    distribution
        .iter()
        .map(|z| format!("{}: {}", z.zone, z.count))
        .collect::<Vec<_>>()
        .join(" | ")
}
