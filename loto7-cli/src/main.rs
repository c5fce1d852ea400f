mod config;
mod display;
mod import;
mod server;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{AppConfig, DEFAULT_BIND};
use crate::display::{
    display_draws, display_evaluated_draws, display_evaluation, display_import_summary,
    display_insights, display_prediction, display_stats,
};
use loto7_db::db::{
    StoreError, add_draw, count_draws, db_path, fetch_last_draws, latest_draw, load_draws_or_empty,
    migrate, open_db, open_db_or_memory,
};
use loto7_db::models::{BONUS_COUNT, Draw, MAIN_COUNT, Pool, validate_draw, validate_main};
use loto7_db::rusqlite::Connection;
use loto7_engine::analyzer::most_common;
use loto7_engine::predict::{
    PredictionRequest, analyze_history, evaluate_combination, evaluate_history, generate_predictions,
    next_draw_date, next_draw_number,
};
use loto7_engine::sampler::make_rng;

#[derive(Parser)]
#[command(name = "loto7", about = "Générateur de grilles Loto7 filtrées et notées")]
struct Cli {
    /// Base SQLite des tirages
    #[arg(long, global = true, env = "LOTO7_DB")]
    db: Option<PathBuf>,

    /// Fichier de configuration TOML
    #[arg(long, global = true, env = "LOTO7_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier JSON {"draws": [...]}
    Import {
        file: PathBuf,

        /// Remplacer tout l'historique au lieu de fusionner
        #[arg(long)]
        replace: bool,
    },

    /// Exporter l'historique au format JSON
    Export { file: PathBuf },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,

        /// Évaluer chaque tirage contre le précédent
        #[arg(short, long)]
        evaluation: bool,
    },

    /// Numéros les plus sortis (principaux et bonus)
    Stats {
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Numéros chauds, froids, en retard et motifs récents
    Insights,

    /// Générer des grilles pour le prochain tirage
    Predict {
        /// Nombre de grilles (1-100)
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Numéro du tirage visé (défaut : dernier tirage + 1)
        #[arg(long)]
        next_draw: Option<u32>,

        /// Ne pas noter ni classer les grilles
        #[arg(long)]
        no_scoring: bool,

        /// Afficher les motifs récents
        #[arg(long)]
        patterns: bool,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,

        /// Budget d'essais du générateur
        #[arg(long)]
        max_attempts: Option<u64>,
    },

    /// Évaluer une combinaison de 7 numéros contre le dernier tirage
    Evaluate {
        #[arg(num_args = MAIN_COUNT, required = true)]
        numbers: Vec<u8>,
    },

    /// Ajouter un tirage manuellement
    Add,

    /// Lancer l'API JSON
    Serve {
        #[arg(long, env = "LOTO7_BIND")]
        bind: Option<String>,
    },
}

fn init_tracing() {
    // LOG_FORMAT=json pour une sortie structurée, lisible sur stderr sinon
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

/// Les commandes d'écriture exigent une base saine ; les lectures se contentent
/// d'un historique vide si le fichier est illisible.
fn open_store(path: &Path, writes: bool) -> Result<Connection> {
    if writes {
        let conn = open_db(path)?;
        migrate(&conn)?;
        Ok(conn)
    } else {
        open_db_or_memory(path)
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    let path = cli
        .db
        .clone()
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(db_path);
    if matches!(cli.command, Command::DbPath) {
        println!("{}", path.display());
        return Ok(());
    }
    let writes = matches!(cli.command, Command::Import { .. } | Command::Add);
    let conn = open_store(&path, writes)?;

    match cli.command {
        Command::Import { file, replace } => cmd_import(&conn, &file, replace),
        Command::Export { file } => cmd_export(&conn, &file),
        Command::DbPath => Ok(()),
        Command::List { last, evaluation } => cmd_list(&conn, &config, last, evaluation),
        Command::Stats { top } => cmd_stats(&conn, top),
        Command::Insights => cmd_insights(&conn, &config),
        Command::Predict {
            count,
            next_draw,
            no_scoring,
            patterns,
            seed,
            max_attempts,
        } => {
            let request = PredictionRequest {
                count,
                next_draw_number: 0,
                filter_config: config.filters.clone(),
                include_scoring: !no_scoring,
                include_patterns: patterns,
                max_attempts: max_attempts.unwrap_or(config.max_attempts),
                recent_window: config.recent_window,
            };
            cmd_predict(&conn, request, next_draw, seed)
        }
        Command::Evaluate { numbers } => cmd_evaluate(&conn, &config, &numbers),
        Command::Add => cmd_add(&conn),
        Command::Serve { bind } => {
            let bind = bind
                .or_else(|| config.bind.clone())
                .unwrap_or_else(|| DEFAULT_BIND.to_string());
            let state = server::AppState::new(conn, config);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::run(&bind, state))
        }
    }
}

fn cmd_import(conn: &Connection, file: &Path, replace: bool) -> Result<()> {
    let result = import::import_json(conn, file, replace)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_export(conn: &Connection, file: &Path) -> Result<()> {
    let n = import::export_json(conn, file)?;
    println!("{} tirage(s) exporté(s) vers {}", n, file.display());
    Ok(())
}

fn ensure_not_empty(conn: &Connection) -> Result<bool> {
    if count_draws(conn)? == 0 {
        println!("Base vide. Lancez d'abord : loto7 import <fichier.json>");
        return Ok(false);
    }
    Ok(true)
}

fn cmd_list(conn: &Connection, config: &AppConfig, last: u32, evaluation: bool) -> Result<()> {
    if !ensure_not_empty(conn)? {
        return Ok(());
    }
    if evaluation {
        // Le tirage le plus ancien affiché a besoin de son prédécesseur.
        let window = fetch_last_draws(conn, last.saturating_add(1))?;
        let mut evaluated = evaluate_history(&window, &config.filters);
        evaluated.truncate(last as usize);
        display_evaluated_draws(&evaluated);
    } else {
        display_draws(&fetch_last_draws(conn, last)?);
    }
    Ok(())
}

fn cmd_stats(conn: &Connection, top: usize) -> Result<()> {
    if !ensure_not_empty(conn)? {
        return Ok(());
    }
    let draws = load_draws_or_empty(conn);
    display_stats(
        draws.len(),
        &most_common(&draws, Pool::Main, top),
        &most_common(&draws, Pool::Bonus, top),
        draws.first(),
    );
    Ok(())
}

fn cmd_insights(conn: &Connection, config: &AppConfig) -> Result<()> {
    if !ensure_not_empty(conn)? {
        return Ok(());
    }
    let draws = load_draws_or_empty(conn);
    let analysis = analyze_history(&draws, config.recent_window);
    display_insights(&analysis.insights, analysis.total_draws);
    Ok(())
}

fn cmd_predict(
    conn: &Connection,
    mut request: PredictionRequest,
    next_draw: Option<u32>,
    seed: Option<u64>,
) -> Result<()> {
    let history = load_draws_or_empty(conn);
    if history.is_empty() {
        tracing::warn!("historique vide : pas de filtre de report ni de score de fréquence");
    }
    request.next_draw_number = next_draw.unwrap_or_else(|| next_draw_number(&history));

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Génération de {} grille(s)...", request.count));
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut rng = make_rng(seed);
    let result = generate_predictions(&request, &history, history.first(), &next_draw_date(), &mut rng);
    pb.finish_and_clear();

    let prediction = result.context("Génération impossible")?;
    if prediction.draws.is_empty() {
        bail!(
            "Aucune grille trouvée en {} essais : les filtres sont trop stricts",
            prediction.attempts
        );
    }
    display_prediction(&prediction);
    if let Some(insights) = &prediction.insights {
        display_insights(insights, history.len());
    }
    Ok(())
}

fn cmd_evaluate(conn: &Connection, config: &AppConfig, numbers: &[u8]) -> Result<()> {
    let previous = latest_draw(conn)?;
    match &previous {
        Some(draw) => println!("Tirage de référence : {} ({})", draw.id, draw.date),
        None => println!("Aucun tirage de référence : le filtre de report passe d'office."),
    }
    let evaluation = evaluate_combination(numbers, previous.as_ref(), &config.filters)
        .context("Combinaison invalide")?;
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    display_evaluation(&sorted, &evaluation);
    Ok(())
}

fn cmd_add(conn: &Connection) -> Result<()> {
    println!("Ajout d'un tirage manuellement\n");

    let suggested = format!("第{}回", next_draw_number(&load_draws_or_empty(conn)));
    let id = prompt(&format!("Identifiant du tirage [{suggested}] : "))?;
    let id = if id.is_empty() { suggested } else { id };

    let raw_date = prompt("Date (AAAA-MM-JJ) : ")?;
    let date = chrono::NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .with_context(|| format!("Format de date invalide : '{}'", raw_date))?
        .format("%Y-%m-%d")
        .to_string();

    let main = prompt_main()?;
    let bonus = prompt_bonus(&main)?;

    let draw = Draw::new(id, date, main, bonus);

    println!("\nTirage à insérer :");
    display_draws(std::slice::from_ref(&draw));

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() != "o" {
        println!("Insertion annulée.");
        return Ok(());
    }
    match add_draw(conn, &draw) {
        Ok(()) => println!("Tirage inséré avec succès."),
        Err(StoreError::DuplicateId(id)) => println!("Le tirage {id} existe déjà (doublon ignoré)."),
        Err(e) => return Err(e).context("Insertion impossible"),
    }
    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn parse_numbers(input: &str) -> Option<Vec<u8>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>().ok())
        .collect()
}

fn prompt_main() -> Result<Vec<u8>> {
    loop {
        let input = prompt("7 numéros principaux (séparés par des espaces, 1-37) : ")?;
        match parse_numbers(&input) {
            Some(mut v) if v.len() == MAIN_COUNT => {
                v.sort_unstable();
                match validate_main(&v) {
                    Ok(()) => return Ok(v),
                    Err(e) => println!("Numéros invalides ({e}). Réessayez."),
                }
            }
            _ => println!("Entrez exactement {MAIN_COUNT} numéros. Réessayez."),
        }
    }
}

fn prompt_bonus(main: &[u8]) -> Result<Vec<u8>> {
    loop {
        let input = prompt("2 numéros bonus (séparés par un espace, 1-37, hors principaux) : ")?;
        match parse_numbers(&input) {
            Some(mut v) if v.len() == BONUS_COUNT => {
                v.sort_unstable();
                match validate_draw(main, &v) {
                    Ok(()) => return Ok(v),
                    Err(e) => println!("Bonus invalides ({e}). Réessayez."),
                }
            }
            _ => println!("Entrez exactement {BONUS_COUNT} numéros. Réessayez."),
        }
    }
}
