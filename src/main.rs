//! `cocktail-import`: import one cocktail by name.
//!
//! Usage: `cocktail-import [--image] <cocktail name>` or
//! `cocktail-import --delete <id>`.
//! Unmatched ingredients are added to the catalog under their suggested name
//! and category.

use std::env;

use anyhow::{bail, Context, Result};
use fluent_bundle::{FluentArgs, FluentValue};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cocktail_catalog::db::init_database_schema;
use cocktail_catalog::import_pipeline::ImportDraft;
use cocktail_catalog::ingredient_resolution::IngredientResolution;
use cocktail_catalog::storage::remove_image_by_url;
use cocktail_catalog::{
    AppConfig, CocktailImporter, ImportError, LocalizationManager, PgStore, RetryingAiClient,
    SupabaseStorage,
};

enum Command {
    Import { name: String, with_image: bool },
    Delete { id: String },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [flag, id] if flag == "--delete" => Ok(Command::Delete { id: id.clone() }),
        [flag, rest @ ..] if flag == "--image" && !rest.is_empty() => Ok(Command::Import {
            name: rest.join(" "),
            with_image: true,
        }),
        [first, ..] if !first.starts_with("--") => Ok(Command::Import {
            name: args.join(" "),
            with_image: false,
        }),
        _ => bail!("usage: cocktail-import [--image] <cocktail name> | --delete <id>"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = AppConfig::from_env()?;
    let localization = LocalizationManager::new(&config.language)?;

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    init_database_schema(&pool).await?;

    let store = PgStore::new(pool);
    let ai =
        RetryingAiClient::from_config(config.ai.clone()).context("Failed to build AI client")?;
    let storage =
        SupabaseStorage::new(&config.storage).context("Failed to build storage client")?;
    let importer = CocktailImporter::new(store.clone(), store, ai, config.import.clone())
        .with_storage_config(config.storage.clone());

    let outcome = match command {
        Command::Import { name, with_image } => {
            run_import(&importer, &storage, &localization, &name, with_image).await
        }
        Command::Delete { id } => match importer.delete_cocktail(&id, &storage).await {
            Ok(Some(deleted)) => {
                info!(id = %deleted.id, slug = %deleted.slug, "Deleted cocktail");
                Ok(())
            }
            Ok(None) => {
                warn!(%id, "No cocktail with this id");
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = outcome {
        error!(kind = ?e.kind(), error = %e, "Import failed");
        eprintln!("{}", e.user_message(&localization));
        std::process::exit(1);
    }

    Ok(())
}

async fn run_import(
    importer: &CocktailImporter<PgStore, PgStore, cocktail_catalog::HttpTransport>,
    storage: &SupabaseStorage,
    localization: &LocalizationManager,
    name: &str,
    with_image: bool,
) -> Result<(), ImportError> {
    println!("{}", localization.get_message_with_args("import-started", &[("name", name)]));

    let draft = importer.fetch_draft(name).await?;
    let matches = match &draft {
        ImportDraft::Ready { matches, .. } => matches.clone(),
        ImportDraft::UnknownCocktail { name } => {
            return Err(ImportError::UnknownCocktail { name: name.clone() })
        }
    };

    let mut args = FluentArgs::new();
    args.set("matched", FluentValue::from(matches.matched.len()));
    args.set("total", FluentValue::from(matches.total()));
    println!("{}", localization.get_message("import-matched", Some(&args)));

    if !matches.is_fully_matched() {
        let names: Vec<&str> = matches.unmatched.iter().map(|m| m.name.as_str()).collect();
        println!(
            "{}",
            localization.get_message_with_args("import-unmatched", &[("names", &names.join(", "))])
        );
    }

    let resolutions: Vec<IngredientResolution> =
        matches.unmatched.iter().map(IngredientResolution::for_mention).collect();
    let finalized = importer.finalize(&draft, &resolutions).await?;

    if finalized.newly_created > 0 {
        let mut args = FluentArgs::new();
        args.set("count", FluentValue::from(finalized.newly_created));
        println!(
            "{}",
            localization.get_message("import-created-ingredients", Some(&args))
        );
    }

    let image_url = if with_image {
        match importer.generate_image(&finalized.recipe, storage).await {
            Ok(url) => {
                println!(
                    "{}",
                    localization.get_message_with_args("import-image-saved", &[("url", &url)])
                );
                Some(url)
            }
            Err(e) => {
                warn!(error = %e, "Image generation failed");
                println!("{}", localization.get_message("import-image-skipped", None));
                None
            }
        }
    } else {
        None
    };

    let saved = importer
        .save(&finalized.recipe, &finalized.lines, image_url.as_deref())
        .await;
    // A failed save stores nothing, so no record points at the image
    if let (Err(_), Some(url)) = (&saved, &image_url) {
        remove_image_by_url(storage, url).await;
    }
    saved?;

    let mut args = FluentArgs::new();
    args.set("name", FluentValue::from(finalized.recipe.name.as_str()));
    args.set("lines", FluentValue::from(finalized.lines.len()));
    println!("{}", localization.get_message("import-saved", Some(&args)));

    Ok(())
}
