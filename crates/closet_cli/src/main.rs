//! Command-line front end for the closet catalog.
//!
//! # Responsibility
//! - Run one catalog use-case per invocation against `CLOSET_DATA_DIR`.
//! - Keep output line-oriented and deterministic for scripting.
//!
//! # Invariants
//! - Exit code is 0 on success, 1 on a failed command, 2 on bad usage.

use closet_core::{
    filter_by_tag_name, init_logging_with_config, normalize_tag, CatalogConfig, CatalogError,
    CatalogWorker, ImageWithTags,
};
use std::process::ExitCode;

const USAGE: &str = "usage: closet <command>

commands:
  ping                  check core linkage
  add <file> [tags]     store a photo with comma-separated tags
  list [tag]            list photos, newest first
  tags                  list tags in use
  retag <id> <tags>     replace the tags of one photo
  delete <id>           delete one photo and its file
  sweep                 remove photo files no row references";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ping,
    Add { file: String, tags: String },
    List { tag: Option<String> },
    Tags,
    Retag { image_id: i64, tags: String },
    Delete { image_id: i64 },
    Sweep,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if command == Command::Ping {
        println!("closet_core ping={}", closet_core::ping());
        println!("closet_core version={}", closet_core::core_version());
        return ExitCode::SUCCESS;
    }

    let config = CatalogConfig::from_env();
    if let Err(err) = init_logging_with_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(&config, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| "missing command".to_string())?;
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    match (name.as_str(), rest.as_slice()) {
        ("ping", []) => Ok(Command::Ping),
        ("add", [file]) => Ok(Command::Add {
            file: (*file).to_string(),
            tags: String::new(),
        }),
        ("add", [file, tags]) => Ok(Command::Add {
            file: (*file).to_string(),
            tags: (*tags).to_string(),
        }),
        ("list", []) => Ok(Command::List { tag: None }),
        ("list", [tag]) => Ok(Command::List {
            tag: Some((*tag).to_string()),
        }),
        ("tags", []) => Ok(Command::Tags),
        ("retag", [id, tags]) => Ok(Command::Retag {
            image_id: parse_image_id(id)?,
            tags: (*tags).to_string(),
        }),
        ("delete", [id]) => Ok(Command::Delete {
            image_id: parse_image_id(id)?,
        }),
        ("sweep", []) => Ok(Command::Sweep),
        (other, _) => Err(format!("unknown command or arguments: `{other}`")),
    }
}

fn parse_image_id(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid image id `{raw}`"))
}

fn run(config: &CatalogConfig, command: Command) -> Result<(), CatalogError> {
    let worker = CatalogWorker::start(config)?;

    match command {
        Command::Ping => {}
        Command::Add { file, tags } => {
            let bytes = std::fs::read(&file)
                .map_err(|err| CatalogError::Storage(closet_core::StorageError::Io(err)))?;
            let created = worker.create_image(bytes, tags).wait()?;
            print_image(&created);
        }
        Command::List { tag } => {
            let images = worker.execute(|service| service.list_images()).wait()?;
            let tag = tag.as_deref().and_then(normalize_tag);
            for image in filter_by_tag_name(&images, tag.as_deref()) {
                print_image(image);
            }
        }
        Command::Tags => {
            let tags = worker
                .execute(|service| service.list_tags_in_use())
                .wait()?;
            for entry in tags {
                println!("{}\t{}", entry.tag.name, entry.images.len());
            }
        }
        Command::Retag { image_id, tags } => {
            let updated = worker.sync_tags(image_id, tags).wait()?;
            print_image(&updated);
        }
        Command::Delete { image_id } => {
            let deleted = worker
                .execute(move |service| service.delete_image_by_id(image_id))
                .wait()?;
            println!("deleted {}", deleted.image_id);
        }
        Command::Sweep => {
            let removed = worker
                .execute(|service| service.sweep_orphan_files())
                .wait()?;
            for path in &removed {
                println!("removed {}", path.display());
            }
            println!("swept {} file(s)", removed.len());
        }
    }

    worker.shutdown();
    Ok(())
}

fn print_image(image: &ImageWithTags) {
    println!(
        "{}\t{}\t{}",
        image.image_id(),
        image.image.file_path,
        image.tag_string()
    );
}
